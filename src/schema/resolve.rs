//! `$ref` resolution over a bundle of schema documents.
//!
//! Resolution is depth-first over canonical pointers (`doc#/json/pointer`).
//! A pointer already on the visiting stack is a cycle. Every resolved pointer
//! is cached, so all references to one target share one `Arc<SchemaNode>`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::Value;

use super::types::{AdditionalProperties, Primitive, SchemaKind, SchemaNode};
use crate::report::Code;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("unresolved $ref '{reference}' (referenced from {from})")]
    Unresolved { reference: String, from: String },
    #[error("circular $ref chain: {}", chain.join(" -> "))]
    Circular { chain: Vec<String> },
    #[error("invalid schema at {pointer}: {reason}")]
    Invalid { pointer: String, reason: String },
}

impl SchemaError {
    pub fn code(&self) -> Code {
        match self {
            SchemaError::Unresolved { .. } => Code::S301,
            SchemaError::Circular { .. } => Code::S302,
            SchemaError::Invalid { .. } => Code::S303,
        }
    }
}

/// Raw schema documents keyed by document id (usually the file name).
#[derive(Debug, Clone, Default)]
pub struct SchemaBundle {
    documents: BTreeMap<String, Value>,
}

impl SchemaBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, document: Value) {
        self.documents.insert(id.into(), document);
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.documents.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Frozen output of the load phase. Read-only once built.
#[derive(Debug, Default)]
pub struct SchemaCache {
    nodes: HashMap<String, Arc<SchemaNode>>,
}

impl SchemaCache {
    pub fn get(&self, pointer: &str) -> Option<&Arc<SchemaNode>> {
        self.nodes.get(pointer)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub struct SchemaResolver<'a> {
    bundle: &'a SchemaBundle,
    extra: BTreeMap<String, &'a Value>,
    frozen: Option<&'a SchemaCache>,
    cache: HashMap<String, Arc<SchemaNode>>,
    visiting: Vec<String>,
}

impl<'a> SchemaResolver<'a> {
    /// Load-phase resolver that fills its own cache.
    pub fn new(bundle: &'a SchemaBundle) -> Self {
        SchemaResolver {
            bundle,
            extra: BTreeMap::new(),
            frozen: None,
            cache: HashMap::new(),
            visiting: Vec::new(),
        }
    }

    /// Per-run resolver reading through an already frozen cache.
    pub fn overlay(bundle: &'a SchemaBundle, frozen: &'a SchemaCache) -> Self {
        SchemaResolver {
            frozen: Some(frozen),
            ..SchemaResolver::new(bundle)
        }
    }

    /// Make an extra document (e.g. the workflow being validated) visible
    /// without adding it to the shared bundle.
    pub fn with_document(mut self, id: impl Into<String>, document: &'a Value) -> Self {
        self.extra.insert(id.into(), document);
        self
    }

    pub fn into_cache(self) -> SchemaCache {
        SchemaCache { nodes: self.cache }
    }

    /// Resolve a `$ref` string relative to `base_doc`.
    pub fn resolve_ref(
        &mut self,
        base_doc: &str,
        reference: &str,
    ) -> Result<Arc<SchemaNode>, SchemaError> {
        let (doc, fragment) = match reference.split_once('#') {
            Some((doc, fragment)) => (doc, fragment),
            None => (reference, ""),
        };
        let doc = if doc.is_empty() { base_doc } else { doc };
        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(SchemaError::Unresolved {
                reference: reference.to_string(),
                from: self.current(base_doc),
            });
        }
        self.resolve_pointer(doc, fragment)
    }

    /// Resolve the schema located at `pointer` inside document `doc`.
    pub fn resolve_pointer(
        &mut self,
        doc: &str,
        pointer: &str,
    ) -> Result<Arc<SchemaNode>, SchemaError> {
        let key = canonical(doc, pointer);
        if let Some(node) = self.frozen.and_then(|f| f.get(&key)) {
            return Ok(Arc::clone(node));
        }
        if let Some(node) = self.cache.get(&key) {
            return Ok(Arc::clone(node));
        }
        if let Some(pos) = self.visiting.iter().position(|k| *k == key) {
            let mut chain = self.visiting[pos..].to_vec();
            chain.push(key);
            return Err(SchemaError::Circular { chain });
        }

        let value = self
            .document(doc)
            .and_then(|d| d.pointer(pointer))
            .ok_or_else(|| SchemaError::Unresolved {
                reference: key.clone(),
                from: self.current(doc),
            })?;

        self.visiting.push(key.clone());
        let built = self.build(doc, pointer, value);
        self.visiting.pop();

        let node = built?;
        self.cache.insert(key, Arc::clone(&node));
        Ok(node)
    }

    fn document(&self, id: &str) -> Option<&'a Value> {
        match self.extra.get(id) {
            Some(doc) => Some(*doc),
            None => self.bundle.get(id),
        }
    }

    fn current(&self, fallback_doc: &str) -> String {
        self.visiting
            .last()
            .cloned()
            .unwrap_or_else(|| format!("{fallback_doc}#"))
    }

    fn build(
        &mut self,
        doc: &str,
        pointer: &str,
        value: &Value,
    ) -> Result<Arc<SchemaNode>, SchemaError> {
        let invalid = |reason: &str| SchemaError::Invalid {
            pointer: canonical(doc, pointer),
            reason: reason.to_string(),
        };

        let map = match value {
            Value::Object(map) => map,
            Value::Bool(true) => return Ok(self.stamp(doc, pointer, SchemaKind::Any)),
            _ => return Err(invalid("schema must be an object")),
        };

        if let Some(reference) = map.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| invalid("$ref must be a string"))?;
            return self.resolve_ref(doc, reference);
        }

        for keyword in ["anyOf", "oneOf"] {
            if let Some(members) = map.get(keyword) {
                let members = members
                    .as_array()
                    .ok_or_else(|| invalid(&format!("{keyword} must be an array")))?;
                let mut variants = Vec::with_capacity(members.len());
                for i in 0..members.len() {
                    variants.push(self.resolve_pointer(doc, &format!("{pointer}/{keyword}/{i}"))?);
                }
                return Ok(self.adopt(doc, pointer, SchemaNode::union(variants)));
            }
        }

        if let Some(members) = map.get("allOf") {
            let members = members
                .as_array()
                .ok_or_else(|| invalid("allOf must be an array"))?;
            let mut parts = Vec::with_capacity(members.len());
            for i in 0..members.len() {
                parts.push(self.resolve_pointer(doc, &format!("{pointer}/allOf/{i}"))?);
            }
            return merge_all_of(parts)
                .map(|kind| self.stamp(doc, pointer, kind))
                .ok_or_else(|| invalid("allOf members must all be objects"));
        }

        match map.get("type") {
            Some(Value::String(ty)) => {
                let kind = self.build_typed(doc, pointer, map, ty)?;
                Ok(self.stamp(doc, pointer, kind))
            }
            Some(Value::Array(types)) => {
                let mut variants = Vec::with_capacity(types.len());
                for ty in types {
                    let ty = ty
                        .as_str()
                        .ok_or_else(|| invalid("type entries must be strings"))?;
                    let kind = self.build_typed(doc, pointer, map, ty)?;
                    variants.push(Arc::new(SchemaNode::new(kind)));
                }
                Ok(self.adopt(doc, pointer, SchemaNode::union(variants)))
            }
            Some(_) => Err(invalid("type must be a string or an array of strings")),
            None => {
                if map.contains_key("properties") || map.contains_key("additionalProperties") {
                    let kind = self.build_typed(doc, pointer, map, "object")?;
                    Ok(self.stamp(doc, pointer, kind))
                } else if map.contains_key("items") {
                    let kind = self.build_typed(doc, pointer, map, "array")?;
                    Ok(self.stamp(doc, pointer, kind))
                } else if let Some(kind) = enum_kind(map) {
                    Ok(self.stamp(doc, pointer, kind))
                } else {
                    Ok(self.stamp(doc, pointer, SchemaKind::Any))
                }
            }
        }
    }

    fn build_typed(
        &mut self,
        doc: &str,
        pointer: &str,
        map: &serde_json::Map<String, Value>,
        ty: &str,
    ) -> Result<SchemaKind, SchemaError> {
        let invalid = |reason: String| SchemaError::Invalid {
            pointer: canonical(doc, pointer),
            reason,
        };
        match ty {
            "object" => {
                let mut properties = BTreeMap::new();
                if let Some(props) = map.get("properties") {
                    let props = props
                        .as_object()
                        .ok_or_else(|| invalid("properties must be an object".into()))?;
                    for name in props.keys() {
                        let child = format!("{pointer}/properties/{}", escape(name));
                        properties.insert(name.clone(), self.resolve_pointer(doc, &child)?);
                    }
                }
                let required: BTreeSet<String> = match map.get("required") {
                    None => BTreeSet::new(),
                    Some(Value::Array(names)) => names
                        .iter()
                        .map(|n| {
                            n.as_str()
                                .map(str::to_string)
                                .ok_or_else(|| invalid("required entries must be strings".into()))
                        })
                        .collect::<Result<_, _>>()?,
                    Some(_) => return Err(invalid("required must be an array".into())),
                };
                let additional = match map.get("additionalProperties") {
                    None | Some(Value::Bool(true)) => AdditionalProperties::Allowed,
                    Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
                    Some(Value::Object(_)) => {
                        let node = self
                            .resolve_pointer(doc, &format!("{pointer}/additionalProperties"))?;
                        if node.is_any() {
                            AdditionalProperties::Allowed
                        } else {
                            AdditionalProperties::Schema(node)
                        }
                    }
                    Some(_) => {
                        return Err(invalid(
                            "additionalProperties must be a boolean or a schema".into(),
                        ));
                    }
                };
                Ok(SchemaKind::Object {
                    properties,
                    required,
                    additional,
                })
            }
            "array" => {
                let items = match map.get("items") {
                    None => SchemaNode::any(),
                    Some(Value::Array(tuple)) => {
                        let mut members = Vec::with_capacity(tuple.len());
                        for i in 0..tuple.len() {
                            members.push(self.resolve_pointer(doc, &format!("{pointer}/items/{i}"))?);
                        }
                        SchemaNode::union(members)
                    }
                    Some(_) => self.resolve_pointer(doc, &format!("{pointer}/items"))?,
                };
                Ok(SchemaKind::Array { items })
            }
            other => {
                let primitive = Primitive::parse(other)
                    .ok_or_else(|| invalid(format!("unknown type '{other}'")))?;
                let enumeration = match (map.get("enum"), map.get("const")) {
                    (Some(Value::Array(values)), _) => Some(values.clone()),
                    (Some(_), _) => return Err(invalid("enum must be an array".into())),
                    (None, Some(value)) => Some(vec![value.clone()]),
                    (None, None) => None,
                };
                Ok(SchemaKind::Primitive {
                    ty: primitive,
                    enumeration,
                })
            }
        }
    }

    fn stamp(&self, doc: &str, pointer: &str, kind: SchemaKind) -> Arc<SchemaNode> {
        Arc::new(SchemaNode {
            kind,
            origin: Some(canonical(doc, pointer)),
        })
    }

    /// Give a node built from combinators its own origin unless it is a
    /// shared node that already has one.
    fn adopt(&self, doc: &str, pointer: &str, node: Arc<SchemaNode>) -> Arc<SchemaNode> {
        if node.origin.is_some() {
            return node;
        }
        self.stamp(doc, pointer, node.kind.clone())
    }
}

fn enum_kind(map: &serde_json::Map<String, Value>) -> Option<SchemaKind> {
    let values = match (map.get("enum"), map.get("const")) {
        (Some(Value::Array(values)), _) => values.clone(),
        (None, Some(value)) => vec![value.clone()],
        _ => return None,
    };
    let first = Primitive::of_value(values.first()?)?;
    let base = if values
        .iter()
        .all(|v| Primitive::of_value(v).is_some_and(|p| p == first || (p.is_numeric() && first.is_numeric())))
    {
        if values.iter().any(|v| Primitive::of_value(v) == Some(Primitive::Number)) {
            Primitive::Number
        } else {
            first
        }
    } else {
        return Some(SchemaKind::Any);
    };
    Some(SchemaKind::Primitive {
        ty: base,
        enumeration: Some(values),
    })
}

fn merge_all_of(parts: Vec<Arc<SchemaNode>>) -> Option<SchemaKind> {
    let mut properties = BTreeMap::new();
    let mut required = BTreeSet::new();
    let mut additional = AdditionalProperties::Allowed;
    for part in parts {
        match &part.kind {
            SchemaKind::Object {
                properties: p,
                required: r,
                additional: a,
            } => {
                properties.extend(p.iter().map(|(k, v)| (k.clone(), Arc::clone(v))));
                required.extend(r.iter().cloned());
                if *a == AdditionalProperties::Forbidden {
                    additional = AdditionalProperties::Forbidden;
                }
            }
            SchemaKind::Any => {}
            _ => return None,
        }
    }
    Some(SchemaKind::Object {
        properties,
        required,
        additional,
    })
}

pub fn canonical(doc: &str, pointer: &str) -> String {
    format!("{doc}#{pointer}")
}

/// JSON-pointer escaping for a single reference token.
pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(doc: Value) -> SchemaBundle {
        let mut bundle = SchemaBundle::new();
        bundle.insert("main.json", doc);
        bundle
    }

    #[test]
    fn repeated_refs_share_one_node() {
        let b = bundle(json!({
            "definitions": {
                "Id": {"type": "string"},
                "Pair": {
                    "type": "object",
                    "properties": {
                        "left": {"$ref": "#/definitions/Id"},
                        "right": {"$ref": "#/definitions/Id"}
                    }
                }
            }
        }));
        let mut resolver = SchemaResolver::new(&b);
        let pair = resolver.resolve_pointer("main.json", "/definitions/Pair").unwrap();
        let SchemaKind::Object { properties, .. } = &pair.kind else {
            panic!("expected object, got {pair}");
        };
        assert!(Arc::ptr_eq(&properties["left"], &properties["right"]));
        let id = resolver.resolve_pointer("main.json", "/definitions/Id").unwrap();
        assert!(Arc::ptr_eq(&properties["left"], &id));
    }

    #[test]
    fn self_referencing_chain_is_circular() {
        let b = bundle(json!({
            "definitions": {
                "A": {"$ref": "#/definitions/B"},
                "B": {"$ref": "#/definitions/A"}
            }
        }));
        let err = SchemaResolver::new(&b)
            .resolve_pointer("main.json", "/definitions/A")
            .unwrap_err();
        assert_eq!(err.code(), Code::S302);
    }

    #[test]
    fn recursive_property_is_circular() {
        let b = bundle(json!({
            "definitions": {
                "Tree": {
                    "type": "object",
                    "properties": {"child": {"$ref": "#/definitions/Tree"}}
                }
            }
        }));
        let err = SchemaResolver::new(&b)
            .resolve_pointer("main.json", "/definitions/Tree")
            .unwrap_err();
        match err {
            SchemaError::Circular { chain } => {
                assert_eq!(chain.first(), chain.last());
                assert_eq!(chain.len(), 3);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn missing_target_is_unresolved() {
        let b = bundle(json!({"definitions": {"A": {"$ref": "other.json#/X"}}}));
        let err = SchemaResolver::new(&b)
            .resolve_pointer("main.json", "/definitions/A")
            .unwrap_err();
        assert_eq!(err.code(), Code::S301);
    }

    #[test]
    fn unknown_type_is_invalid() {
        let b = bundle(json!({"definitions": {"A": {"type": "decimal"}}}));
        let err = SchemaResolver::new(&b)
            .resolve_pointer("main.json", "/definitions/A")
            .unwrap_err();
        assert_eq!(err.code(), Code::S303);
    }

    #[test]
    fn type_arrays_and_any_of_become_unions() {
        let b = bundle(json!({
            "definitions": {
                "A": {"type": ["string", "null"]},
                "B": {"anyOf": [{"type": "string"}, {"type": "integer"}]}
            }
        }));
        let mut resolver = SchemaResolver::new(&b);
        let a = resolver.resolve_pointer("main.json", "/definitions/A").unwrap();
        let b2 = resolver.resolve_pointer("main.json", "/definitions/B").unwrap();
        assert_eq!(a.to_string(), "string | null");
        assert_eq!(b2.to_string(), "string | integer");
    }

    #[test]
    fn all_of_merges_objects() {
        let b = bundle(json!({
            "definitions": {
                "A": {"allOf": [
                    {"type": "object", "properties": {"x": {"type": "string"}}, "required": ["x"]},
                    {"type": "object", "properties": {"y": {"type": "integer"}}}
                ]}
            }
        }));
        let node = SchemaResolver::new(&b)
            .resolve_pointer("main.json", "/definitions/A")
            .unwrap();
        assert_eq!(node.to_string(), "{x: string, y?: integer, ..}");
    }

    #[test]
    fn overlay_reads_frozen_cache_and_extra_documents() {
        let b = bundle(json!({"definitions": {"Id": {"type": "string"}}}));
        let mut loader = SchemaResolver::new(&b);
        let id = loader.resolve_pointer("main.json", "/definitions/Id").unwrap();
        let frozen = loader.into_cache();

        let workflow = json!({"type": "object", "properties": {"who": {"$ref": "main.json#/definitions/Id"}}});
        let mut overlay = SchemaResolver::overlay(&b, &frozen).with_document("workflow", &workflow);
        let node = overlay.resolve_pointer("workflow", "").unwrap();
        let SchemaKind::Object { properties, .. } = &node.kind else {
            panic!("expected object");
        };
        assert!(Arc::ptr_eq(&properties["who"], &id));
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        assert_eq!(escape("a/b~c"), "a~1b~0c");
    }
}
