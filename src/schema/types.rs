//! Resolved type descriptors.
//!
//! A `SchemaNode` never contains a `$ref`: the resolver replaces every
//! reference with the shared node of its target, so two references to the
//! same pointer yield the same `Arc`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl Primitive {
    pub fn parse(name: &str) -> Option<Primitive> {
        match name {
            "string" => Some(Primitive::String),
            "number" => Some(Primitive::Number),
            "integer" => Some(Primitive::Integer),
            "boolean" => Some(Primitive::Boolean),
            "null" => Some(Primitive::Null),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Integer => "integer",
            Primitive::Boolean => "boolean",
            Primitive::Null => "null",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Primitive::Number | Primitive::Integer)
    }

    /// The primitive a JSON value belongs to. Whole numbers are integers.
    pub fn of_value(value: &Value) -> Option<Primitive> {
        match value {
            Value::String(_) => Some(Primitive::String),
            Value::Bool(_) => Some(Primitive::Boolean),
            Value::Null => Some(Primitive::Null),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Primitive::Integer),
            Value::Number(_) => Some(Primitive::Number),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    Allowed,
    Forbidden,
    Schema(Arc<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    Any,
    Primitive {
        ty: Primitive,
        enumeration: Option<Vec<Value>>,
    },
    Object {
        properties: BTreeMap<String, Arc<SchemaNode>>,
        required: BTreeSet<String>,
        additional: AdditionalProperties,
    },
    Array {
        items: Arc<SchemaNode>,
    },
    Union {
        variants: Vec<Arc<SchemaNode>>,
    },
}

#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    /// Canonical pointer (`doc#/json/pointer`) the node was built from.
    pub origin: Option<String>,
}

/// Structural equality; `origin` is provenance only.
impl PartialEq for SchemaNode {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.kind == other.kind
    }
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        SchemaNode { kind, origin: None }
    }

    pub fn any() -> Arc<SchemaNode> {
        Arc::new(SchemaNode::new(SchemaKind::Any))
    }

    pub fn primitive(ty: Primitive) -> Arc<SchemaNode> {
        Arc::new(SchemaNode::new(SchemaKind::Primitive {
            ty,
            enumeration: None,
        }))
    }

    pub fn enumeration(ty: Primitive, values: Vec<Value>) -> Arc<SchemaNode> {
        Arc::new(SchemaNode::new(SchemaKind::Primitive {
            ty,
            enumeration: Some(values),
        }))
    }

    pub fn array(items: Arc<SchemaNode>) -> Arc<SchemaNode> {
        Arc::new(SchemaNode::new(SchemaKind::Array { items }))
    }

    /// A union of the given variants, flattening nested unions. A single
    /// variant is returned as-is.
    pub fn union(variants: Vec<Arc<SchemaNode>>) -> Arc<SchemaNode> {
        let mut flat: Vec<Arc<SchemaNode>> = Vec::new();
        for variant in variants {
            let members = match &variant.kind {
                SchemaKind::Union { variants } => variants.clone(),
                _ => vec![variant],
            };
            for member in members {
                if !flat.iter().any(|existing| existing == &member) {
                    flat.push(member);
                }
            }
        }
        match flat.len() {
            0 => SchemaNode::any(),
            1 => flat.remove(0),
            _ => Arc::new(SchemaNode::new(SchemaKind::Union { variants: flat })),
        }
    }

    pub fn object(
        properties: BTreeMap<String, Arc<SchemaNode>>,
        required: BTreeSet<String>,
        additional: AdditionalProperties,
    ) -> Arc<SchemaNode> {
        Arc::new(SchemaNode::new(SchemaKind::Object {
            properties,
            required,
            additional,
        }))
    }

    /// An object with no declared properties that accepts anything.
    pub fn open_object() -> Arc<SchemaNode> {
        SchemaNode::object(BTreeMap::new(), BTreeSet::new(), AdditionalProperties::Allowed)
    }

    pub fn is_any(&self) -> bool {
        matches!(self.kind, SchemaKind::Any)
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match &self.kind {
            SchemaKind::Primitive { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    /// True for numeric primitives and unions made only of them.
    pub fn is_numeric(&self) -> bool {
        match &self.kind {
            SchemaKind::Primitive { ty, .. } => ty.is_numeric(),
            SchemaKind::Union { variants } => variants.iter().all(|v| v.is_numeric()),
            _ => false,
        }
    }

    pub fn is_string(&self) -> bool {
        match &self.kind {
            SchemaKind::Primitive { ty, .. } => *ty == Primitive::String,
            SchemaKind::Union { variants } => variants.iter().all(|v| v.is_string()),
            _ => false,
        }
    }

    /// The type written in annotation syntax, when one exists.
    /// Object shapes collapse to `object` and enums to their base type.
    pub fn annotation(&self) -> String {
        match &self.kind {
            SchemaKind::Any => "any".to_string(),
            SchemaKind::Primitive { ty, .. } => ty.as_str().to_string(),
            SchemaKind::Object { .. } => "object".to_string(),
            SchemaKind::Array { items } => format!("array<{}>", items.annotation()),
            SchemaKind::Union { variants } => variants
                .iter()
                .map(|v| v.annotation())
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    /// Type of a JSON literal. String literals carry their value as a
    /// one-member enum so they can be checked against enum parameters.
    pub fn of_literal(value: &Value) -> Arc<SchemaNode> {
        match value {
            Value::String(_) => SchemaNode::enumeration(Primitive::String, vec![value.clone()]),
            Value::Array(items) => {
                let members: Vec<Arc<SchemaNode>> = items.iter().map(widen_literal).collect();
                if members.is_empty() {
                    SchemaNode::array(SchemaNode::any())
                } else {
                    SchemaNode::array(SchemaNode::union(members))
                }
            }
            Value::Object(map) => {
                let properties: BTreeMap<String, Arc<SchemaNode>> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), SchemaNode::of_literal(v)))
                    .collect();
                let required = properties.keys().cloned().collect();
                SchemaNode::object(properties, required, AdditionalProperties::Allowed)
            }
            other => match Primitive::of_value(other) {
                Some(ty) => SchemaNode::primitive(ty),
                None => SchemaNode::any(),
            },
        }
    }
}

/// Array members are typed by their base type so `["a", "b"]` is
/// `array<string>` rather than a union of singleton enums.
fn widen_literal(value: &Value) -> Arc<SchemaNode> {
    match Primitive::of_value(value) {
        Some(ty) => SchemaNode::primitive(ty),
        None => SchemaNode::of_literal(value),
    }
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SchemaKind::Any => write!(f, "any"),
            SchemaKind::Primitive {
                ty,
                enumeration: None,
            } => write!(f, "{}", ty.as_str()),
            SchemaKind::Primitive {
                ty,
                enumeration: Some(values),
            } => {
                let members: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}[{}]", ty.as_str(), members.join(", "))
            }
            SchemaKind::Array { items } => write!(f, "array<{}>", items),
            SchemaKind::Union { variants } => {
                let members: Vec<String> = variants.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", members.join(" | "))
            }
            SchemaKind::Object {
                properties,
                required,
                additional,
            } => {
                if properties.is_empty() {
                    return write!(f, "object");
                }
                let fields: Vec<String> = properties
                    .iter()
                    .map(|(name, node)| {
                        let marker = if required.contains(name) { "" } else { "?" };
                        format!("{}{}: {}", name, marker, node)
                    })
                    .collect();
                let rest = match additional {
                    AdditionalProperties::Forbidden => "",
                    _ => ", ..",
                };
                write!(f, "{{{}{}}}", fields.join(", "), rest)
            }
        }
    }
}
