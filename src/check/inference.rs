//! L2 type inference: walk binding paths through producer output schemas.

use std::collections::HashMap;
use std::sync::Arc;

use super::coercion::{CoercionKind, CoercionRegistry};
use super::contract::{Compatibility, compatibility};
use super::dependency::DependencyOutcome;
use crate::binding::{BindingId, Producer, ResolvedBindings, Segment};
use crate::ontology::OntologyIndex;
use crate::parse::WorkflowPlan;
use crate::report::{Code, Diagnostics};
use crate::schema::{AdditionalProperties, Primitive, SchemaKind, SchemaNode, parse_annotation};

#[derive(Debug, Clone)]
pub enum PathOutcome {
    /// Exactly one concrete node is reachable.
    Resolved(Arc<SchemaNode>),
    /// The path runs through a union or an untyped value; carries everything
    /// it could reach.
    Ambiguous(Arc<SchemaNode>),
    Invalid(String),
}

/// Effective type of every binding that survived inference: the annotation
/// when present, otherwise the inferred type.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: HashMap<BindingId, Arc<SchemaNode>>,
}

impl TypeTable {
    pub fn get(&self, id: BindingId) -> Option<&Arc<SchemaNode>> {
        self.types.get(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

pub fn infer_types(
    ontology: &OntologyIndex,
    coercions: &CoercionRegistry,
    plan: &WorkflowPlan<'_>,
    inputs: Option<&Arc<SchemaNode>>,
    bindings: &ResolvedBindings,
    outcome: &DependencyOutcome,
    diagnostics: &mut Diagnostics,
) -> TypeTable {
    let mut table = TypeTable::default();

    for (id, producer) in bindings.resolved() {
        if outcome.unavailable.contains(&id) {
            continue;
        }
        let root = match producer {
            Producer::Inputs => inputs.cloned(),
            Producer::Step(index) => plan
                .step(index)
                .and_then(|s| s.capability)
                .and_then(|c| ontology.get(c))
                .map(|c| Arc::clone(&c.output)),
        };
        let Some(root) = root else {
            continue;
        };

        let binding = bindings.arena.get(id);
        let site = &binding.site;
        let shown = bindings.arena.display_path(id);

        let path = match producer {
            Producer::Step(_) => output_relative(&root, bindings.arena.path(id)),
            Producer::Inputs => bindings.arena.path(id),
        };
        let reached = match walk(&root, path) {
            PathOutcome::Invalid(reason) => {
                diagnostics.step(
                    Code::B201,
                    site.step,
                    site.field.clone(),
                    format!("invalid field path '{shown}': {reason}"),
                );
                continue;
            }
            other => other,
        };

        let Some(raw_annotation) = &binding.annotation else {
            match reached {
                PathOutcome::Resolved(node) => {
                    table.types.insert(id, node);
                }
                PathOutcome::Ambiguous(node) => {
                    diagnostics
                        .step(
                            Code::B204,
                            site.step,
                            site.field.clone(),
                            format!("type of '{shown}' is ambiguous: {node}"),
                        )
                        .suggest(format!("annotate the binding, e.g. ${{{shown}: {}}}", node.annotation()));
                }
                PathOutcome::Invalid(_) => {}
            }
            continue;
        };

        let annotation = match parse_annotation(raw_annotation) {
            Ok(node) => node,
            Err(e) => {
                diagnostics.step(
                    Code::B205,
                    site.step,
                    site.field.clone(),
                    format!("invalid type annotation '{raw_annotation}' on '{shown}': {e}"),
                );
                continue;
            }
        };

        let accepted = match &reached {
            PathOutcome::Resolved(inferred) => {
                could_be(&annotation, inferred) || widens(coercions, inferred, &annotation)
            }
            PathOutcome::Ambiguous(inferred) => could_be(&annotation, inferred),
            PathOutcome::Invalid(_) => false,
        };
        if accepted {
            table.types.insert(id, annotation);
        } else {
            let inferred = match &reached {
                PathOutcome::Resolved(n) | PathOutcome::Ambiguous(n) => n.to_string(),
                PathOutcome::Invalid(_) => String::new(),
            };
            diagnostics.step(
                Code::B205,
                site.step,
                site.field.clone(),
                format!("annotation '{annotation}' on '{shown}' does not fit its type {inferred}"),
            );
        }
    }

    tracing::debug!(typed = table.len(), "type inference done");
    table
}

/// A leading `.output` names the producer's output itself unless the output
/// schema has a property of that name.
fn output_relative<'p>(root: &SchemaNode, path: &'p [Segment]) -> &'p [Segment] {
    match (path.first(), &root.kind) {
        (Some(Segment::Field(first)), SchemaKind::Object { properties, .. })
            if first == "output" && !properties.contains_key("output") =>
        {
            &path[1..]
        }
        (Some(Segment::Field(first)), kind)
            if first == "output" && !matches!(kind, SchemaKind::Object { .. }) =>
        {
            &path[1..]
        }
        _ => path,
    }
}

/// Walk `path` from `root`.
pub fn walk(root: &Arc<SchemaNode>, path: &[Segment]) -> PathOutcome {
    let mut node = Arc::clone(root);
    for (i, segment) in path.iter().enumerate() {
        let next = match (&node.kind, segment) {
            (SchemaKind::Any, _) => return PathOutcome::Ambiguous(SchemaNode::any()),
            (SchemaKind::Union { variants }, _) => return walk_union(variants, &path[i..]),
            (
                SchemaKind::Object {
                    properties,
                    additional,
                    ..
                },
                Segment::Field(name),
            ) => match (properties.get(name), additional) {
                (Some(child), _) => Arc::clone(child),
                (None, AdditionalProperties::Schema(extra)) => Arc::clone(extra),
                (None, AdditionalProperties::Allowed) => {
                    return PathOutcome::Ambiguous(SchemaNode::any());
                }
                (None, AdditionalProperties::Forbidden) => {
                    return PathOutcome::Invalid(format!("'{name}' is not a property of {node}"));
                }
            },
            (SchemaKind::Object { .. }, Segment::Index(n)) => {
                return PathOutcome::Invalid(format!("cannot index object {node} with [{n}]"));
            }
            (SchemaKind::Array { items }, Segment::Index(_)) => Arc::clone(items),
            (SchemaKind::Array { .. }, Segment::Field(name)) => {
                return PathOutcome::Invalid(format!("'{name}' is not a property of {node}"));
            }
            (SchemaKind::Primitive { ty, .. }, segment) => {
                let access = match segment {
                    Segment::Field(name) => format!("field '{name}'"),
                    Segment::Index(n) => format!("index [{n}]"),
                };
                return PathOutcome::Invalid(format!("cannot access {access} of {}", ty.as_str()));
            }
        };
        node = next;
    }
    if matches!(node.kind, SchemaKind::Any | SchemaKind::Union { .. }) {
        PathOutcome::Ambiguous(node)
    } else {
        PathOutcome::Resolved(node)
    }
}

fn walk_union(variants: &[Arc<SchemaNode>], rest: &[Segment]) -> PathOutcome {
    let mut reached = Vec::new();
    let mut first_error = None;
    for variant in variants {
        match walk(variant, rest) {
            PathOutcome::Resolved(n) | PathOutcome::Ambiguous(n) => reached.push(n),
            PathOutcome::Invalid(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if reached.is_empty() {
        PathOutcome::Invalid(first_error.unwrap_or_else(|| "empty union".to_string()))
    } else {
        PathOutcome::Ambiguous(SchemaNode::union(reached))
    }
}

/// True when a value of type `actual` can be an instance of `annotation`:
/// the annotation equals or narrows it.
pub fn could_be(annotation: &SchemaNode, actual: &SchemaNode) -> bool {
    match (&annotation.kind, &actual.kind) {
        (SchemaKind::Any, _) | (_, SchemaKind::Any) => true,
        (SchemaKind::Union { variants }, _) => variants.iter().all(|v| could_be(v, actual)),
        (_, SchemaKind::Union { variants }) => variants.iter().any(|v| could_be(annotation, v)),
        (
            SchemaKind::Primitive {
                ty: a,
                enumeration: a_enum,
            },
            SchemaKind::Primitive {
                ty: b,
                enumeration: b_enum,
            },
        ) => {
            let base = a == b || (*a == Primitive::Integer && *b == Primitive::Number);
            let members = match (a_enum, b_enum) {
                (Some(a_vals), Some(b_vals)) => a_vals.iter().all(|v| b_vals.contains(v)),
                _ => true,
            };
            base && members
        }
        (SchemaKind::Array { items: a }, SchemaKind::Array { items: b }) => could_be(a, b),
        (
            SchemaKind::Object {
                properties: a_props,
                ..
            },
            SchemaKind::Object {
                properties: b_props,
                additional,
                ..
            },
        ) => a_props.iter().all(|(name, a_node)| match b_props.get(name) {
            Some(b_node) => could_be(a_node, b_node),
            None => *additional != AdditionalProperties::Forbidden,
        }),
        _ => false,
    }
}

/// True when `inferred` reaches `annotation` without an explicit coercion.
fn widens(coercions: &CoercionRegistry, inferred: &SchemaNode, annotation: &SchemaNode) -> bool {
    match compatibility(coercions, inferred, annotation) {
        Compatibility::Exact | Compatibility::Subtype => true,
        Compatibility::Coerced(c) => c.kind == CoercionKind::Implicit,
        Compatibility::Incompatible => false,
    }
}
