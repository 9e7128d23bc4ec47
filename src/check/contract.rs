//! L3 contract checks: binding and literal types against consumer input
//! schemas, plus gate and condition expressions.

use std::sync::Arc;

use serde_json::Value;

use super::coercion::{Coercion, CoercionKind, CoercionRegistry, TypeTag};
use super::dependency::DependencyOutcome;
use super::inference::TypeTable;
use crate::binding::{BindingId, CmpOp, Expr, InputValue, Operand, ResolvedBindings, StepBindings};
use crate::ontology::OntologyIndex;
use crate::parse::{PlannedStep, WorkflowPlan};
use crate::report::{Code, Diagnostics, Fix};
use crate::schema::{AdditionalProperties, Primitive, SchemaKind, SchemaNode, parse_annotation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Exact,
    Subtype,
    Coerced(Coercion),
    Incompatible,
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        !matches!(self, Compatibility::Incompatible)
    }

    /// Usable without a `coerce` entry.
    pub fn is_implicit(&self) -> bool {
        match self {
            Compatibility::Exact | Compatibility::Subtype => true,
            Compatibility::Coerced(c) => c.kind == CoercionKind::Implicit,
            Compatibility::Incompatible => false,
        }
    }

    /// Combine element results where every element must fit.
    fn and(self, other: Compatibility) -> Compatibility {
        use Compatibility::*;
        match (self, other) {
            (Incompatible, _) | (_, Incompatible) => Incompatible,
            (Coerced(a), Coerced(b)) => {
                if a.kind == CoercionKind::Explicit {
                    Coerced(a)
                } else {
                    Coerced(b)
                }
            }
            (Coerced(c), _) | (_, Coerced(c)) => Coerced(c),
            (Exact, Exact) => Exact,
            _ => Subtype,
        }
    }

    /// Rank for picking the best of several alternatives.
    fn rank(&self) -> u8 {
        match self {
            Compatibility::Exact => 0,
            Compatibility::Subtype => 1,
            Compatibility::Coerced(c) if c.kind == CoercionKind::Implicit => 2,
            Compatibility::Coerced(_) => 3,
            Compatibility::Incompatible => 4,
        }
    }
}

/// Can a value of type `source` be passed where `target` is expected?
pub fn compatibility(
    coercions: &CoercionRegistry,
    source: &SchemaNode,
    target: &SchemaNode,
) -> Compatibility {
    if source == target {
        return Compatibility::Exact;
    }
    match (&source.kind, &target.kind) {
        (_, SchemaKind::Any) | (SchemaKind::Any, _) => Compatibility::Subtype,
        (SchemaKind::Union { variants }, _) => variants
            .iter()
            .map(|v| compatibility(coercions, v, target))
            .fold(Compatibility::Exact, Compatibility::and),
        (_, SchemaKind::Union { variants }) => variants
            .iter()
            .map(|v| compatibility(coercions, source, v))
            .min_by_key(Compatibility::rank)
            .unwrap_or(Compatibility::Incompatible),
        (
            SchemaKind::Primitive {
                ty: s,
                enumeration: s_enum,
            },
            SchemaKind::Primitive {
                ty: t,
                enumeration: t_enum,
            },
        ) if s == t => match (s_enum, t_enum) {
            (_, None) => Compatibility::Subtype,
            (Some(s_vals), Some(t_vals)) if s_vals.iter().all(|v| t_vals.contains(v)) => {
                Compatibility::Subtype
            }
            (Some(_), Some(_)) => Compatibility::Incompatible,
            (None, Some(_)) => coerce(coercions, source, target),
        },
        (SchemaKind::Primitive { .. }, SchemaKind::Primitive { .. }) => {
            coerce(coercions, source, target)
        }
        (SchemaKind::Array { items: s }, SchemaKind::Array { items: t }) => {
            match compatibility(coercions, s, t) {
                Compatibility::Exact => Compatibility::Subtype,
                other => other,
            }
        }
        (
            SchemaKind::Object {
                properties: s_props,
                additional: s_additional,
                ..
            },
            SchemaKind::Object {
                properties: t_props,
                required: t_required,
                ..
            },
        ) => {
            // An object of unknown shape (e.g. the `object` annotation) is
            // accepted as is.
            if s_props.is_empty() && *s_additional != AdditionalProperties::Forbidden {
                return Compatibility::Subtype;
            }
            t_required
                .iter()
                .map(|name| match (s_props.get(name), t_props.get(name)) {
                    (Some(s), Some(t)) => compatibility(coercions, s, t),
                    (Some(_), None) => Compatibility::Subtype,
                    (None, _) => Compatibility::Incompatible,
                })
                .fold(Compatibility::Subtype, Compatibility::and)
        }
        _ => Compatibility::Incompatible,
    }
}

fn coerce(coercions: &CoercionRegistry, source: &SchemaNode, target: &SchemaNode) -> Compatibility {
    let (Some(from), Some(to)) = (TypeTag::of(source), TypeTag::of(target)) else {
        return Compatibility::Incompatible;
    };
    let from = TypeTag::Primitive(from.base());
    coercions
        .lookup(from, to)
        .cloned()
        .map_or(Compatibility::Incompatible, Compatibility::Coerced)
}

/// Run all L3 checks.
pub fn check_contracts(
    ontology: &OntologyIndex,
    coercions: &CoercionRegistry,
    plan: &WorkflowPlan<'_>,
    bindings: &ResolvedBindings,
    types: &TypeTable,
    outcome: &DependencyOutcome,
    diagnostics: &mut Diagnostics,
) {
    let checker = ContractChecker {
        coercions,
        bindings,
        types,
    };
    for (step, step_bindings) in plan.steps.iter().zip(&bindings.steps) {
        if !outcome.unknown_steps.contains(&step.index) {
            if let Some(capability) = step.capability.and_then(|c| ontology.get(c)) {
                checker.inputs(step, &capability.id, &capability.input, step_bindings, diagnostics);
            }
        }
        if let Some(condition) = &step_bindings.condition {
            checker.expression(step.index, "condition", condition, diagnostics);
        }
        for (i, gate) in step_bindings.gates.iter().enumerate() {
            if let Some(when) = gate {
                checker.expression(step.index, &format!("gates[{i}].when"), when, diagnostics);
            }
        }
    }
}

struct ContractChecker<'a> {
    coercions: &'a CoercionRegistry,
    bindings: &'a ResolvedBindings,
    types: &'a TypeTable,
}

impl ContractChecker<'_> {
    fn inputs(
        &self,
        step: &PlannedStep<'_>,
        capability: &str,
        input: &Arc<SchemaNode>,
        values: &StepBindings,
        diagnostics: &mut Diagnostics,
    ) {
        let SchemaKind::Object {
            properties,
            required,
            additional,
        } = &input.kind
        else {
            return;
        };

        for (param, value) in &values.inputs {
            let field = format!("input_bindings.{param}");
            let target = match (properties.get(param), additional) {
                (Some(node), _) => Arc::clone(node),
                (None, AdditionalProperties::Schema(node)) => Arc::clone(node),
                (None, AdditionalProperties::Allowed) => SchemaNode::any(),
                (None, AdditionalProperties::Forbidden) => {
                    let known: Vec<&str> = properties.keys().map(String::as_str).collect();
                    diagnostics
                        .step(
                            Code::B207,
                            step.index,
                            field,
                            format!("'{capability}' has no input parameter '{param}'"),
                        )
                        .suggest(format!("known parameters: {}", known.join(", ")));
                    continue;
                }
            };

            let (source, patchable, shown) = match value {
                InputValue::Binding(id) => match self.types.get(*id) {
                    Some(ty) => (Arc::clone(ty), true, format!("'{}'", self.bindings.arena.get(*id).raw)),
                    None => continue,
                },
                InputValue::Template(_) => (
                    SchemaNode::primitive(Primitive::String),
                    true,
                    "template string".to_string(),
                ),
                InputValue::Literal { value, .. } => (
                    SchemaNode::of_literal(value),
                    false,
                    format!("literal {}", literal_text(value)),
                ),
                InputValue::Invalid => continue,
            };

            match compatibility(self.coercions, &source, &target) {
                Compatibility::Exact | Compatibility::Subtype => {}
                Compatibility::Coerced(c) if c.kind == CoercionKind::Implicit => {
                    if patchable {
                        diagnostics.step(
                            Code::B209,
                            step.index,
                            field,
                            format!("{shown} is coerced from {} to {target} ({})", c.from, c.note),
                        );
                    }
                }
                Compatibility::Coerced(c) => {
                    if let Some(declared) = step.doc.coerce.get(param) {
                        let entry = format!("coerce.{param}");
                        match parse_annotation(declared) {
                            Err(e) => {
                                diagnostics.step(
                                    Code::B205,
                                    step.index,
                                    entry,
                                    format!("invalid type annotation '{declared}' in coerce for '{param}': {e}"),
                                );
                            }
                            Ok(node)
                                if compatibility(self.coercions, &source, &node).is_compatible()
                                    && compatibility(self.coercions, &node, &target).is_implicit() =>
                            {
                                diagnostics.step(
                                    Code::B209,
                                    step.index,
                                    field,
                                    format!("{shown} is explicitly coerced from {} to {target} ({})", c.from, c.note),
                                );
                            }
                            Ok(node) => {
                                diagnostics
                                    .step(
                                        Code::B203,
                                        step.index,
                                        entry,
                                        format!(
                                            "coerce target {node} for '{param}' does not turn {source} ({shown}) into {target}"
                                        ),
                                    )
                                    .suggest(format!("use `coerce: {{{param}: {}}}`", target.annotation()));
                            }
                        }
                        continue;
                    }
                    let diagnostic = diagnostics.step(
                        Code::B203,
                        step.index,
                        field,
                        format!(
                            "parameter '{param}' of '{capability}' expects {target}, found {source} ({shown}); an explicit coercion is required"
                        ),
                    );
                    if patchable {
                        let annotation = target.annotation();
                        diagnostic
                            .suggest(format!("add `coerce: {{{param}: {annotation}}}` to step {}", step.index))
                            .with_fix(Fix::Coerce {
                                step: step.index,
                                param: param.clone(),
                                target: annotation,
                            });
                    }
                }
                Compatibility::Incompatible => {
                    diagnostics.step(
                        Code::B203,
                        step.index,
                        field,
                        format!("parameter '{param}' of '{capability}' expects {target}, found {source} ({shown})"),
                    );
                }
            }
        }

        for name in required {
            if !values.inputs.contains_key(name) {
                diagnostics.step(
                    Code::B208,
                    step.index,
                    format!("input_bindings.{name}"),
                    format!("required input '{name}' of '{capability}' has no value"),
                );
            }
        }
    }

    fn operand_type(&self, operand: &Operand<BindingId>) -> Option<Arc<SchemaNode>> {
        match operand {
            Operand::Binding(id) => self.types.get(*id).cloned(),
            Operand::Literal(value) => Some(SchemaNode::of_literal(value)),
        }
    }

    fn expression(
        &self,
        step: usize,
        field: &str,
        expr: &Expr<BindingId>,
        diagnostics: &mut Diagnostics,
    ) {
        for leaf in expr.leaves() {
            match leaf {
                Expr::Compare { lhs, op, rhs } => {
                    if is_null(lhs) || is_null(rhs) {
                        continue;
                    }
                    let (Some(l), Some(r)) = (self.operand_type(lhs), self.operand_type(rhs)) else {
                        continue;
                    };
                    if let Some(problem) = self.comparison_problem(&l, *op, &r) {
                        diagnostics.step(Code::B203, step, field, problem);
                    }
                }
                Expr::Truthy(operand) => {
                    let Some(ty) = self.operand_type(operand) else {
                        continue;
                    };
                    let boolean = SchemaNode::primitive(Primitive::Boolean);
                    if !compatibility(self.coercions, &ty, &boolean).is_implicit() {
                        diagnostics.step(
                            Code::B203,
                            step,
                            field,
                            format!("condition operand must be boolean, found {ty}"),
                        );
                    }
                }
                Expr::And(..) | Expr::Or(..) => {}
            }
        }
    }

    fn comparison_problem(&self, l: &SchemaNode, op: CmpOp, r: &SchemaNode) -> Option<String> {
        if l.is_any() || r.is_any() {
            return None;
        }
        if op.is_ordering() {
            let ordered = (l.is_numeric() && r.is_numeric()) || (l.is_string() && r.is_string());
            return (!ordered).then(|| {
                format!("'{op}' needs two numbers or two strings, found {l} and {r}")
            });
        }
        let comparable = compatibility(self.coercions, l, r).is_implicit()
            || compatibility(self.coercions, r, l).is_implicit();
        (!comparable).then(|| format!("'{op}' compares incompatible types {l} and {r}"))
    }
}

fn is_null(operand: &Operand<BindingId>) -> bool {
    matches!(operand, Operand::Literal(Value::Null))
}

fn literal_text(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 40 {
        let cut: String = text.chars().take(37).collect();
        format!("{cut}...")
    } else {
        text
    }
}
