//! Classify step inputs and resolve every binding to its producer.

use std::collections::BTreeMap;

use serde_json::Value;

use super::ast::{BindingArena, BindingId, BindingSite, Producer};
use super::expr::{Expr, parse_expr};
use super::parser::{
    ParsedBinding, TemplatePart, contains_binding, is_whole_binding, parse_binding,
    split_template,
};
use crate::parse::WorkflowPlan;
use crate::parse::plan::INPUTS;
use crate::report::{Code, Diagnostics};

/// One value of `input_bindings`.
#[derive(Debug, Clone)]
pub enum InputValue {
    /// The whole string is a single binding.
    Binding(BindingId),
    /// Literal text with embedded bindings; typed `string`.
    Template(Vec<BindingId>),
    /// A JSON literal, possibly with bindings nested in strings inside it.
    Literal { value: Value, nested: Vec<BindingId> },
    /// Contained a malformed binding (already reported).
    Invalid,
}

#[derive(Debug, Default)]
pub struct StepBindings {
    pub inputs: BTreeMap<String, InputValue>,
    pub condition: Option<Expr<BindingId>>,
    /// Parsed `when` expression per gate; `None` if it failed to parse.
    pub gates: Vec<Option<Expr<BindingId>>>,
}

#[derive(Debug, Default)]
pub struct ResolvedBindings {
    pub arena: BindingArena,
    pub steps: Vec<StepBindings>,
}

impl ResolvedBindings {
    /// Bindings whose producer is known.
    pub fn resolved(&self) -> impl Iterator<Item = (BindingId, Producer)> + '_ {
        self.arena
            .iter()
            .filter_map(|(id, b)| b.resolved.map(|p| (id, p)))
    }
}

pub fn resolve_bindings(
    plan: &WorkflowPlan<'_>,
    has_inputs: bool,
    diagnostics: &mut Diagnostics,
) -> ResolvedBindings {
    let mut out = ResolvedBindings::default();
    let mut resolver = Resolver {
        plan,
        has_inputs,
        arena: &mut out.arena,
        diagnostics,
    };

    for planned in &plan.steps {
        let step = planned.index;
        let doc = planned.doc;
        let mut bindings = StepBindings::default();

        for (param, value) in &doc.input_bindings {
            let field = format!("input_bindings.{param}");
            let classified = resolver.classify(step, &field, value);
            bindings.inputs.insert(param.clone(), classified);
        }

        if let Some(condition) = &doc.condition {
            bindings.condition = resolver.expression(step, "condition", condition);
        }

        for (i, gate) in doc.gates.iter().enumerate() {
            let field = format!("gates[{i}].when");
            bindings
                .gates
                .push(resolver.expression(step, &field, &gate.when));
        }

        out.steps.push(bindings);
    }

    out
}

struct Resolver<'p, 'w, 'a> {
    plan: &'p WorkflowPlan<'w>,
    has_inputs: bool,
    arena: &'a mut BindingArena,
    diagnostics: &'a mut Diagnostics,
}

impl Resolver<'_, '_, '_> {
    fn classify(&mut self, step: usize, field: &str, value: &Value) -> InputValue {
        match value {
            Value::String(s) if is_whole_binding(s) => match self.binding(step, field, s) {
                Some(id) => InputValue::Binding(id),
                None => InputValue::Invalid,
            },
            Value::String(s) if contains_binding(s) => match self.template(step, field, s) {
                Some(ids) => InputValue::Template(ids),
                None => InputValue::Invalid,
            },
            Value::Array(_) | Value::Object(_) => {
                let mut nested = Vec::new();
                if self.nested(step, field, value, &mut nested) {
                    InputValue::Literal {
                        value: value.clone(),
                        nested,
                    }
                } else {
                    InputValue::Invalid
                }
            }
            other => InputValue::Literal {
                value: other.clone(),
                nested: Vec::new(),
            },
        }
    }

    /// Collect bindings inside a literal array/object. Returns false if any
    /// of them is malformed.
    fn nested(&mut self, step: usize, field: &str, value: &Value, out: &mut Vec<BindingId>) -> bool {
        match value {
            Value::String(s) if contains_binding(s) => match self.template(step, field, s) {
                Some(ids) => {
                    out.extend(ids);
                    true
                }
                None => false,
            },
            Value::Array(items) => items
                .iter()
                .fold(true, |ok, item| self.nested(step, field, item, out) && ok),
            Value::Object(map) => map
                .values()
                .fold(true, |ok, item| self.nested(step, field, item, out) && ok),
            _ => true,
        }
    }

    fn template(&mut self, step: usize, field: &str, text: &str) -> Option<Vec<BindingId>> {
        let parts = match split_template(text) {
            Ok(parts) => parts,
            Err(e) => {
                self.malformed(step, field, text, &e.to_string());
                return None;
            }
        };
        let mut ids = Vec::new();
        let mut ok = true;
        for part in parts {
            if let TemplatePart::Binding(raw) = part {
                match self.binding(step, field, raw) {
                    Some(id) => ids.push(id),
                    None => ok = false,
                }
            }
        }
        ok.then_some(ids)
    }

    fn binding(&mut self, step: usize, field: &str, raw: &str) -> Option<BindingId> {
        match parse_binding(raw) {
            Ok(parsed) => Some(self.alloc(step, field, raw.trim(), parsed)),
            Err(e) => {
                self.malformed(step, field, raw, &e.to_string());
                None
            }
        }
    }

    fn expression(&mut self, step: usize, field: &str, text: &str) -> Option<Expr<BindingId>> {
        match parse_expr(text) {
            Ok(expr) => Some(expr.map_bindings(&mut |parsed: ParsedBinding| {
                let raw = raw_of(&parsed);
                self.alloc(step, field, &raw, parsed)
            })),
            Err(e) => {
                self.malformed(step, field, text, &e.to_string());
                None
            }
        }
    }

    fn alloc(&mut self, step: usize, field: &str, raw: &str, parsed: ParsedBinding) -> BindingId {
        let ParsedBinding {
            producer,
            path,
            annotation,
        } = parsed;
        let resolved = if producer == INPUTS {
            if self.has_inputs {
                Some(Producer::Inputs)
            } else {
                self.diagnostics.step(
                    Code::B202,
                    step,
                    field,
                    format!("binding '{raw}' reads workflow inputs, but the workflow declares none"),
                );
                None
            }
        } else {
            match self.plan.producer(&producer) {
                Some(index) => Some(Producer::Step(index)),
                None => {
                    self.diagnostics
                        .step(
                            Code::B202,
                            step,
                            field,
                            format!("binding '{raw}' refers to unknown producer '{producer}'"),
                        )
                        .suggest("bind to the store_as name of an earlier step");
                    None
                }
            }
        };
        let id = self.arena.alloc(
            raw,
            producer,
            path,
            annotation,
            BindingSite {
                step,
                field: field.to_string(),
            },
        );
        if let Some(producer) = resolved {
            self.arena.set_resolved(id, producer);
        }
        id
    }

    fn malformed(&mut self, step: usize, field: &str, text: &str, reason: &str) {
        self.diagnostics.step(
            Code::B206,
            step,
            field,
            format!("malformed binding in '{text}': {reason}"),
        );
    }
}

fn raw_of(parsed: &ParsedBinding) -> String {
    let mut raw = format!("${{{}", parsed.producer);
    for segment in &parsed.path {
        raw.push_str(&segment.to_string());
    }
    if let Some(annotation) = &parsed.annotation {
        raw.push_str(": ");
        raw.push_str(annotation);
    }
    raw.push('}');
    raw
}
