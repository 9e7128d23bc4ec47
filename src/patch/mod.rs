//! L4 patch generation: structured repairs for fixable diagnostics.
//!
//! Patches are independent of each other and are applied to a copy of the
//! workflow document; the original is never touched.

pub mod diff;

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::parse::WorkflowPlan;
use crate::report::{Code, Diagnostic, Fix, Location};

pub use diff::unified_diff;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepTemplate {
    pub capability: String,
    pub store_as: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    InsertStep { before: usize, step: StepTemplate },
    Coerce { step: usize, param: String, target: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patch {
    /// Code of the diagnostic this patch repairs.
    pub code: Code,
    pub location: Location,
    pub description: String,
    #[serde(flatten)]
    pub op: PatchOp,
}

/// Build patches for every diagnostic that carries a fix. Identical
/// repairs are emitted once.
pub fn generate(plan: &WorkflowPlan<'_>, diagnostics: &[Diagnostic]) -> Vec<Patch> {
    let mut taken: HashSet<String> = plan
        .steps
        .iter()
        .filter_map(|s| s.store_as.map(str::to_string))
        .collect();
    let mut inserts: HashSet<(String, usize)> = HashSet::new();
    let mut coercions: HashSet<(usize, String)> = HashSet::new();
    let mut patches = Vec::new();

    for diagnostic in diagnostics {
        let Some(fix) = &diagnostic.fix else {
            continue;
        };
        let step = diagnostic.location.step.unwrap_or_default();
        let op = match fix {
            Fix::InsertStep { capability, before } => {
                if !inserts.insert((capability.clone(), *before)) {
                    continue;
                }
                let store_as = unique_name(&identifier(capability), &mut taken);
                PatchOp::InsertStep {
                    before: *before,
                    step: StepTemplate {
                        capability: capability.clone(),
                        store_as,
                        purpose: format!(
                            "Run '{capability}' before step {step} ({} {})",
                            diagnostic.code,
                            diagnostic.name()
                        ),
                    },
                }
            }
            Fix::Coerce {
                step,
                param,
                target,
            } => {
                if !coercions.insert((*step, param.clone())) {
                    continue;
                }
                PatchOp::Coerce {
                    step: *step,
                    param: param.clone(),
                    target: target.clone(),
                }
            }
        };
        patches.push(Patch {
            code: diagnostic.code,
            location: diagnostic.location.clone(),
            description: describe(&op),
            op,
        });
    }

    tracing::debug!(patches = patches.len(), "patch generation done");
    patches
}

fn describe(op: &PatchOp) -> String {
    match op {
        PatchOp::InsertStep { before, step } => format!(
            "insert step '{}' invoking '{}' before step {before}",
            step.store_as, step.capability
        ),
        PatchOp::Coerce {
            step,
            param,
            target,
        } => format!("coerce parameter '{param}' of step {step} to {target}"),
    }
}

/// Make a capability id usable as a `store_as` name.
fn identifier(capability: &str) -> String {
    let mut name: String = capability
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut n = 2;
    while taken.contains(&candidate) || candidate == crate::parse::plan::INPUTS {
        candidate = format!("{base}_{n}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

impl Patch {
    /// Apply this patch to a copy of `document`.
    pub fn apply(&self, document: &Value) -> Value {
        let mut patched = document.clone();
        self.apply_in_place(&mut patched);
        patched
    }

    fn apply_in_place(&self, document: &mut Value) {
        let Some(steps) = document.get_mut("steps").and_then(Value::as_array_mut) else {
            return;
        };
        match &self.op {
            PatchOp::InsertStep { before, step } => {
                let at = (*before).min(steps.len());
                steps.insert(
                    at,
                    json!({
                        "capability": step.capability,
                        "store_as": step.store_as,
                        "purpose": step.purpose,
                    }),
                );
            }
            PatchOp::Coerce {
                step,
                param,
                target,
            } => {
                let Some(target_step) = steps.get_mut(*step).and_then(Value::as_object_mut) else {
                    return;
                };
                let coerce = target_step
                    .entry("coerce")
                    .or_insert_with(|| Value::Object(Map::new()));
                if !coerce.is_object() {
                    *coerce = Value::Object(Map::new());
                }
                if let Some(map) = coerce.as_object_mut() {
                    map.insert(param.clone(), Value::String(target.clone()));
                }
            }
        }
    }
}

/// Apply every patch to a copy of `document`. Coercions address original
/// step indices, so they go first; insertions follow from the highest index
/// down so earlier indices stay valid.
pub fn apply_all(document: &Value, patches: &[Patch]) -> Value {
    let mut patched = document.clone();
    for patch in patches {
        if matches!(patch.op, PatchOp::Coerce { .. }) {
            patch.apply_in_place(&mut patched);
        }
    }
    let mut inserts: Vec<(usize, &Patch)> = patches
        .iter()
        .enumerate()
        .filter(|(_, p)| matches!(p.op, PatchOp::InsertStep { .. }))
        .collect();
    inserts.sort_by(|(ia, a), (ib, b)| {
        let before = |p: &Patch| match p.op {
            PatchOp::InsertStep { before, .. } => before,
            PatchOp::Coerce { .. } => 0,
        };
        before(b).cmp(&before(a)).then(ib.cmp(ia))
    });
    for (_, patch) in inserts {
        patch.apply_in_place(&mut patched);
    }
    patched
}

/// Unified diff between the original and patched documents, both rendered
/// as YAML.
pub fn render_diff(
    original: &Value,
    patched: &Value,
    label: &str,
) -> Result<String, serde_yaml::Error> {
    let before = serde_yaml::to_string(original)?;
    let after = serde_yaml::to_string(patched)?;
    Ok(unified_diff(
        &before,
        &after,
        &format!("a/{label}"),
        &format!("b/{label}"),
    ))
}
