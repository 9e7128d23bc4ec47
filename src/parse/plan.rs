//! Ordered step plan with effective execution indices.
//!
//! Sequential steps get increasing indices. Contiguous steps sharing a
//! `parallel_group` share one index. A `join` step closes the group right
//! before it and runs after all of its members.

use std::collections::{HashMap, HashSet};

use super::types::{StepDocument, WorkflowDocument};
use crate::report::{Code, Diagnostics};

/// Reserved producer name for the workflow's `inputs` schema.
pub const INPUTS: &str = "inputs";

#[derive(Debug, Clone)]
pub struct PlannedStep<'w> {
    pub index: usize,
    /// Effective execution index (band).
    pub exec: usize,
    pub capability: Option<&'w str>,
    pub store_as: Option<&'w str>,
    pub group: Option<&'w str>,
    /// Parallel group this step joins.
    pub joins: Option<&'w str>,
    pub doc: &'w StepDocument,
}

#[derive(Debug)]
pub struct WorkflowPlan<'w> {
    pub steps: Vec<PlannedStep<'w>>,
    producers: HashMap<&'w str, usize>,
    group_start: HashMap<&'w str, usize>,
    joined_at: HashMap<&'w str, usize>,
}

impl<'w> WorkflowPlan<'w> {
    pub fn build(workflow: &'w WorkflowDocument, diagnostics: &mut Diagnostics) -> Self {
        let mut plan = WorkflowPlan {
            steps: Vec::with_capacity(workflow.steps.len()),
            producers: HashMap::new(),
            group_start: HashMap::new(),
            joined_at: HashMap::new(),
        };

        if workflow.steps.is_empty() {
            diagnostics.global(Code::V109, Some("steps"), "workflow has no steps");
            return plan;
        }

        let mut next_exec = 0;
        let mut open_group: Option<&'w str> = None;
        let mut closed: HashSet<&'w str> = HashSet::new();

        for (index, step) in workflow.steps.iter().enumerate() {
            check_required_fields(index, step, diagnostics);

            let store_as = step.store_as();
            if let Some(name) = store_as {
                if name == INPUTS {
                    diagnostics.step(
                        Code::V104,
                        index,
                        "store_as",
                        format!("store_as '{INPUTS}' is reserved for workflow inputs"),
                    );
                } else if let Some(first) = plan.producers.get(name) {
                    diagnostics.step(
                        Code::V104,
                        index,
                        "store_as",
                        format!("store_as '{name}' is already used by step {first}"),
                    );
                } else {
                    plan.producers.insert(name, index);
                }
            }

            let group = step.parallel_group();
            let mut joins = None;
            let exec = match group {
                Some(g) if open_group == Some(g) => next_exec - 1,
                Some(g) => {
                    if let Some(previous) = open_group.take() {
                        closed.insert(previous);
                    }
                    if closed.contains(g) {
                        diagnostics.step(
                            Code::V106,
                            index,
                            "parallel_group",
                            format!("parallel group '{g}' reappears after it was closed"),
                        );
                    }
                    open_group = Some(g);
                    plan.group_start.entry(g).or_insert(index);
                    next_exec += 1;
                    next_exec - 1
                }
                None => {
                    let previous = open_group.take();
                    if let Some(previous) = previous {
                        closed.insert(previous);
                    }
                    if step.join.is_some() {
                        match previous {
                            Some(g) => {
                                joins = Some(g);
                                plan.joined_at.entry(g).or_insert(index);
                            }
                            None => {
                                diagnostics.step(
                                    Code::V106,
                                    index,
                                    "join",
                                    "join has no parallel group immediately before it",
                                );
                            }
                        }
                    }
                    next_exec += 1;
                    next_exec - 1
                }
            };

            if group.is_some() && step.join.is_some() {
                diagnostics.step(
                    Code::V106,
                    index,
                    "join",
                    "a join step cannot itself be a member of a parallel group",
                );
            }

            plan.steps.push(PlannedStep {
                index,
                exec,
                capability: step.capability(),
                store_as,
                group,
                joins,
                doc: step,
            });
        }

        plan
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&PlannedStep<'w>> {
        self.steps.get(index)
    }

    /// Index of the step whose `store_as` is `name`.
    pub fn producer(&self, name: &str) -> Option<usize> {
        self.producers.get(name).copied()
    }

    pub fn joined_at(&self, group: &str) -> Option<usize> {
        self.joined_at.get(group).copied()
    }

    /// True when a value produced by `producer` is available to `consumer`:
    /// the producer runs in an earlier band and, if it is a group member,
    /// its group was joined at or before the consumer.
    pub fn is_available(&self, producer: usize, consumer: usize) -> bool {
        let (Some(p), Some(c)) = (self.steps.get(producer), self.steps.get(consumer)) else {
            return false;
        };
        if p.exec >= c.exec {
            return false;
        }
        match p.group {
            Some(g) => self.joined_at(g).is_some_and(|j| j <= consumer),
            None => true,
        }
    }

    /// Where a step must be inserted to run before `step`: the start of its
    /// parallel band, or of the group it joins.
    pub fn insertion_point(&self, step: usize) -> usize {
        let Some(planned) = self.steps.get(step) else {
            return step;
        };
        match (planned.group, planned.joins) {
            (Some(g), _) | (None, Some(g)) => {
                self.group_start.get(g).copied().unwrap_or(step)
            }
            (None, None) => step,
        }
    }

    /// Steps earlier than `step` in execution order.
    pub fn earlier(&self, step: usize) -> impl Iterator<Item = &PlannedStep<'w>> {
        let exec = self.steps.get(step).map_or(0, |s| s.exec);
        self.steps.iter().filter(move |s| s.exec < exec)
    }
}

fn check_required_fields(index: usize, step: &StepDocument, diagnostics: &mut Diagnostics) {
    let fields = [
        ("capability", step.capability()),
        ("store_as", step.store_as()),
        ("purpose", step.purpose()),
    ];
    for (field, value) in fields {
        if value.is_none() {
            diagnostics.step(
                Code::V103,
                index,
                field,
                format!("step {index} is missing '{field}'"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{DocumentFormat, parse};

    fn plan_of(yaml: &str) -> (Vec<usize>, Vec<Code>) {
        let parsed = parse(yaml, DocumentFormat::Yaml, "wf").unwrap();
        let mut sink = Diagnostics::new("wf");
        let plan = WorkflowPlan::build(&parsed.document, &mut sink);
        let execs = plan.steps.iter().map(|s| s.exec).collect();
        let codes = sink.finish().iter().map(|d| d.code).collect();
        (execs, codes)
    }

    #[test]
    fn contiguous_group_members_share_a_band() {
        let (execs, codes) = plan_of(
            r#"
steps:
  - {capability: a, store_as: a, purpose: x}
  - {capability: b, store_as: b, purpose: x, parallel_group: g}
  - {capability: c, store_as: c, purpose: x, parallel_group: g}
  - {capability: d, store_as: d, purpose: x, join: all}
"#,
        );
        assert_eq!(execs, vec![0, 1, 1, 2]);
        assert!(codes.is_empty());
    }

    #[test]
    fn reopened_group_and_orphan_join_are_invalid() {
        let (_, codes) = plan_of(
            r#"
steps:
  - {capability: a, store_as: a, purpose: x, parallel_group: g}
  - {capability: b, store_as: b, purpose: x}
  - {capability: c, store_as: c, purpose: x, parallel_group: g}
  - {capability: d, store_as: d, purpose: x}
  - {capability: e, store_as: e, purpose: x, join: any}
"#,
        );
        assert_eq!(codes, vec![Code::V106, Code::V106]);
    }

    #[test]
    fn missing_fields_and_duplicates() {
        let (_, codes) = plan_of(
            r#"
steps:
  - {capability: a, store_as: x}
  - {capability: b, store_as: x, purpose: p}
  - {capability: c, store_as: inputs, purpose: p}
"#,
        );
        assert_eq!(codes, vec![Code::V103, Code::V104, Code::V104]);
    }

    #[test]
    fn empty_workflow() {
        let (_, codes) = plan_of("steps: []");
        assert_eq!(codes, vec![Code::V109]);
    }
}
