//! L1 dependency rules: capability existence, edge obligations, safety
//! invariants, binding order and acyclicity.
//!
//! Edge diagnostics are located at `<edge type>.<capability>`, for example
//! `requires.verify`.

use std::collections::HashSet;

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::binding::{BindingId, Producer, ResolvedBindings};
use crate::ontology::{EdgeType, Enforcement, OntologyIndex, Risk};
use crate::parse::{PlannedStep, WorkflowDocument, WorkflowPlan};
use crate::report::{Code, Diagnostics, Fix};

/// What later stages must skip.
#[derive(Debug, Default)]
pub struct DependencyOutcome {
    /// Steps whose capability is missing or unknown.
    pub unknown_steps: HashSet<usize>,
    /// Bindings that read a producer not available at the consumer.
    pub unavailable: HashSet<BindingId>,
}

/// Run all L1 rules.
pub fn check_dependencies(
    ontology: &OntologyIndex,
    workflow: &WorkflowDocument,
    plan: &WorkflowPlan<'_>,
    bindings: &ResolvedBindings,
    diagnostics: &mut Diagnostics,
) -> DependencyOutcome {
    let mut outcome = DependencyOutcome::default();

    v101_known_capabilities(ontology, plan, &mut outcome, diagnostics);
    edge_obligations(ontology, plan, &outcome, diagnostics);
    f501_checkpoint_before_mutation(ontology, plan, diagnostics);
    f503_rollback_needs_checkpoint(ontology, plan, diagnostics);
    f502_high_risk_approval(ontology, workflow, plan, diagnostics);
    b202_binding_order(plan, bindings, &mut outcome, diagnostics);
    v108_no_dependency_cycles(ontology, plan, bindings, diagnostics);

    outcome
}

fn v101_known_capabilities(
    ontology: &OntologyIndex,
    plan: &WorkflowPlan<'_>,
    outcome: &mut DependencyOutcome,
    diagnostics: &mut Diagnostics,
) {
    for step in &plan.steps {
        let Some(capability) = step.capability else {
            // Already reported as V103.
            outcome.unknown_steps.insert(step.index);
            continue;
        };
        if ontology.contains(capability) {
            continue;
        }
        outcome.unknown_steps.insert(step.index);
        let diagnostic = diagnostics.step(
            Code::V101,
            step.index,
            "capability",
            format!("unknown capability '{capability}'"),
        );
        if let Some(nearest) = ontology.suggest(capability) {
            diagnostic.suggest(format!("Did you mean '{nearest}'?"));
        }
    }
}

/// True when some step running before `step` invokes `required` or a
/// specialization of it.
fn provided_before(
    ontology: &OntologyIndex,
    plan: &WorkflowPlan<'_>,
    step: &PlannedStep<'_>,
    required: &str,
) -> bool {
    plan.earlier(step.index)
        .filter_map(|s| s.capability)
        .any(|c| ontology.satisfies(c, required))
}

fn present_anywhere(ontology: &OntologyIndex, plan: &WorkflowPlan<'_>, required: &str) -> bool {
    plan.steps
        .iter()
        .filter_map(|s| s.capability)
        .any(|c| ontology.satisfies(c, required))
}

/// One pass over every edge type, dispatched on its policy.
fn edge_obligations(
    ontology: &OntologyIndex,
    plan: &WorkflowPlan<'_>,
    outcome: &DependencyOutcome,
    diagnostics: &mut Diagnostics,
) {
    for step in &plan.steps {
        if outcome.unknown_steps.contains(&step.index) {
            continue;
        }
        let Some(capability) = step.capability else {
            continue;
        };

        for edge_type in EdgeType::ALL {
            match edge_type.policy().enforcement {
                Enforcement::Prerequisite(code) => {
                    for required in ontology.neighbors(capability, edge_type) {
                        if provided_before(ontology, plan, step, required) {
                            continue;
                        }
                        let when = if present_anywhere(ontology, plan, required) {
                            "runs only after"
                        } else {
                            "is missing before"
                        };
                        let diagnostic = diagnostics.step(
                            code,
                            step.index,
                            format!("{edge_type}.{required}"),
                            format!(
                                "'{capability}' {edge_type} '{required}', which {when} step {}",
                                step.index
                            ),
                        );
                        diagnostic.suggest(format!(
                            "insert a '{required}' step before step {}",
                            step.index
                        ));
                        if code == Code::V102 {
                            diagnostic.with_fix(Fix::InsertStep {
                                capability: required.to_string(),
                                before: plan.insertion_point(step.index),
                            });
                        }
                    }
                }
                Enforcement::Ordering => {
                    for earlier in ontology.preceded_by(capability) {
                        if !present_anywhere(ontology, plan, earlier)
                            || provided_before(ontology, plan, step, earlier)
                        {
                            continue;
                        }
                        diagnostics
                            .step(
                                Code::V102,
                                step.index,
                                format!("{edge_type}.{earlier}"),
                                format!(
                                    "'{earlier}' must precede '{capability}', but no '{earlier}' step runs before step {}",
                                    step.index
                                ),
                            )
                            .suggest(format!("move a '{earlier}' step before step {}", step.index))
                            .with_fix(Fix::InsertStep {
                                capability: earlier.to_string(),
                                before: plan.insertion_point(step.index),
                            });
                    }
                }
                Enforcement::Exclusive => {
                    for other in &plan.steps[..step.index] {
                        let Some(other_cap) = other.capability else {
                            continue;
                        };
                        if ontology.conflicts(capability, other_cap) {
                            diagnostics.step(
                                Code::V105,
                                step.index,
                                format!("{edge_type}.{other_cap}"),
                                format!(
                                    "'{capability}' conflicts with '{other_cap}' used by step {}",
                                    other.index
                                ),
                            );
                        }
                    }
                }
                Enforcement::Substitution | Enforcement::Informational => {}
            }
        }
    }
}

fn needs_checkpoint(ontology: &OntologyIndex, step: &PlannedStep<'_>) -> Option<&'static str> {
    if step.doc.mutation {
        Some("mutation")
    } else if step.doc.requires_checkpoint {
        Some("requires_checkpoint")
    } else if step
        .capability
        .and_then(|c| ontology.get(c))
        .is_some_and(|c| c.mutation)
    {
        Some("capability")
    } else {
        None
    }
}

fn checkpoint_before(ontology: &OntologyIndex, plan: &WorkflowPlan<'_>, step: usize) -> bool {
    plan.earlier(step)
        .filter_map(|s| s.capability)
        .any(|c| ontology.is_checkpoint_provider(c))
}

fn f501_checkpoint_before_mutation(
    ontology: &OntologyIndex,
    plan: &WorkflowPlan<'_>,
    diagnostics: &mut Diagnostics,
) {
    for step in &plan.steps {
        let Some(field) = needs_checkpoint(ontology, step) else {
            continue;
        };
        if checkpoint_before(ontology, plan, step.index) {
            continue;
        }
        let diagnostic = diagnostics.step(
            Code::F501,
            step.index,
            field,
            format!("step {} mutates state without an earlier checkpoint", step.index),
        );
        if let Some(provider) = ontology.default_checkpoint() {
            diagnostic
                .suggest(format!("insert a '{provider}' step before step {}", step.index))
                .with_fix(Fix::InsertStep {
                    capability: provider.to_string(),
                    before: plan.insertion_point(step.index),
                });
        }
    }
}

fn f503_rollback_needs_checkpoint(
    ontology: &OntologyIndex,
    plan: &WorkflowPlan<'_>,
    diagnostics: &mut Diagnostics,
) {
    for step in &plan.steps {
        if !step.doc.has_rollback() {
            continue;
        }
        let here = step
            .capability
            .is_some_and(|c| ontology.is_checkpoint_provider(c));
        if here || checkpoint_before(ontology, plan, step.index) {
            continue;
        }
        diagnostics.step(
            Code::F503,
            step.index,
            "failure_modes",
            format!(
                "step {} declares a rollback but no checkpoint precedes it",
                step.index
            ),
        );
    }
}

fn f502_high_risk_approval(
    ontology: &OntologyIndex,
    workflow: &WorkflowDocument,
    plan: &WorkflowPlan<'_>,
    diagnostics: &mut Diagnostics,
) {
    if workflow.risk != Risk::High {
        return;
    }
    for step in &plan.steps {
        let Some(capability) = step.capability.and_then(|c| ontology.get(c)) else {
            continue;
        };
        if capability.risk == Risk::High && !step.doc.requires_approval {
            diagnostics
                .step(
                    Code::F502,
                    step.index,
                    "requires_approval",
                    format!(
                        "high-risk capability '{}' in a high-risk workflow has no approval",
                        capability.id
                    ),
                )
                .suggest("set requires_approval: true");
        }
    }
}

fn b202_binding_order(
    plan: &WorkflowPlan<'_>,
    bindings: &ResolvedBindings,
    outcome: &mut DependencyOutcome,
    diagnostics: &mut Diagnostics,
) {
    for (id, producer) in bindings.resolved() {
        let Producer::Step(producer) = producer else {
            continue;
        };
        let binding = bindings.arena.get(id);
        let consumer = binding.site.step;
        // Gates run after their step and may read its output.
        let own_gate = producer == consumer && binding.site.field.starts_with("gates[");
        if own_gate || plan.is_available(producer, consumer) {
            continue;
        }
        outcome.unavailable.insert(id);

        let message = match plan.step(producer) {
            _ if producer == consumer => {
                format!("binding '{}' reads the output of its own step", binding.raw)
            }
            Some(p) if plan.step(consumer).is_some_and(|c| p.exec >= c.exec) => format!(
                "binding '{}' reads step {producer}, which does not run before step {consumer}",
                binding.raw
            ),
            Some(PlannedStep { group: Some(g), .. }) => format!(
                "binding '{}' reads step {producer} in parallel group '{g}', which is not joined before step {consumer}",
                binding.raw
            ),
            _ => format!("binding '{}' cannot be resolved at step {consumer}", binding.raw),
        };
        diagnostics.step(Code::B202, consumer, binding.site.field.clone(), message);
    }
}

/// Step graph over binding and `requires` edges.
fn v108_no_dependency_cycles(
    ontology: &OntologyIndex,
    plan: &WorkflowPlan<'_>,
    bindings: &ResolvedBindings,
    diagnostics: &mut Diagnostics,
) {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = plan.steps.iter().map(|s| graph.add_node(s.index)).collect();

    for (id, producer) in bindings.resolved() {
        let Producer::Step(producer) = producer else {
            continue;
        };
        let consumer = bindings.arena.get(id).site.step;
        if producer != consumer {
            graph.update_edge(nodes[producer], nodes[consumer], ());
        }
    }

    for step in &plan.steps {
        let Some(capability) = step.capability else {
            continue;
        };
        for required in ontology.neighbors(capability, EdgeType::Requires) {
            let discharges = |s: &&PlannedStep<'_>| {
                s.index != step.index && s.capability.is_some_and(|c| ontology.satisfies(c, required))
            };
            // Edges come from the providers that run earlier; with none, the
            // late ones (already a V102).
            let mut from: Vec<usize> = plan
                .earlier(step.index)
                .filter(&discharges)
                .map(|s| s.index)
                .collect();
            if from.is_empty() {
                from = plan.steps.iter().filter(&discharges).map(|s| s.index).collect();
            }
            for provider in from {
                graph.update_edge(nodes[provider], nodes[step.index], ());
            }
        }
    }

    if !is_cyclic_directed(&graph) {
        return;
    }
    for scc in tarjan_scc(&graph) {
        if scc.len() < 2 {
            continue;
        }
        let mut members: Vec<usize> = scc.iter().map(|n| graph[*n]).collect();
        members.sort_unstable();
        let listed: Vec<String> = members.iter().map(|m| m.to_string()).collect();
        diagnostics.global(
            Code::V108,
            Some("steps"),
            format!("steps {} depend on each other", listed.join(", ")),
        );
    }
}
