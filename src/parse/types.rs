//! Serde target for workflow documents (YAML or JSON).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ontology::Risk;

// =============================================================================
// TOP-LEVEL WORKFLOW
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default)]
    pub risk: Risk,
    /// Schema of the values supplied when the workflow is started. Bindings
    /// address it through the reserved producer `inputs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Value>,
    #[serde(default)]
    pub steps: Vec<StepDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success: Vec<Value>,
}

// =============================================================================
// STEPS
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepDocument {
    #[serde(
        default,
        alias = "capability_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub capability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_as: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_bindings: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<Gate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_modes: Vec<FailureMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinPolicy>,
    #[serde(default)]
    pub mutation: bool,
    #[serde(default)]
    pub requires_checkpoint: bool,
    #[serde(default)]
    pub requires_approval: bool,
    /// Explicit coercions: parameter name -> target type annotation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub coerce: BTreeMap<String, String>,
}

impl StepDocument {
    /// A field counts as present only when it is a non-blank string.
    pub fn capability(&self) -> Option<&str> {
        non_blank(self.capability.as_deref())
    }

    pub fn store_as(&self) -> Option<&str> {
        non_blank(self.store_as.as_deref())
    }

    pub fn purpose(&self) -> Option<&str> {
        non_blank(self.purpose.as_deref())
    }

    pub fn parallel_group(&self) -> Option<&str> {
        non_blank(self.parallel_group.as_deref())
    }

    pub fn has_rollback(&self) -> bool {
        self.failure_modes
            .iter()
            .any(|f| f.action == FailureAction::Rollback)
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// How a join step waits on the parallel group before it. Recorded for
/// executors; validation only needs to know that a join happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    All,
    Any,
    First,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub when: String,
    pub action: GateAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateAction {
    Stop,
    Skip,
    Escalate,
    Retry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureMode {
    pub condition: String,
    pub action: FailureAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureAction {
    Rollback,
    Retry,
    Halt,
    Skip,
    Escalate,
}
