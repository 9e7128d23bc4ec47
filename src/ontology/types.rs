//! Ontology document types and the edge policy table.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::report::Code;

/// Relation between two capabilities. An edge on `C` with `to: X` reads
/// "C <type> X".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Requires,
    SoftRequires,
    Enables,
    Precedes,
    ConflictsWith,
    AlternativeTo,
    Specializes,
}

/// How the dependency checker treats an edge type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enforcement {
    /// The target (or a specialization) must run earlier; violations carry
    /// the given code.
    Prerequisite(Code),
    /// If both ends are present, the source runs first.
    Ordering,
    /// The two ends must not both appear.
    Exclusive,
    /// The source stands in for the target.
    Substitution,
    Informational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgePolicy {
    pub enforcement: Enforcement,
    pub symmetric: bool,
    pub transitive: bool,
    pub acyclic: bool,
}

impl EdgeType {
    pub const ALL: [EdgeType; 7] = [
        EdgeType::Requires,
        EdgeType::SoftRequires,
        EdgeType::Enables,
        EdgeType::Precedes,
        EdgeType::ConflictsWith,
        EdgeType::AlternativeTo,
        EdgeType::Specializes,
    ];

    pub fn policy(self) -> EdgePolicy {
        let (enforcement, symmetric, transitive, acyclic) = match self {
            EdgeType::Requires => (Enforcement::Prerequisite(Code::V102), false, false, true),
            EdgeType::SoftRequires => (Enforcement::Prerequisite(Code::V107), false, false, false),
            EdgeType::Enables => (Enforcement::Informational, false, false, false),
            EdgeType::Precedes => (Enforcement::Ordering, false, true, true),
            EdgeType::ConflictsWith => (Enforcement::Exclusive, true, false, false),
            EdgeType::AlternativeTo => (Enforcement::Informational, true, false, false),
            EdgeType::Specializes => (Enforcement::Substitution, false, true, false),
        };
        EdgePolicy {
            enforcement,
            symmetric,
            transitive,
            acyclic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Requires => "requires",
            EdgeType::SoftRequires => "soft_requires",
            EdgeType::Enables => "enables",
            EdgeType::Precedes => "precedes",
            EdgeType::ConflictsWith => "conflicts_with",
            EdgeType::AlternativeTo => "alternative_to",
            EdgeType::Specializes => "specializes",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Layer {
    #[serde(alias = "perceive")]
    Perceive,
    #[serde(alias = "understand")]
    Understand,
    #[serde(alias = "reason")]
    Reason,
    #[serde(alias = "model")]
    Model,
    #[serde(alias = "synthesize")]
    Synthesize,
    #[serde(alias = "execute")]
    Execute,
    #[serde(alias = "verify")]
    Verify,
    #[serde(alias = "remember")]
    Remember,
    #[serde(alias = "coordinate")]
    Coordinate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub id: String,
    pub layer: Layer,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub risk: Risk,
    #[serde(default)]
    pub mutation: bool,
    #[serde(default)]
    pub provides_checkpoint: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub soft_requires: Vec<String>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}

impl CapabilityRecord {
    /// Every outgoing edge, with the `requires`/`soft_requires` shorthand
    /// lists folded in.
    pub fn all_edges(&self) -> impl Iterator<Item = (EdgeType, &str)> {
        self.requires
            .iter()
            .map(|to| (EdgeType::Requires, to.as_str()))
            .chain(
                self.soft_requires
                    .iter()
                    .map(|to| (EdgeType::SoftRequires, to.as_str())),
            )
            .chain(self.edges.iter().map(|e| (e.edge_type, e.to.as_str())))
    }
}

/// Top-level ontology file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<Value>,
    pub capabilities: Vec<CapabilityRecord>,
}
