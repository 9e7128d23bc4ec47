//! Capability ontology: document model, edge policies and the lookup index.

pub mod index;
pub mod types;

pub use index::{Capability, OntologyIndex};
pub use types::{
    CapabilityRecord, EdgePolicy, EdgeRecord, EdgeType, Enforcement, Layer, OntologyDocument, Risk,
};
