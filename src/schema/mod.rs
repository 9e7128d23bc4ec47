//! Schema layer: resolved type descriptors, `$ref` resolution, and the
//! annotation grammar used by bindings.

pub mod annotation;
pub mod resolve;
pub mod types;

pub use annotation::{AnnotationError, parse_annotation};
pub use resolve::{SchemaBundle, SchemaCache, SchemaError, SchemaResolver};
pub use types::{AdditionalProperties, Primitive, SchemaKind, SchemaNode};

/// Document id under which the ontology is registered in the bundle.
pub const ONTOLOGY_DOC: &str = "ontology";
/// Document id of the workflow under validation (for `inputs` schemas).
pub const WORKFLOW_DOC: &str = "workflow";
