pub mod binding;
pub mod check;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod load;
pub mod ontology;
pub mod parse;
pub mod patch;
pub mod report;
pub mod schema;
pub mod wasm;

pub use context::{ContextBuilder, ValidationContext};
pub use engine::{
    Level, WorkflowSource, validate_batch, validate_document, validate_path, validate_str,
    validate_with_timeout,
};
pub use error::{LoadError, ValidateError};
pub use report::{Code, Diagnostic, Report, Verdict};
