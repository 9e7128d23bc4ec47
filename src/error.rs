//! Process-level error types.
//!
//! Problems found in a workflow are never errors: they are diagnostics in a
//! `Report`. The types here cover the cases where no report can be produced
//! at all.

use std::path::PathBuf;
use std::time::Duration;

use crate::schema::SchemaError;

/// The ontology, schema bundle or configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("ontology is invalid: duplicate capability id '{0}'")]
    DuplicateCapability(String),
    #[error("ontology is invalid: capability '{0}' requires itself")]
    SelfRequires(String),
    #[error("ontology is invalid: capability '{from}' has a {edge} edge to unknown capability '{to}'")]
    UnknownEdgeTarget {
        from: String,
        edge: String,
        to: String,
    },
    #[error("ontology is invalid: cycle in {edge} edges: {}", members.join(" -> "))]
    Cycle { edge: String, members: Vec<String> },
    #[error("ontology is invalid: schema of capability '{capability}': {source}")]
    CapabilitySchema {
        capability: String,
        #[source]
        source: SchemaError,
    },
    #[error("schema bundle is invalid: {0}")]
    Schema(#[from] SchemaError),
    #[error("ontology is invalid: {0}")]
    Document(String),
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reading {} timed out after {timeout_ms} ms", path.display())]
    Timeout { path: PathBuf, timeout_ms: u64 },
    #[error("invalid configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

/// A validation call that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("validation did not finish within {0:?}")]
    Deadline(Duration),
    #[error("validation worker panicked")]
    WorkerPanicked,
}
