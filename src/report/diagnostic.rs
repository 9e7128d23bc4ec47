//! A single coded finding with its location.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::codes::{Category, Code, Severity};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub workflow: String,
    /// Zero-based index into the workflow's step list.
    pub step: Option<usize>,
    pub field: Option<String>,
}

/// Machine-applicable repair attached by the stage that found the problem.
/// Consumed by the patch generator; never serialized with the diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fix {
    /// Insert a step invoking `capability` ahead of `before`.
    InsertStep { capability: String, before: usize },
    /// Add a `coerce` entry for `param` on `step`.
    Coerce {
        step: usize,
        param: String,
        target: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub code: Code,
    pub message: String,
    pub location: Location,
    pub suggestion: Option<String>,
    pub fix: Option<Fix>,
}

impl Diagnostic {
    pub fn new(code: Code, message: impl Into<String>, location: Location) -> Self {
        Diagnostic {
            code,
            message: message.into(),
            location,
            suggestion: None,
            fix: None,
        }
    }

    pub fn suggest(&mut self, suggestion: impl Into<String>) -> &mut Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_fix(&mut self, fix: Fix) -> &mut Self {
        self.fix = Some(fix);
        self
    }

    pub fn name(&self) -> &'static str {
        self.code.name()
    }

    pub fn category(&self) -> Category {
        self.code.category()
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }
}

/// Wire shape: `{code, name, message, location:{workflow, step, field}, suggestion}`.
impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Diagnostic", 5)?;
        state.serialize_field("code", self.code.as_str())?;
        state.serialize_field("name", self.code.name())?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("location", &self.location)?;
        state.serialize_field("suggestion", &self.suggestion)?;
        state.end()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.code, self.code.name(), self.message)?;
        match (&self.location.step, &self.location.field) {
            (Some(step), Some(field)) => write!(f, " (step {}, field '{}')", step, field),
            (Some(step), None) => write!(f, " (step {})", step),
            (None, Some(field)) => write!(f, " (field '{}')", field),
            (None, None) => Ok(()),
        }
    }
}
