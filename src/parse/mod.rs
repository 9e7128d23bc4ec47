//! Parse phase: YAML/JSON text -> workflow document -> execution plan.

pub mod plan;
pub mod types;

use std::path::Path;

use serde_json::Value;

pub use plan::{PlannedStep, WorkflowPlan};
pub use types::*;

use crate::report::{Code, Diagnostic, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    Json,
    #[default]
    Yaml,
}

impl DocumentFormat {
    /// `.json` files are JSON; everything else is read as YAML, which also
    /// accepts JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Parse raw text into a JSON value.
pub fn parse_value(text: &str, format: DocumentFormat) -> Result<Value, String> {
    match format {
        DocumentFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        DocumentFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
    }
}

/// A parsed workflow: the raw value (patches are applied to it so unknown
/// keys survive) and its typed view.
#[derive(Debug, Clone)]
pub struct ParsedWorkflow {
    pub name: String,
    pub raw: Value,
    pub document: WorkflowDocument,
}

impl ParsedWorkflow {
    pub fn from_value(raw: Value, fallback_name: &str) -> Result<Self, Diagnostic> {
        let malformed = |message: String| {
            Diagnostic::new(
                Code::V100,
                message,
                Location {
                    workflow: fallback_name.to_string(),
                    step: None,
                    field: None,
                },
            )
        };
        if !raw.is_object() {
            return Err(malformed("workflow document must be a mapping".to_string()));
        }
        let document: WorkflowDocument = serde_json::from_value(raw.clone())
            .map_err(|e| malformed(format!("workflow document is malformed: {e}")))?;
        let name = document
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| fallback_name.to_string());
        Ok(ParsedWorkflow {
            name,
            raw,
            document,
        })
    }
}

/// Parse workflow text. Failures are a single `V100` diagnostic.
pub fn parse(
    text: &str,
    format: DocumentFormat,
    fallback_name: &str,
) -> Result<ParsedWorkflow, Diagnostic> {
    let raw = parse_value(text, format).map_err(|e| {
        Diagnostic::new(
            Code::V100,
            format!("workflow document is not valid {format:?}: {e}"),
            Location {
                workflow: fallback_name.to_string(),
                step: None,
                field: None,
            },
        )
    })?;
    ParsedWorkflow::from_value(raw, fallback_name)
}
