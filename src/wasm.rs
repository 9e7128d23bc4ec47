//! WASM entry points for browser use.

use wasm_bindgen::prelude::*;

use crate::context::ValidationContext;
use crate::engine::{Level, validate_str};
use crate::parse::{DocumentFormat, parse_value};
use crate::report::Report;

/// Validate a workflow (YAML or JSON) against an ontology (YAML or JSON) at
/// `level` ("L1".."L4"; empty means L4).
/// Returns the report object, or `{status: "error", message}` when the
/// ontology cannot be loaded.
#[wasm_bindgen]
pub fn validate_workflow(ontology: &str, workflow: &str, level: &str) -> JsValue {
    let result = validate_workflow_inner(ontology, workflow, level);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn validate_workflow_inner(ontology: &str, workflow: &str, level: &str) -> ValidateResult {
    let level = if level.trim().is_empty() {
        Level::default()
    } else {
        match level.parse::<Level>() {
            Ok(l) => l,
            Err(message) => return ValidateResult::Error { message },
        }
    };
    let ctx = match build_context(ontology) {
        Ok(ctx) => ctx,
        Err(message) => return ValidateResult::Error { message },
    };
    let report = validate_str(&ctx, workflow, DocumentFormat::Yaml, "workflow", level);
    ValidateResult::Report(report)
}

/// Load an ontology and report whether it is valid.
/// Returns `{ok, error, capabilities, edges}`.
#[wasm_bindgen]
pub fn check_ontology(ontology: &str) -> JsValue {
    let result = check_ontology_inner(ontology);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn check_ontology_inner(ontology: &str) -> OntologyDto {
    match build_context(ontology) {
        Ok(ctx) => OntologyDto {
            ok: true,
            error: None,
            capabilities: ctx.ontology().len(),
            edges: ctx.ontology().edge_count(),
        },
        Err(message) => OntologyDto {
            ok: false,
            error: Some(message),
            capabilities: 0,
            edges: 0,
        },
    }
}

fn build_context(ontology: &str) -> Result<std::sync::Arc<ValidationContext>, String> {
    let document = parse_value(ontology, DocumentFormat::Yaml)
        .map_err(|e| format!("ontology is invalid: {e}"))?;
    ValidationContext::builder()
        .ontology_value(document)
        .build()
        .map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(serde::Serialize)]
#[serde(tag = "status")]
enum ValidateResult {
    #[serde(rename = "report")]
    Report(Report),
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(serde::Serialize)]
struct OntologyDto {
    ok: bool,
    error: Option<String>,
    capabilities: usize,
    edges: usize,
}
