#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use flowcheck::parse::{DocumentFormat, ParsedWorkflow};
use flowcheck::{Code, Level, Report, ValidationContext, validate_document, validate_str};
use serde_json::Value;

// =============================================================================
// Fixtures
// =============================================================================

pub const ONTOLOGY: &str = include_str!("../fixtures/ontology.yaml");
pub const COMMON_SCHEMAS: &str = include_str!("../fixtures/schemas/common.json");

pub fn ontology_value() -> Value {
    serde_yaml::from_str(ONTOLOGY).expect("fixture ontology is valid YAML")
}

pub fn common_schemas() -> Value {
    serde_json::from_str(COMMON_SCHEMAS).expect("fixture schemas are valid JSON")
}

/// The fixture context, built once per test binary.
pub fn context() -> Arc<ValidationContext> {
    static CONTEXT: OnceLock<Arc<ValidationContext>> = OnceLock::new();
    Arc::clone(CONTEXT.get_or_init(|| {
        ValidationContext::builder()
            .ontology_value(ontology_value())
            .schema_document("common.json", common_schemas())
            .build()
            .expect("fixture ontology loads")
    }))
}

/// Build a context from an inline YAML ontology with no schema bundle.
pub fn context_from(ontology_yaml: &str) -> Result<Arc<ValidationContext>, flowcheck::LoadError> {
    let value: Value = serde_yaml::from_str(ontology_yaml).expect("inline ontology is valid YAML");
    ValidationContext::builder().ontology_value(value).build()
}

// =============================================================================
// Validation shortcuts
// =============================================================================

pub fn validate(yaml: &str, level: Level) -> Report {
    validate_str(&context(), yaml, DocumentFormat::Yaml, "test", level)
}

/// Validate against a context other than the fixture one.
pub fn validate_in(ctx: &ValidationContext, yaml: &str, level: Level) -> Report {
    validate_str(ctx, yaml, DocumentFormat::Yaml, "test", level)
}

/// Validate a (patched) document value.
pub fn validate_value(value: Value, level: Level) -> Report {
    let parsed = ParsedWorkflow::from_value(value, "test").expect("document is a mapping");
    validate_document(&context(), &parsed, level)
}

pub fn parse_yaml(yaml: &str) -> Value {
    serde_yaml::from_str(yaml).expect("test workflow is valid YAML")
}

// =============================================================================
// Assertions
// =============================================================================

pub fn assert_has_code(report: &Report, code: Code) {
    assert!(
        report.diagnostics.iter().any(|d| d.code == code),
        "expected {code} in {:#?}",
        report.diagnostics
    );
}

pub fn assert_no_code(report: &Report, code: Code) {
    assert!(
        report.diagnostics.iter().all(|d| d.code != code),
        "unexpected {code} in {:#?}",
        report.diagnostics
    );
}

pub fn assert_clean(report: &Report) {
    assert!(
        report.diagnostics.is_empty(),
        "expected no diagnostics, got {:#?}",
        report.diagnostics
    );
    assert!(report.passed());
}

/// Steps at which `code` was reported, in report order.
pub fn steps_with(report: &Report, code: Code) -> Vec<Option<usize>> {
    report
        .diagnostics
        .iter()
        .filter(|d| d.code == code)
        .map(|d| d.location.step)
        .collect()
}

/// Fields at which `code` was reported, in report order.
pub fn fields_with(report: &Report, code: Code) -> Vec<String> {
    report
        .diagnostics
        .iter()
        .filter(|d| d.code == code)
        .filter_map(|d| d.location.field.clone())
        .collect()
}
