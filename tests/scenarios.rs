//! End-to-end runs over the fixture workflows: wire shape, determinism,
//! batch and deadline entry points.

mod helpers;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flowcheck::parse::{DocumentFormat, parse};
use flowcheck::{Level, ValidateError, WorkflowSource, validate_batch, validate_path, validate_with_timeout};
use helpers::*;

const RELEASE: &str = include_str!("fixtures/workflows/release.yaml");
const UNCHECKED: &str = include_str!("fixtures/workflows/unchecked_mutation.yaml");
const BROKEN: &str = include_str!("fixtures/workflows/broken.yaml");

fn source(name: &str, text: &str) -> WorkflowSource {
    WorkflowSource {
        name: name.to_string(),
        text: text.to_string(),
        format: DocumentFormat::Yaml,
    }
}

#[test]
fn unchecked_mutation_report_json() {
    let report = validate(UNCHECKED, Level::L4);
    insta::assert_json_snapshot!("unchecked_mutation_report", report);
}

#[test]
fn unchecked_mutation_report_text() {
    let report = validate(UNCHECKED, Level::L4);
    insta::assert_snapshot!("unchecked_mutation_text", report.render_text());
}

#[test]
fn reports_are_deterministic() {
    let noisy = r#"
steps:
  - {capability: verify, store_as: v, purpose: check, input_bindings: {subject: "${ghost.x}"}}
  - {capability: discard, store_as: d, purpose: drop}
  - {capability: remember, store_as: r, purpose: keep, requires_checkpoint: true}
  - {capability: mutate, store_as: m, purpose: change, input_bindings: {count: 2.5, extra: 1}}
"#;
    let first = serde_json::to_string(&validate(noisy, Level::L4)).unwrap();
    for _ in 0..5 {
        assert_eq!(serde_json::to_string(&validate(noisy, Level::L4)).unwrap(), first);
    }
}

#[test]
fn diagnostics_are_ordered_by_step_then_category() {
    let report = validate(
        r#"
steps:
  - {capability: verify, store_as: v, purpose: check, input_bindings: {subject: "${ghost.x}"}}
  - {capability: remember, store_as: r, purpose: keep, requires_checkpoint: true}
"#,
        Level::L3,
    );
    let steps: Vec<Option<usize>> = report.diagnostics.iter().map(|d| d.location.step).collect();
    let mut sorted = steps.clone();
    sorted.sort();
    assert_eq!(steps, sorted);
    // Validation before binding before safety within step 0.
    assert_eq!(
        report.codes()[..2],
        [flowcheck::Code::V102, flowcheck::Code::B202]
    );
}

#[test]
fn batch_keeps_input_order() {
    let ctx = context();
    let sources = vec![
        source("release", RELEASE),
        source("broken", BROKEN),
        source("unchecked", UNCHECKED),
        source("release-again", RELEASE),
    ];
    let reports = validate_batch(&ctx, &sources, Level::L4).unwrap();
    let names: Vec<&str> = reports.iter().map(|r| r.workflow.as_str()).collect();
    assert_eq!(names, vec!["release", "broken", "unchecked_mutation", "release"]);
    let passed: Vec<bool> = reports.iter().map(|r| r.passed()).collect();
    assert_eq!(passed, vec![true, false, false, true]);
}

#[test]
fn batch_of_nothing_is_empty() {
    assert!(validate_batch(&context(), &[], Level::L4).unwrap().is_empty());
}

#[test]
fn deadline_run_matches_direct_run() {
    let parsed = parse(UNCHECKED, DocumentFormat::Yaml, "test").unwrap();
    let direct = validate(UNCHECKED, Level::L4);
    let timed = validate_with_timeout(
        Arc::clone(&context()),
        parsed,
        Level::L4,
        Duration::from_secs(30),
    )
    .unwrap();
    assert_eq!(
        serde_json::to_value(&timed).unwrap(),
        serde_json::to_value(&direct).unwrap()
    );
}

#[test]
fn validate_path_reads_fixture_files() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/workflows");
    let ctx = context();

    let report = validate_path(&ctx, &dir.join("release.yaml"), Level::L4, Duration::from_secs(5)).unwrap();
    assert!(report.passed());

    let broken = validate_path(&ctx, &dir.join("broken.yaml"), Level::L4, Duration::from_secs(5)).unwrap();
    assert_eq!(broken.workflow, "broken");
    assert_eq!(broken.codes(), vec![flowcheck::Code::V100]);

    let missing = validate_path(&ctx, &dir.join("nope.yaml"), Level::L4, Duration::from_secs(5));
    assert!(matches!(missing, Err(ValidateError::Load(_))));
}
