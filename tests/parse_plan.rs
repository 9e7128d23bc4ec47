//! Document parsing, step structure and binding syntax.

mod helpers;

use flowcheck::parse::DocumentFormat;
use flowcheck::report::Code;
use flowcheck::{Level, validate_str};
use helpers::*;

#[test]
fn unparseable_document_is_a_single_v100() {
    let yaml = include_str!("fixtures/workflows/broken.yaml");
    let report = validate(yaml, Level::L4);
    assert_eq!(report.codes(), vec![Code::V100]);
    assert!(!report.passed());
    assert_eq!(report.workflow, "test");
}

#[test]
fn non_mapping_document_is_malformed() {
    let report = validate("- just\n- a list\n", Level::L1);
    assert_eq!(report.codes(), vec![Code::V100]);
}

#[test]
fn json_documents_are_accepted() {
    let json = r#"{"name": "j", "steps": [{"capability": "transform", "store_as": "t", "purpose": "x"}]}"#;
    let report = validate_str(&context(), json, DocumentFormat::Json, "fallback", Level::L4);
    assert_eq!(report.workflow, "j");
    assert_clean(&report);
}

#[test]
fn empty_workflow_is_fatal() {
    let report = validate("name: empty\nsteps: []\n", Level::L1);
    assert_eq!(report.codes(), vec![Code::V109]);
    assert_eq!(report.diagnostics[0].location.field.as_deref(), Some("steps"));
}

#[test]
fn missing_step_fields_are_each_reported() {
    let report = validate("steps:\n  - {capability: transform, purpose: \"  \"}\n", Level::L1);
    assert_eq!(report.codes(), vec![Code::V103, Code::V103]);
    assert_eq!(fields_with(&report, Code::V103), vec!["purpose", "store_as"]);
}

#[test]
fn duplicate_store_as_is_fatal() {
    let report = validate(
        r#"
steps:
  - {capability: transform, store_as: t, purpose: one}
  - {capability: transform, store_as: t, purpose: two}
"#,
        Level::L1,
    );
    assert_eq!(report.codes(), vec![Code::V104]);
    assert_eq!(report.diagnostics[0].location.step, Some(1));
}

#[test]
fn inputs_is_a_reserved_name() {
    let report = validate(
        "steps:\n  - {capability: transform, store_as: inputs, purpose: x}\n",
        Level::L1,
    );
    assert_eq!(report.codes(), vec![Code::V104]);
}

#[test]
fn parallel_group_cannot_reopen() {
    let report = validate(
        r#"
steps:
  - {capability: transform, store_as: a, purpose: x, parallel_group: g}
  - {capability: remember, store_as: b, purpose: x}
  - {capability: transform, store_as: c, purpose: x, parallel_group: g}
"#,
        Level::L1,
    );
    assert_eq!(steps_with(&report, Code::V106), vec![Some(2)]);
}

#[test]
fn join_without_group_is_invalid() {
    let report = validate(
        "steps:\n  - {capability: transform, store_as: a, purpose: x, join: all}\n",
        Level::L1,
    );
    assert_eq!(fields_with(&report, Code::V106), vec!["join"]);
}

#[test]
fn malformed_bindings_are_reported_where_they_occur() {
    let report = validate(
        r#"
steps:
  - {capability: transform, store_as: t, purpose: x}
  - capability: plan
    store_as: p
    purpose: y
    condition: "${t.size} >"
    input_bindings:
      goal: "${t.output.}"
      context: ["ok", "${t.output.result"]
    gates:
      - {when: "${t..size} == 1", action: skip}
"#,
        Level::L3,
    );
    assert_eq!(report.count(Code::B206), 4);
    assert_eq!(
        fields_with(&report, Code::B206),
        vec![
            "condition",
            "gates[0].when",
            "input_bindings.context",
            "input_bindings.goal"
        ]
    );
}

#[test]
fn workflow_name_falls_back_to_caller_name() {
    let report = validate("steps:\n  - {capability: transform, store_as: t, purpose: x}\n", Level::L1);
    assert_eq!(report.workflow, "test");
    assert!(report.passed());
}
