//! L2 rules: binding paths walked through producer output schemas.

mod helpers;

use flowcheck::Level;
use flowcheck::report::Code;
use helpers::*;

/// `plan` feeding `transform.data`, which accepts anything.
fn feed(binding: &str) -> String {
    format!(
        r#"
steps:
  - {{capability: plan, store_as: p, purpose: think}}
  - {{capability: transform, store_as: t, purpose: shape, input_bindings: {{data: "{binding}"}}}}
"#
    )
}

#[test]
fn annotation_narrowing_a_union_is_accepted() {
    let report = validate(&feed("${p.output.items: array<string>}"), Level::L3);
    assert_clean(&report);
}

#[test]
fn annotation_outside_the_union_is_rejected() {
    let report = validate(&feed("${p.output.items: array<boolean>}"), Level::L2);
    assert_eq!(report.codes(), vec![Code::B205]);
    assert_eq!(fields_with(&report, Code::B205), vec!["input_bindings.data"]);
}

#[test]
fn annotation_may_widen_implicitly() {
    let report = validate(&feed("${p.output.steps: number}"), Level::L3);
    assert_clean(&report);
}

#[test]
fn unparseable_annotation_is_rejected() {
    let report = validate(&feed("${p.output.steps: decimal}"), Level::L2);
    assert_eq!(report.codes(), vec![Code::B205]);
    assert!(report.diagnostics[0].message.contains("invalid type annotation"));
}

#[test]
fn unknown_properties_are_invalid_paths() {
    let report = validate(&feed("${p.output.nope}"), Level::L2);
    assert_eq!(report.codes(), vec![Code::B201]);
    assert!(report.diagnostics[0].message.contains("'nope' is not a property"));
}

#[test]
fn primitives_cannot_be_traversed() {
    let report = validate(&feed("${p.output.steps.count}"), Level::L2);
    assert_eq!(report.codes(), vec![Code::B201]);
    assert!(report.diagnostics[0].message.contains("cannot access field 'count' of integer"));
}

#[test]
fn path_checks_start_at_l2() {
    let report = validate(&feed("${p.output.nope}"), Level::L1);
    assert_clean(&report);
}

#[test]
fn indexing_a_union_array_is_ambiguous() {
    let report = validate(&feed("${p.output.items[0]}"), Level::L2);
    assert_eq!(report.codes(), vec![Code::B204]);
    let suggestion = report.diagnostics[0].suggestion.as_deref().unwrap_or_default();
    assert!(suggestion.contains("string | integer"), "{suggestion}");
}

#[test]
fn open_objects_are_ambiguous_below_their_root() {
    let report = validate(
        r#"
steps:
  - {capability: retrieve, store_as: r, purpose: fetch, input_bindings: {query: q}}
  - {capability: transform, store_as: t, purpose: shape, input_bindings: {data: "${r.output.meta.source}"}}
"#,
        Level::L2,
    );
    assert_eq!(report.codes(), vec![Code::B204]);
}

#[test]
fn paths_follow_refs_into_the_schema_bundle() {
    let report = validate(
        r#"
steps:
  - {capability: retrieve, store_as: r, purpose: fetch, input_bindings: {query: q}}
  - {capability: verify, store_as: v, purpose: check, input_bindings: {subject: "${r.output.documents[3].text}"}}
  - {capability: transform, store_as: t, purpose: shape, input_bindings: {data: "${r.output.documents[0].author}"}}
"#,
        Level::L2,
    );
    // verify's own prerequisite is transform, which runs later.
    assert_eq!(steps_with(&report, Code::V102), vec![Some(1)]);
    assert_eq!(steps_with(&report, Code::B201), vec![Some(2)]);
}

#[test]
fn workflow_inputs_are_typed_by_their_schema() {
    let yaml = r#"
inputs:
  type: object
  properties:
    topic: {type: string}
    depth: {type: integer}
  additionalProperties: false
steps:
  - capability: plan
    store_as: p
    purpose: think
    input_bindings:
      goal: ${inputs.topic}
  - capability: transform
    store_as: t
    purpose: shape
    input_bindings:
      data: ${inputs.width}
"#;
    let report = validate(yaml, Level::L3);
    assert_eq!(report.codes(), vec![Code::B201]);
    assert_eq!(report.diagnostics[0].location.step, Some(1));
}

#[test]
fn unresolvable_inputs_schema_is_reported_once() {
    let report = validate(
        r##"
inputs: {"$ref": "missing.json#/definitions/Nope"}
steps:
  - {capability: plan, store_as: p, purpose: think, input_bindings: {goal: "${inputs.goal}"}}
"##,
        Level::L2,
    );
    assert_eq!(report.codes(), vec![Code::S301]);
    assert_eq!(report.diagnostics[0].location.field.as_deref(), Some("inputs"));
}
