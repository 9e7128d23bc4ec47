//! L3 rules: binding and literal types against consumer input contracts,
//! plus gate and condition expressions.

mod helpers;

use flowcheck::Level;
use flowcheck::report::{Code, Fix};
use helpers::*;

/// A checkpointed `mutate` step reading from `plan`, with `bindings` spliced
/// into its flow-mapping `input_bindings`.
fn mutate_with(bindings: &str, extra: &str) -> String {
    format!(
        r#"
steps:
  - {{capability: checkpoint, store_as: c, purpose: save}}
  - {{capability: plan, store_as: p, purpose: think}}
  - {{capability: mutate, store_as: m, purpose: change, input_bindings: {{target: x, {bindings}}}{extra}}}
"#
    )
}

#[test]
fn unknown_parameter_on_closed_contract() {
    let report = validate(
        "steps:\n  - {capability: transform, store_as: t, purpose: x, input_bindings: {extra: 1}}\n",
        Level::L3,
    );
    assert_eq!(report.codes(), vec![Code::B207]);
    assert_eq!(fields_with(&report, Code::B207), vec!["input_bindings.extra"]);
    assert_eq!(
        report.diagnostics[0].suggestion.as_deref(),
        Some("known parameters: data")
    );
}

#[test]
fn open_contract_accepts_extra_parameters() {
    let report = validate(
        r#"
steps:
  - {capability: transform, store_as: t, purpose: x}
  - {capability: verify, store_as: v, purpose: y, input_bindings: {subject: s, severity: 3}}
"#,
        Level::L3,
    );
    assert_clean(&report);
}

#[test]
fn missing_required_input() {
    let report = validate(
        "steps:\n  - {capability: retrieve, store_as: r, purpose: fetch}\n",
        Level::L3,
    );
    assert_eq!(report.codes(), vec![Code::B208]);
    assert_eq!(fields_with(&report, Code::B208), vec!["input_bindings.query"]);
    assert_clean(&validate(
        "steps:\n  - {capability: retrieve, store_as: r, purpose: fetch}\n",
        Level::L2,
    ));
}

#[test]
fn narrowing_binding_needs_explicit_coercion() {
    let report = validate(&mutate_with("count: \"${p.output.score}\"", ""), Level::L3);
    assert_eq!(report.codes(), vec![Code::B203]);
    let d = &report.diagnostics[0];
    assert_eq!(d.location.step, Some(2));
    assert_eq!(d.location.field.as_deref(), Some("input_bindings.count"));
    assert_eq!(
        d.fix,
        Some(Fix::Coerce {
            step: 2,
            param: "count".into(),
            target: "integer".into()
        })
    );
    assert_eq!(
        d.suggestion.as_deref(),
        Some("add `coerce: {count: integer}` to step 2")
    );
}

#[test]
fn declared_coercion_downgrades_to_a_warning() {
    let report = validate(
        &mutate_with("count: \"${p.output.score}\"", ", coerce: {count: integer}"),
        Level::L3,
    );
    assert_eq!(report.codes(), vec![Code::B209]);
    assert!(report.passed());
    assert!(report.diagnostics[0].message.contains("explicitly coerced"));
}

#[test]
fn declared_coercion_must_reach_the_parameter_type() {
    let report = validate(
        &mutate_with("count: \"${p.output.score}\"", ", coerce: {count: boolean}"),
        Level::L3,
    );
    assert_eq!(report.codes(), vec![Code::B203]);
    assert!(!report.passed());
    assert_eq!(fields_with(&report, Code::B203), vec!["coerce.count"]);
    assert_eq!(
        report.diagnostics[0].suggestion.as_deref(),
        Some("use `coerce: {count: integer}`")
    );

    let still_number = validate(
        &mutate_with("count: \"${p.output.score}\"", ", coerce: {count: number}"),
        Level::L3,
    );
    assert_eq!(still_number.codes(), vec![Code::B203]);

    let garbled = validate(
        &mutate_with("count: \"${p.output.score}\"", ", coerce: {count: decimal}"),
        Level::L3,
    );
    assert_eq!(garbled.codes(), vec![Code::B205]);
    assert_eq!(fields_with(&garbled, Code::B205), vec!["coerce.count"]);
}

#[test]
fn implicit_widening_of_a_binding_is_a_hint() {
    let report = validate(&mutate_with("ratio: \"${p.output.steps}\"", ""), Level::L3);
    assert_eq!(report.codes(), vec![Code::B209]);
    assert!(report.passed());
}

#[test]
fn literals_coerce_implicitly_without_a_hint() {
    let report = validate(&mutate_with("ratio: 3, mode: fast", ""), Level::L3);
    assert_clean(&report);
}

#[test]
fn literals_outside_an_enum_are_mismatches() {
    let report = validate(&mutate_with("mode: slow", ""), Level::L3);
    assert_eq!(report.codes(), vec![Code::B203]);
    assert!(report.diagnostics[0].fix.is_none());
}

#[test]
fn narrowing_literal_has_no_fix() {
    let report = validate(&mutate_with("count: 2.5", ""), Level::L3);
    assert_eq!(report.codes(), vec![Code::B203]);
    assert!(report.diagnostics[0].fix.is_none());
}

#[test]
fn enum_bindings_match_and_strings_flow_into_enums() {
    let exact = validate(&mutate_with("mode: \"${p.output.mode}\"", ""), Level::L3);
    assert_clean(&exact);

    let loose = validate(&mutate_with("mode: \"${p.output.label}\"", ""), Level::L3);
    assert_eq!(loose.codes(), vec![Code::B209]);
}

#[test]
fn structurally_incompatible_binding() {
    let report = validate(&mutate_with("count: \"${p.output.items}\"", ""), Level::L3);
    assert_eq!(report.codes(), vec![Code::B203]);
    assert!(report.diagnostics[0].fix.is_none());
    assert!(!report.passed());
}

#[test]
fn templates_are_strings() {
    let report = validate(
        &mutate_with("mode: \"${p.output.mode}\", count: \"n=${p.output.steps}\"", ""),
        Level::L3,
    );
    assert_eq!(report.codes(), vec![Code::B203]);
    assert!(matches!(report.diagnostics[0].fix, Some(Fix::Coerce { .. })));
}

#[test]
fn bundle_objects_match_by_required_properties() {
    let report = validate(
        r#"
steps:
  - {capability: retrieve, store_as: r, purpose: fetch, input_bindings: {query: q}}
  - capability: retrieve
    store_as: again
    purpose: refetch
    input_bindings:
      query: ${r.output.documents[0].id}
      limit: ${r.output.total}
"#,
        Level::L3,
    );
    assert_clean(&report);
}

#[test]
fn conditions_must_compare_compatible_types() {
    let report = validate(
        r#"
steps:
  - {capability: plan, store_as: p, purpose: think}
  - capability: transform
    store_as: t
    purpose: shape
    condition: ${p.output.label} > 3
  - capability: remember
    store_as: r
    purpose: keep
    condition: ${p.output.steps}
  - capability: transform
    store_as: t2
    purpose: reshape
    condition: ${p.output.approved} && ${p.output.mode} == 'fast' || ${p.output.label} == null
"#,
        Level::L3,
    );
    assert_eq!(steps_with(&report, Code::B203), vec![Some(1), Some(2)]);
    assert_eq!(fields_with(&report, Code::B203), vec!["condition", "condition"]);
    assert!(report.diagnostics[0].message.contains("needs two numbers or two strings"));
    assert!(report.diagnostics[1].message.contains("must be boolean"));
}

#[test]
fn gates_are_type_checked() {
    let report = validate(
        r#"
steps:
  - {capability: plan, store_as: p, purpose: think}
  - capability: transform
    store_as: t
    purpose: shape
    gates:
      - {when: "${t.output.size} >= 10", action: stop}
      - {when: "${t.output.result} == true", action: skip}
"#,
        Level::L3,
    );
    assert_eq!(report.codes(), vec![Code::B203]);
    assert_eq!(fields_with(&report, Code::B203), vec!["gates[1].when"]);
}
