//! L4 patches: generation, application and re-validation.

mod helpers;

use flowcheck::Level;
use flowcheck::patch::{PatchOp, apply_all, render_diff};
use flowcheck::report::Code;
use helpers::*;

#[test]
fn checkpoint_patch_repairs_unchecked_mutation() {
    let yaml = include_str!("fixtures/workflows/unchecked_mutation.yaml");
    let report = validate(yaml, Level::L4);
    assert_eq!(report.patches.len(), 1);
    let patch = &report.patches[0];
    assert_eq!(patch.code, Code::F501);
    match &patch.op {
        PatchOp::InsertStep { before, step } => {
            assert_eq!(*before, 1);
            assert_eq!(step.capability, "checkpoint");
            assert_eq!(step.store_as, "checkpoint");
        }
        other => panic!("unexpected {other:?}"),
    }

    let patched = apply_all(&parse_yaml(yaml), &report.patches);
    let revalidated = validate_value(patched, Level::L4);
    assert_clean(&revalidated);
}

#[test]
fn patches_never_touch_the_original() {
    let yaml = include_str!("fixtures/workflows/unchecked_mutation.yaml");
    let original = parse_yaml(yaml);
    let report = validate(yaml, Level::L4);
    let patched = report.patches[0].apply(&original);
    assert_eq!(original, parse_yaml(yaml));
    assert_eq!(patched["steps"].as_array().map(Vec::len), Some(3));
    assert_eq!(patched["steps"][1]["capability"], "checkpoint");
}

#[test]
fn insertions_apply_from_the_back() {
    let yaml = r#"
steps:
  - {capability: verify, store_as: v, purpose: check}
  - {capability: mutate, store_as: m, purpose: change, input_bindings: {target: x}}
"#;
    let report = validate(yaml, Level::L4);
    assert_eq!(report.patches.len(), 2);

    let patched = apply_all(&parse_yaml(yaml), &report.patches);
    let order: Vec<&str> = patched["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["capability"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["transform", "verify", "checkpoint", "mutate"]);
    assert_clean(&validate_value(patched, Level::L4));
}

#[test]
fn identical_repairs_are_emitted_once() {
    let report = validate(
        r#"
steps:
  - {capability: mutate, store_as: a, purpose: x, parallel_group: g, input_bindings: {target: x}}
  - {capability: mutate, store_as: b, purpose: y, parallel_group: g, input_bindings: {target: y}}
"#,
        Level::L4,
    );
    assert_eq!(report.count(Code::F501), 2);
    assert_eq!(report.patches.len(), 1);
}

#[test]
fn inserted_names_avoid_existing_store_as() {
    let report = validate(
        r#"
steps:
  - {capability: plan, store_as: checkpoint, purpose: think}
  - {capability: mutate, store_as: m, purpose: change, input_bindings: {target: x}}
"#,
        Level::L4,
    );
    match &report.patches[0].op {
        PatchOp::InsertStep { step, .. } => assert_eq!(step.store_as, "checkpoint_2"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn coercion_patch_leaves_only_a_hint() {
    let yaml = r#"
steps:
  - {capability: checkpoint, store_as: c, purpose: save}
  - {capability: plan, store_as: p, purpose: think}
  - {capability: mutate, store_as: m, purpose: change, input_bindings: {target: x, count: "${p.output.score}"}}
"#;
    let report = validate(yaml, Level::L4);
    assert_eq!(report.patches.len(), 1);
    assert_eq!(
        report.patches[0].description,
        "coerce parameter 'count' of step 2 to integer"
    );

    let patched = apply_all(&parse_yaml(yaml), &report.patches);
    assert_eq!(patched["steps"][2]["coerce"]["count"], "integer");
    let revalidated = validate_value(patched, Level::L4);
    assert_eq!(revalidated.codes(), vec![Code::B209]);
    assert!(revalidated.passed());
    assert!(revalidated.patches.is_empty());
}

#[test]
fn no_patches_below_l4() {
    let yaml = include_str!("fixtures/workflows/unchecked_mutation.yaml");
    for level in [Level::L1, Level::L2, Level::L3] {
        assert!(validate(yaml, level).patches.is_empty());
    }
}

#[test]
fn diff_shows_only_the_inserted_step() {
    let yaml = include_str!("fixtures/workflows/unchecked_mutation.yaml");
    let original = parse_yaml(yaml);
    let report = validate(yaml, Level::L4);
    let patched = apply_all(&original, &report.patches);

    let diff = render_diff(&original, &patched, "unchecked_mutation.yaml").unwrap();
    assert!(diff.starts_with("--- a/unchecked_mutation.yaml\n+++ b/unchecked_mutation.yaml\n"));
    let added: Vec<&str> = diff
        .lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
        .collect();
    assert_eq!(added.len(), 3, "{diff}");
    assert!(added.iter().any(|l| l.contains("capability: checkpoint")));
    assert!(!diff.lines().any(|l| l.starts_with('-') && !l.starts_with("---")));

    assert_eq!(render_diff(&original, &original, "same.yaml").unwrap(), "");
}
