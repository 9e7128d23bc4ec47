//! Property tests for the binding and expression parsers.

use flowcheck::binding::parser::{TemplatePart, split_template};
use flowcheck::binding::{Segment, parse_binding, parse_expr};
use proptest::prelude::*;

fn ident() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,8}"
}

fn segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        ident().prop_map(Segment::Field),
        (0usize..100).prop_map(Segment::Index),
    ]
}

proptest! {
    #[test]
    fn arbitrary_text_never_panics(input in "\\PC{0,40}") {
        let _ = parse_binding(&input);
        let _ = parse_expr(&input);
        let _ = split_template(&input);
    }

    #[test]
    fn dollar_brace_noise_never_panics(input in "[${}.\\[\\]:a-z0-9 <>|&=!'\"]{0,30}") {
        let _ = parse_binding(&input);
        let _ = parse_expr(&input);
        let _ = split_template(&input);
    }

    #[test]
    fn well_formed_bindings_parse_back(producer in ident(), path in prop::collection::vec(segment(), 0..5)) {
        let mut text = format!("${{{producer}");
        for s in &path {
            text.push_str(&s.to_string());
        }
        text.push('}');

        let parsed = parse_binding(&text).unwrap();
        prop_assert_eq!(parsed.producer, producer);
        prop_assert_eq!(parsed.path, path);
        prop_assert!(parsed.annotation.is_none());
    }

    #[test]
    fn templates_keep_every_binding(prefix in "[a-z ]{0,6}", producer in ident(), suffix in "[a-z ]{0,6}") {
        let text = format!("{prefix}${{{producer}.value}}{suffix}");
        let parts = split_template(&text).unwrap();
        let bindings = parts
            .iter()
            .filter(|p| matches!(p, TemplatePart::Binding(_)))
            .count();
        prop_assert_eq!(bindings, 1);
    }
}
