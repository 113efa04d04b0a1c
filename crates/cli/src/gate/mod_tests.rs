// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use proptest::prelude::*;

use super::{render_template, GateError, GateResult, Verdict};

#[test]
fn verdict_precedence_deny_wins() {
    assert_eq!(Verdict::Allow.merge(Verdict::Deny), Verdict::Deny);
    assert_eq!(Verdict::Deny.merge(Verdict::Allow), Verdict::Deny);
    assert_eq!(Verdict::Warn.merge(Verdict::Ask), Verdict::Ask);
    assert_eq!(Verdict::Ask.merge(Verdict::Warn), Verdict::Ask);
    assert_eq!(Verdict::Allow.merge(Verdict::Warn), Verdict::Warn);
    assert_eq!(Verdict::Allow.merge(Verdict::Allow), Verdict::Allow);
}

fn verdict_strategy() -> impl Strategy<Value = Verdict> {
    prop_oneof![
        Just(Verdict::Allow),
        Just(Verdict::Warn),
        Just(Verdict::Ask),
        Just(Verdict::Deny),
    ]
}

proptest! {
    // Merge is associative and order-insensitive (it is a max under the
    // precedence order).
    #[test]
    fn verdict_merge_associative(
        a in verdict_strategy(),
        b in verdict_strategy(),
        c in verdict_strategy(),
    ) {
        prop_assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
        prop_assert_eq!(a.merge(b), b.merge(a));
    }

    #[test]
    fn verdict_merge_never_downgrades(a in verdict_strategy(), b in verdict_strategy()) {
        let merged = a.merge(b);
        prop_assert!(merged == a || merged == b);
        prop_assert_eq!(merged.merge(a), merged);
        prop_assert_eq!(merged.merge(b), merged);
    }
}

#[test]
fn result_merge_joins_messages_with_newline() {
    let mut a = GateResult::allow().with_message("first");
    a.merge(GateResult::warn().with_message("second"));
    assert_eq!(a.verdict, Verdict::Warn);
    assert_eq!(a.system_message.as_deref(), Some("first\nsecond"));
}

#[test]
fn result_merge_joins_context_with_blank_line() {
    let mut a = GateResult::allow().with_context("block one");
    a.merge(GateResult::allow().with_context("block two"));
    assert_eq!(a.context_injection.as_deref(), Some("block one\n\nblock two"));
}

#[test]
fn result_merge_last_updated_input_wins() {
    let mut first = serde_json::Map::new();
    first.insert("command".to_string(), serde_json::Value::String("one".into()));
    let mut second = serde_json::Map::new();
    second.insert("command".to_string(), serde_json::Value::String("two".into()));

    let mut a = GateResult::allow();
    a.updated_input = Some(first);
    let mut b = GateResult::allow();
    b.updated_input = Some(second.clone());
    a.merge(b);
    assert_eq!(a.updated_input, Some(second));
}

#[test]
fn result_merge_keeps_existing_updated_input_when_absent() {
    let mut input = serde_json::Map::new();
    input.insert("k".to_string(), serde_json::Value::Bool(true));
    let mut a = GateResult::allow();
    a.updated_input = Some(input.clone());
    a.merge(GateResult::deny());
    assert_eq!(a.updated_input, Some(input));
}

fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn template_renders_placeholders() {
    let rendered = render_template(
        "custodiet",
        "{remaining} ops left for {gate_name}",
        &vars(&[("remaining", "2"), ("gate_name", "custodiet")]),
    );
    assert_eq!(rendered.as_deref(), Ok("2 ops left for custodiet"));
}

#[test]
fn template_missing_variable_is_an_error() {
    let err = render_template("hydration", "read {temp_path}", &vars(&[("other", "x")]));
    match err {
        Err(GateError::Template { gate, variable, available }) => {
            assert_eq!(gate, "hydration");
            assert_eq!(variable, "temp_path");
            assert_eq!(available, vec!["other".to_string()]);
        }
        other => panic!("expected template error, got {other:?}"),
    }
}

#[test]
fn template_leaves_literal_braces_alone() {
    // JSON braces and spaced braces are not placeholders.
    let rendered = render_template("g", "a { not a var } {\"k\": 1} {x}", &vars(&[("x", "y")]));
    assert_eq!(rendered.as_deref(), Ok("a { not a var } {\"k\": 1} y"));
}

#[test]
fn template_error_display_names_gate_and_variable() {
    let err = render_template("qa", "{missing}", &vars(&[]));
    let Err(e) = err else {
        panic!("expected error");
    };
    let text = e.to_string();
    assert!(text.contains("qa"));
    assert!(text.contains("missing"));
}
