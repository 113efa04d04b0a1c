// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use crate::event::HookEvent;
use crate::paths::Paths;
use crate::state::{GateStatus, SessionState};
use crate::test_support::{hook_ctx, tool_ctx};

use super::super::custom::GateEnv;
use super::super::{
    Countdown, GateCondition, GateConfig, GateError, GatePolicy, GateTransition, GateTrigger,
    Verdict,
};
use super::{pattern_matches, Gate};

fn counter_config(threshold: u64, start_before: u64) -> GateConfig {
    GateConfig {
        name: "counter",
        initial_status: GateStatus::Open,
        countdown: Some(Countdown {
            metric: "ops_since_open",
            threshold,
            start_before,
            message_template: "{remaining} ops before {gate_name} closes",
        }),
        triggers: Vec::new(),
        policies: vec![GatePolicy {
            condition: GateCondition {
                hook_event: Some("PreToolUse"),
                min_ops_since_open: Some(threshold),
                ..GateCondition::default()
            },
            verdict: Verdict::Deny,
            custom_action: None,
            message_template: "overdue at {ops_since_open}",
            context_template: None,
        }],
    }
}

fn bare_config(name: &'static str) -> GateConfig {
    GateConfig {
        name,
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: Vec::new(),
        policies: Vec::new(),
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    paths: Paths,
    session: SessionState,
}

impl Fixture {
    fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let paths = Paths::at(dir.path());
        let session = SessionState::new("test-session");
        Ok(Self { _dir: dir, paths, session })
    }
}

#[test]
fn ops_counter_counts_post_tool_use_while_open() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let config = bare_config("g");
    let gate = Gate::new(&config);
    let ctx = tool_ctx(HookEvent::PostToolUse, "Edit", json!({"file_path": "/x"}));

    for _ in 0..3 {
        gate.on_tool_use(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?;
    }
    let state = &fx.session.gates["g"];
    assert_eq!(state.ops_since_open, 3);
    assert_eq!(state.ops_since_close, 0);
    Ok(())
}

#[test]
fn ops_counter_resets_on_open_transition() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let config = bare_config("g");
    let gate = Gate::new(&config);
    let ctx = tool_ctx(HookEvent::PostToolUse, "Edit", json!({}));

    gate.on_tool_use(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?;
    fx.session.close_gate("g");
    assert_eq!(fx.session.gates["g"].ops_since_close, 0);

    // Ops while closed land on the close counter.
    gate.on_tool_use(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?;
    gate.on_tool_use(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?;
    assert_eq!(fx.session.gates["g"].ops_since_close, 2);
    assert_eq!(fx.session.gates["g"].ops_since_open, 1);

    // Reopening resets the open counter.
    fx.session.open_gate("g");
    assert_eq!(fx.session.gates["g"].ops_since_open, 0);
    Ok(())
}

#[yare::parameterized(
    zero = { 0, None },
    below_window = { 6, None },
    window_start = { 7, Some(3) },
    window_mid = { 8, Some(2) },
    window_end = { 9, Some(1) },
)]
fn countdown_window(ops: u64, remaining: Option<u64>) {
    let mut fx = Fixture::new().unwrap();
    let config = counter_config(10, 3);
    let gate = Gate::new(&config);
    fx.session.ensure_gate("counter", GateStatus::Open).ops_since_open = ops;

    let ctx = tool_ctx(HookEvent::PreToolUse, "Edit", json!({}));
    let result = gate.check(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session).unwrap();
    match remaining {
        Some(n) => {
            let result = result.expect("countdown fires inside the window");
            assert_eq!(result.verdict, Verdict::Allow);
            let message = result.system_message.unwrap_or_default();
            assert!(message.contains(&format!("{n} ops before counter closes")), "{message}");
        }
        None => assert!(result.is_none(), "no countdown expected at {ops}"),
    }
}

#[test]
fn policy_fires_at_threshold_and_suppresses_countdown() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let config = counter_config(10, 3);
    let gate = Gate::new(&config);
    fx.session.ensure_gate("counter", GateStatus::Open).ops_since_open = 10;

    let ctx = tool_ctx(HookEvent::PreToolUse, "Edit", json!({}));
    let result = gate.check(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?.expect("policy fires");
    assert_eq!(result.verdict, Verdict::Deny);
    let message = result.system_message.unwrap_or_default();
    assert!(message.contains("overdue at 10"), "{message}");
    assert!(!message.contains("ops before"), "countdown must not fire with the policy");
    Ok(())
}

#[test]
fn first_matching_trigger_wins() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let config = GateConfig {
        name: "g",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: vec![
            GateTrigger {
                condition: GateCondition {
                    hook_event: Some("PostToolUse"),
                    ..GateCondition::default()
                },
                transition: GateTransition {
                    target_status: Some(GateStatus::Closed),
                    system_message_template: Some("first"),
                    ..GateTransition::default()
                },
            },
            GateTrigger {
                condition: GateCondition {
                    hook_event: Some("PostToolUse"),
                    ..GateCondition::default()
                },
                transition: GateTransition {
                    system_message_template: Some("second"),
                    ..GateTransition::default()
                },
            },
        ],
        policies: Vec::new(),
    };
    let gate = Gate::new(&config);
    let ctx = tool_ctx(HookEvent::PostToolUse, "Edit", json!({}));
    let result = gate.on_tool_use(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?.expect("trigger fires");
    assert_eq!(result.system_message.as_deref(), Some("first"));
    assert_eq!(fx.session.gates["g"].status, GateStatus::Closed);
    Ok(())
}

#[test]
fn transition_sets_and_increments_metrics() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let config = GateConfig {
        name: "g",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: vec![GateTrigger {
            condition: GateCondition { hook_event: Some("PostToolUse"), ..GateCondition::default() },
            transition: GateTransition {
                set_metrics: &[("label", "x")],
                increment_metrics: &["hits"],
                ..GateTransition::default()
            },
        }],
        policies: Vec::new(),
    };
    let gate = Gate::new(&config);
    let ctx = tool_ctx(HookEvent::PostToolUse, "Edit", json!({}));
    gate.on_tool_use(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?;
    gate.on_tool_use(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?;

    let state = &fx.session.gates["g"];
    assert_eq!(state.metrics["label"], serde_json::Value::String("x".into()));
    assert_eq!(state.metrics["hits"], serde_json::Value::from(2));
    Ok(())
}

#[test]
fn missing_template_variable_is_fatal() {
    let mut fx = Fixture::new().unwrap();
    let config = GateConfig {
        name: "broken",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: Vec::new(),
        policies: vec![GatePolicy {
            condition: GateCondition { hook_event: Some("PreToolUse"), ..GateCondition::default() },
            verdict: Verdict::Deny,
            custom_action: None,
            message_template: "needs {nonexistent_metric}",
            context_template: None,
        }],
    };
    let gate = Gate::new(&config);
    let ctx = tool_ctx(HookEvent::PreToolUse, "Edit", json!({}));
    match gate.check(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session) {
        Err(GateError::Template { gate, variable, .. }) => {
            assert_eq!(gate, "broken");
            assert_eq!(variable, "nonexistent_metric");
        }
        other => panic!("expected template error, got {other:?}"),
    }
}

#[test]
fn tool_name_clause_is_false_without_a_tool() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let config = GateConfig {
        name: "g",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: Vec::new(),
        policies: vec![GatePolicy {
            condition: GateCondition {
                hook_event: Some("PreToolUse"),
                tool_name_pattern: Some("Edit|Write"),
                ..GateCondition::default()
            },
            verdict: Verdict::Deny,
            custom_action: None,
            message_template: "blocked",
            context_template: None,
        }],
    };
    let gate = Gate::new(&config);
    // No tool on the context: the clause is false, not an error.
    let ctx = hook_ctx(HookEvent::PreToolUse);
    assert!(gate.check(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?.is_none());

    let ctx = tool_ctx(HookEvent::PreToolUse, "Write", json!({}));
    assert!(gate.check(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?.is_some());
    Ok(())
}

#[test]
fn subagent_type_clause_requires_nonempty_type() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let config = GateConfig {
        name: "g",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: vec![GateTrigger {
            condition: GateCondition {
                hook_event: Some("SubagentStop"),
                subagent_type_pattern: Some("hydrator"),
                ..GateCondition::default()
            },
            transition: GateTransition {
                target_status: Some(GateStatus::Closed),
                ..GateTransition::default()
            },
        }],
        policies: Vec::new(),
    };
    let gate = Gate::new(&config);

    let ctx = hook_ctx(HookEvent::SubagentStop);
    gate.triggers_only(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?;
    assert_eq!(fx.session.gates["g"].status, GateStatus::Open);

    let mut ctx = hook_ctx(HookEvent::SubagentStop);
    ctx.subagent_type = Some("prompt-hydrator".to_string());
    gate.triggers_only(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?;
    assert_eq!(fx.session.gates["g"].status, GateStatus::Closed);
    Ok(())
}

#[test]
fn stop_policy_deny_skips_triggers() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let config = GateConfig {
        name: "g",
        initial_status: GateStatus::Open,
        countdown: None,
        triggers: vec![GateTrigger {
            condition: GateCondition { hook_event: Some("^(Stop)$"), ..GateCondition::default() },
            transition: GateTransition {
                target_status: Some(GateStatus::Closed),
                ..GateTransition::default()
            },
        }],
        policies: vec![GatePolicy {
            condition: GateCondition { hook_event: Some("^(Stop)$"), ..GateCondition::default() },
            verdict: Verdict::Deny,
            custom_action: None,
            message_template: "not yet",
            context_template: None,
        }],
    };
    let gate = Gate::new(&config);
    let ctx = hook_ctx(HookEvent::Stop);
    let result = gate.on_stop(&GateEnv { paths: &fx.paths }, &ctx, &mut fx.session)?.expect("deny");
    assert_eq!(result.verdict, Verdict::Deny);
    // The cleanup trigger must not have fired.
    assert_eq!(fx.session.gates["g"].status, GateStatus::Open);
    Ok(())
}

#[yare::parameterized(
    plain_equal = { "PreToolUse", "PreToolUse", true },
    plain_not_equal = { "Stop", "SubagentStop", false },
    regex_alternation = { "^(Stop|SessionEnd)$", "SessionEnd", true },
    regex_anchored_miss = { "^(Stop|SessionEnd)$", "SubagentStop", false },
    regex_substring = { "hydr.tor", "prompt-hydrator", true },
)]
fn event_pattern_matching(pattern: &str, value: &str, expected: bool) {
    assert_eq!(pattern_matches(pattern, value), expected);
}
