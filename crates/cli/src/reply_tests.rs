// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use crate::config::ClientKind;
use crate::event::HookEvent;
use crate::gate::Verdict;

use super::{
    encode, encode_claude_general, encode_claude_stop, encode_gemini, CanonicalReply,
    ClaudeGeneralReply, ClaudeStopReply, GeminiReply,
};

fn reply(verdict: Verdict) -> CanonicalReply {
    CanonicalReply { verdict, ..CanonicalReply::default() }
}

#[test]
fn gemini_deny_carries_reason_from_context() {
    let mut canonical = reply(Verdict::Deny);
    canonical.context_injection = Some("read the payload first".to_string());
    let out = encode_gemini(&HookEvent::PreToolUse, &canonical);
    assert_eq!(out.decision, "deny");
    assert_eq!(out.reason.as_deref(), Some("read the payload first"));
    assert_eq!(out.system_message.as_deref(), Some("Blocked: read the payload first"));
}

#[test]
fn gemini_deny_falls_back_to_system_message_reason() {
    let mut canonical = reply(Verdict::Deny);
    canonical.system_message = Some("no task bound".to_string());
    let out = encode_gemini(&HookEvent::PreToolUse, &canonical);
    assert_eq!(out.decision, "deny");
    assert_eq!(out.reason.as_deref(), Some("no task bound"));
}

#[test]
fn gemini_allow_places_context_in_hook_specific_output() {
    let mut canonical = reply(Verdict::Allow);
    canonical.context_injection = Some("hydrate from /tmp/h.md".to_string());
    let out = encode_gemini(&HookEvent::UserPromptSubmit, &canonical);
    assert_eq!(out.decision, "allow");
    let hso = out.hook_specific_output.expect("hookSpecificOutput");
    assert_eq!(hso.hook_event_name, "UserPromptSubmit");
    assert_eq!(hso.additional_context.as_deref(), Some("hydrate from /tmp/h.md"));
}

#[test]
fn gemini_ask_downgrades_to_allow_with_visible_prompt() {
    let mut canonical = reply(Verdict::Ask);
    canonical.system_message = Some("confirm the deletion".to_string());
    let out = encode_gemini(&HookEvent::PreToolUse, &canonical);
    assert_eq!(out.decision, "allow");
    let hso = out.hook_specific_output.expect("prompt surfaced as context");
    assert_eq!(hso.additional_context.as_deref(), Some("confirm the deletion"));
}

#[test]
fn warn_encodes_as_allow_with_visible_message_everywhere() {
    let mut canonical = reply(Verdict::Warn);
    canonical.system_message = Some("compliance due soon".to_string());

    let gemini = encode_gemini(&HookEvent::PreToolUse, &canonical);
    assert_eq!(gemini.decision, "allow");
    assert_eq!(gemini.system_message.as_deref(), Some("compliance due soon"));

    let claude = encode_claude_general(&HookEvent::PreToolUse, &canonical);
    let hso = claude.hook_specific_output.expect("hso");
    assert_eq!(hso.permission_decision.as_deref(), Some("allow"));
    assert_eq!(claude.system_message.as_deref(), Some("compliance due soon"));
}

#[test]
fn claude_stop_shape_blocks_with_reason() {
    let mut canonical = reply(Verdict::Deny);
    canonical.context_injection = Some("invoke handover first".to_string());
    canonical.system_message = Some("stop blocked".to_string());
    let out = encode_claude_stop(&canonical);
    assert_eq!(out.decision, "block");
    assert_eq!(out.reason.as_deref(), Some("invoke handover first"));
    assert_eq!(out.stop_reason.as_deref(), Some("stop blocked"));
    assert_eq!(out.system_message.as_deref(), Some("stop blocked"));
}

#[test]
fn claude_stop_shape_approves_by_default() {
    let out = encode_claude_stop(&reply(Verdict::Allow));
    assert_eq!(out.decision, "approve");
    assert!(out.reason.is_none());
}

#[test]
fn claude_general_shape_encodes_ask_natively() {
    let mut canonical = reply(Verdict::Ask);
    canonical.context_injection = Some("confirm?".to_string());
    let out = encode_claude_general(&HookEvent::PreToolUse, &canonical);
    let hso = out.hook_specific_output.expect("hso");
    assert_eq!(hso.permission_decision.as_deref(), Some("ask"));
    assert_eq!(hso.additional_context.as_deref(), Some("confirm?"));
}

#[test]
fn encode_selects_stop_shape_for_stop_class_events() {
    let canonical = reply(Verdict::Deny);
    for event in [HookEvent::Stop, HookEvent::SessionEnd] {
        let value = encode(ClientKind::Claude, &event, &canonical);
        assert_eq!(value.get("decision").and_then(|v| v.as_str()), Some("block"));
        assert!(value.get("hookSpecificOutput").is_none());
    }
    let value = encode(ClientKind::Claude, &HookEvent::PreToolUse, &canonical);
    assert!(value.get("hookSpecificOutput").is_some());
}

// Round-trip law: encode(decode(x)) == x for canonical reply objects.
#[test]
fn gemini_reply_round_trips() -> anyhow::Result<()> {
    let original = json!({
        "decision": "deny",
        "reason": "blocked",
        "systemMessage": "Blocked: blocked",
        "metadata": {"source": "hydration"}
    });
    let decoded: GeminiReply = serde_json::from_value(original.clone())?;
    assert_eq!(serde_json::to_value(&decoded)?, original);
    Ok(())
}

#[test]
fn claude_stop_reply_round_trips() -> anyhow::Result<()> {
    let original = json!({
        "decision": "block",
        "reason": "handover required",
        "stopReason": "stop blocked",
        "systemMessage": "stop blocked"
    });
    let decoded: ClaudeStopReply = serde_json::from_value(original.clone())?;
    assert_eq!(serde_json::to_value(&decoded)?, original);
    Ok(())
}

#[test]
fn claude_general_reply_round_trips() -> anyhow::Result<()> {
    let original = json!({
        "systemMessage": "ok",
        "hookSpecificOutput": {
            "hookEventName": "PreToolUse",
            "permissionDecision": "allow",
            "additionalContext": "context block",
            "updatedInput": {"command": "ls"}
        }
    });
    let decoded: ClaudeGeneralReply = serde_json::from_value(original.clone())?;
    assert_eq!(serde_json::to_value(&decoded)?, original);
    Ok(())
}

#[test]
fn push_helpers_join_fragments() {
    let mut canonical = CanonicalReply::default();
    canonical.push_message("one");
    canonical.push_message("two");
    canonical.push_context("a");
    canonical.push_context("b");
    assert_eq!(canonical.system_message.as_deref(), Some("one\ntwo"));
    assert_eq!(canonical.context_injection.as_deref(), Some("a\n\nb"));
}
