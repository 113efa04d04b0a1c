// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::{json, Map, Value};

use crate::config::ClientKind;
use crate::event::HookEvent;
use crate::paths::Paths;

use super::{denormalize, parse_json_field, Normalizer};

struct Fixture {
    _dir: tempfile::TempDir,
    paths: Paths,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        Self { paths: Paths::at(dir.path()), _dir: dir }
    }

    fn normalizer(&self, client: ClientKind) -> Normalizer<'_> {
        Normalizer::new(&self.paths, client, None)
    }
}

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[test]
fn canonical_event_names_pass_through() {
    let fx = Fixture::new();
    let ctx = fx.normalizer(ClientKind::Claude).normalize(
        payload(json!({"hook_event_name": "PreToolUse", "session_id": "s1"})),
        None,
    );
    assert_eq!(ctx.hook_event, HookEvent::PreToolUse);
    assert_eq!(ctx.session_id, "s1");
}

#[yare::parameterized(
    before_tool = { "BeforeTool", HookEvent::PreToolUse },
    after_tool = { "AfterTool", HookEvent::PostToolUse },
    before_agent = { "BeforeAgent", HookEvent::UserPromptSubmit },
    after_agent = { "AfterAgent", HookEvent::AfterAgent },
    session_end = { "SessionEnd", HookEvent::SessionEnd },
)]
fn gemini_event_names_map_to_canonical(wire: &str, expected: HookEvent) {
    let fx = Fixture::new();
    let ctx = fx
        .normalizer(ClientKind::Gemini)
        .normalize(payload(json!({"session_id": "s1"})), Some(wire));
    assert_eq!(ctx.hook_event, expected);
}

#[test]
fn event_argument_overrides_payload_name() {
    let fx = Fixture::new();
    let ctx = fx.normalizer(ClientKind::Gemini).normalize(
        payload(json!({"hook_event_name": "Stop", "session_id": "s1"})),
        Some("BeforeTool"),
    );
    assert_eq!(ctx.hook_event, HookEvent::PreToolUse);
}

#[test]
fn unknown_event_name_is_preserved() {
    let fx = Fixture::new();
    let ctx = fx
        .normalizer(ClientKind::Claude)
        .normalize(payload(json!({"hook_event_name": "PreCompact", "session_id": "s1"})), None);
    assert_eq!(ctx.hook_event, HookEvent::Unknown("PreCompact".to_string()));
}

// R3: JSON-string tool_input becomes a mapping and leaves raw_input.
#[test]
fn json_string_tool_input_is_parsed() {
    let fx = Fixture::new();
    let ctx = fx.normalizer(ClientKind::Claude).normalize(
        payload(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "tool_name": "Bash",
            "tool_input": "{\"command\": \"ls\"}"
        })),
        None,
    );
    assert_eq!(ctx.tool_input.get("command").and_then(Value::as_str), Some("ls"));
    assert!(!ctx.raw_input.contains_key("tool_input"));
}

#[test]
fn unparsable_string_fields_pass_through() {
    assert_eq!(parse_json_field(Value::String("not json".into())), Value::String("not json".into()));
    assert_eq!(parse_json_field(json!("[1, 2]")), json!([1, 2]));
    assert_eq!(parse_json_field(json!({"a": 1})), json!({"a": 1}));
    // A JSON scalar in a string is left as the string.
    assert_eq!(parse_json_field(Value::String("42".into())), Value::String("42".into()));
}

#[test]
fn tool_output_spellings_are_unified() {
    let fx = Fixture::new();
    for key in ["tool_result", "toolResult", "tool_response", "subagent_result"] {
        let mut raw = payload(json!({"hook_event_name": "PostToolUse", "session_id": "s1"}));
        raw.insert(key.to_string(), json!({"output": "done"}));
        let ctx = fx.normalizer(ClientKind::Claude).normalize(raw, None);
        assert_eq!(ctx.tool_output.get("output").and_then(Value::as_str), Some("done"), "{key}");
        assert!(!ctx.raw_input.contains_key(key));
    }
}

#[test]
fn sidechain_flag_marks_subagent_events() {
    let fx = Fixture::new();
    let ctx = fx.normalizer(ClientKind::Claude).normalize(
        payload(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "is_sidechain": true,
            "subagent_type": "custodiet"
        })),
        None,
    );
    assert!(ctx.is_subagent);
    assert_eq!(ctx.subagent_type.as_deref(), Some("custodiet"));
}

#[test]
fn subagent_metadata_implies_subagent_session() {
    let fx = Fixture::new();
    let ctx = fx.normalizer(ClientKind::Claude).normalize(
        payload(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "agent_type": "researcher"
        })),
        None,
    );
    assert!(ctx.is_subagent);
    assert_eq!(ctx.subagent_type.as_deref(), Some("researcher"));
}

// SubagentStart/SubagentStop fire in the parent's stream about the
// sub-agent; they are never sub-agent events themselves.
#[test]
fn subagent_lifecycle_events_are_not_subagent_sessions() {
    let fx = Fixture::new();
    for event in ["SubagentStart", "SubagentStop"] {
        let ctx = fx.normalizer(ClientKind::Claude).normalize(
            payload(json!({
                "hook_event_name": event,
                "session_id": "s1",
                "is_sidechain": true,
                "subagent_type": "critic"
            })),
            None,
        );
        assert!(!ctx.is_subagent, "{event}");
        assert_eq!(ctx.subagent_type.as_deref(), Some("critic"));
    }
}

#[test]
fn skill_spawns_are_not_subagent_sessions() {
    let fx = Fixture::new();
    let ctx = fx.normalizer(ClientKind::Claude).normalize(
        payload(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "tool_name": "Skill",
            "tool_input": {"skill": "custodiet"}
        })),
        None,
    );
    assert!(!ctx.is_subagent);
    // The target is still extracted for gate conditions.
    assert_eq!(ctx.subagent_type.as_deref(), Some("custodiet"));
}

#[test]
fn task_spawn_metadata_implies_subagent() {
    let fx = Fixture::new();
    let ctx = fx.normalizer(ClientKind::Claude).normalize(
        payload(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "tool_name": "Task",
            "tool_input": {"subagent_type": "researcher"}
        })),
        None,
    );
    assert!(ctx.is_subagent);
}

#[test]
fn env_override_is_authoritative() {
    let fx = Fixture::new();
    let normalizer =
        Normalizer::new(&fx.paths, ClientKind::Claude, Some("custodiet".to_string()));
    let ctx = normalizer.normalize(
        payload(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "subagent_type": "researcher"
        })),
        None,
    );
    assert_eq!(ctx.subagent_type.as_deref(), Some("custodiet"));
}

#[test]
fn session_start_without_id_synthesizes_one() {
    let fx = Fixture::new();
    let ctx = fx
        .normalizer(ClientKind::Gemini)
        .normalize(payload(json!({"hook_event_name": "SessionStart"})), None);
    assert!(ctx.session_id.starts_with("gemini-"), "{}", ctx.session_id);
    // {client}-{yyyymmdd-hhmmss}-{rand8}
    let parts: Vec<&str> = ctx.session_id.split('-').collect();
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[3].len(), 8);
}

#[test]
fn other_events_without_id_get_an_unknown_id() {
    let fx = Fixture::new();
    let ctx = fx
        .normalizer(ClientKind::Claude)
        .normalize(payload(json!({"hook_event_name": "PostToolUse"})), None);
    assert!(ctx.session_id.starts_with("unknown-"), "{}", ctx.session_id);
}

#[test]
fn session_start_persists_the_pid_map_for_later_events() {
    let fx = Fixture::new();
    let normalizer = fx.normalizer(ClientKind::Claude);
    let start = normalizer.normalize(
        payload(json!({"hook_event_name": "SessionStart", "session_id": "known-1"})),
        None,
    );
    assert_eq!(start.session_id, "known-1");

    // Later event in the same (parent) process arrives without an id.
    let later = normalizer.normalize(payload(json!({"hook_event_name": "PostToolUse"})), None);
    assert_eq!(later.session_id, "known-1");
}

#[test]
fn recognized_fields_are_stripped_from_raw_input() {
    let fx = Fixture::new();
    let ctx = fx.normalizer(ClientKind::Claude).normalize(
        payload(json!({
            "hook_event_name": "UserPromptSubmit",
            "session_id": "s1",
            "transcript_path": "/tmp/t.jsonl",
            "cwd": "/work",
            "slug": "my-task",
            "prompt": "do the thing"
        })),
        None,
    );
    assert_eq!(ctx.raw_input.len(), 1);
    assert_eq!(ctx.raw_str("prompt"), Some("do the thing"));
    assert_eq!(ctx.transcript_path.as_deref(), Some("/tmp/t.jsonl"));
    assert_eq!(ctx.cwd.as_deref(), Some("/work"));
    assert_eq!(ctx.slug.as_deref(), Some("my-task"));
}

// R2: normalize(denormalize(ctx)) == ctx for canonical contexts.
#[test]
fn normalization_round_trips() {
    let fx = Fixture::new();
    let normalizer = fx.normalizer(ClientKind::Claude);
    let ctx = normalizer.normalize(
        payload(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "trace_id": "trace-9",
            "tool_name": "Bash",
            "tool_input": {"command": "git status"},
            "tool_result": {"output": "clean"},
            "cwd": "/work",
            "extra_field": "survives"
        })),
        None,
    );
    let round_tripped = normalizer.normalize(denormalize(&ctx), None);
    assert_eq!(round_tripped, ctx);
}
