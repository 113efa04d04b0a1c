// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for unit and integration tests.

use serde_json::{Map, Value};

use crate::event::{HookContext, HookEvent};
use crate::paths;

/// Minimal context for the given event.
pub fn hook_ctx(event: HookEvent) -> HookContext {
    let session_id = "test-session".to_string();
    HookContext {
        session_short_hash: paths::short_hash(&session_id),
        session_id,
        trace_id: "trace-0".to_string(),
        hook_event: event,
        agent_id: None,
        slug: None,
        is_subagent: false,
        subagent_type: None,
        tool_name: None,
        tool_input: Map::new(),
        tool_output: Value::Null,
        transcript_path: None,
        cwd: None,
        raw_input: Map::new(),
    }
}

/// Context for a tool event.
pub fn tool_ctx(event: HookEvent, tool: &str, input: Value) -> HookContext {
    let mut ctx = hook_ctx(event);
    ctx.tool_name = Some(tool.to_string());
    if let Value::Object(map) = input {
        ctx.tool_input = map;
    }
    ctx
}

/// Context carrying an agent response text (AfterAgent events).
pub fn response_ctx(text: &str) -> HookContext {
    let mut ctx = hook_ctx(HookEvent::AfterAgent);
    ctx.raw_input.insert("prompt_response".to_string(), Value::String(text.to_string()));
    ctx
}

/// A framework reflection with every required field present.
pub fn valid_reflection() -> String {
    [
        "## Framework Reflection",
        "",
        "**Prompts**: refactor the store",
        "**Guidance received**: hydrator plan",
        "**Followed**: yes",
        "**Outcome**: success",
        "**Accomplishments**: store refactored",
        "**Friction points**: none",
        "**Proposed changes**: none",
        "**Next step**: none",
    ]
    .join("\n")
}
