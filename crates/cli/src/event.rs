// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical hook events and the normalized per-invocation context.
//!
//! Runtime-specific payload variance is resolved by [`crate::normalize`];
//! everything downstream of the normalizer sees only these types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle points at which the agent runtime invokes the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookEvent {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    AfterAgent,
    SubagentStart,
    SubagentStop,
    Stop,
    SessionEnd,
    Notification,
    /// Runtime event name warden does not recognize. Passes through:
    /// universal side handlers run, gates do not.
    Unknown(String),
}

impl HookEvent {
    /// Parse a canonical event name. Unrecognized names become
    /// [`HookEvent::Unknown`] rather than an error.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "SessionStart" => Self::SessionStart,
            "UserPromptSubmit" => Self::UserPromptSubmit,
            "PreToolUse" => Self::PreToolUse,
            "PostToolUse" => Self::PostToolUse,
            "AfterAgent" => Self::AfterAgent,
            "SubagentStart" => Self::SubagentStart,
            "SubagentStop" => Self::SubagentStop,
            "Stop" => Self::Stop,
            "SessionEnd" => Self::SessionEnd,
            "Notification" => Self::Notification,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire-format name for this event.
    pub fn as_str(&self) -> &str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::AfterAgent => "AfterAgent",
            Self::SubagentStart => "SubagentStart",
            Self::SubagentStop => "SubagentStop",
            Self::Stop => "Stop",
            Self::SessionEnd => "SessionEnd",
            Self::Notification => "Notification",
            Self::Unknown(name) => name,
        }
    }

    /// True for the stop-class events (stop gating and the crash-loop
    /// breaker apply to both).
    pub fn is_stop_class(&self) -> bool {
        matches!(self, Self::Stop | Self::SessionEnd)
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized event context handed to every gate and side handler.
#[derive(Debug, Clone, PartialEq)]
pub struct HookContext {
    pub session_id: String,
    /// Precomputed 8-char hash of `session_id` (file naming, display).
    pub session_short_hash: String,
    pub trace_id: String,
    pub hook_event: HookEvent,
    pub agent_id: Option<String>,
    pub slug: Option<String>,
    /// True when the event originated inside a spawned sub-agent.
    /// `SubagentStart`/`SubagentStop` fire in the parent's stream *about*
    /// a sub-agent and are never marked as sub-agent events.
    pub is_subagent: bool,
    pub subagent_type: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Map<String, Value>,
    /// Tool or sub-agent result. Kept as a raw value: runtimes send both
    /// objects and plain strings here.
    pub tool_output: Value,
    pub transcript_path: Option<String>,
    pub cwd: Option<String>,
    /// Remainder of the payload after all recognized fields are stripped.
    pub raw_input: Map<String, Value>,
}

impl HookContext {
    /// String field from the unrecognized remainder (e.g. `prompt`,
    /// `prompt_response`).
    pub fn raw_str(&self, key: &str) -> Option<&str> {
        self.raw_input.get(key).and_then(Value::as_str)
    }

    /// Flattened text of the tool/sub-agent output, for pattern scans.
    pub fn output_text(&self) -> String {
        match &self.tool_output {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("output")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}
