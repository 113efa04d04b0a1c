// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime-specific reply encoding.
//!
//! The router produces one [`CanonicalReply`]; this module turns it into
//! the JSON shape the invoking runtime expects. The gemini runtime takes a
//! single generic object; the claude runtime distinguishes stop-class
//! events from everything else.
//!
//! `warn` always encodes as an allow with a visible `systemMessage`.
//! `ask` is encoded where the runtime supports it (claude
//! `permissionDecision`) and otherwise downgraded to allow with the prompt
//! in `additionalContext`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ClientKind;
use crate::event::HookEvent;
use crate::gate::Verdict;

/// Merged result of one hook invocation, runtime-agnostic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalReply {
    pub verdict: Verdict,
    pub system_message: Option<String>,
    pub context_injection: Option<String>,
    pub updated_input: Option<Map<String, Value>>,
    pub metadata: Map<String, Value>,
}

impl CanonicalReply {
    /// Append a line to the user-visible system message.
    pub fn push_message(&mut self, line: &str) {
        match &mut self.system_message {
            Some(msg) => {
                msg.push('\n');
                msg.push_str(line);
            }
            None => self.system_message = Some(line.to_string()),
        }
    }

    /// Append a block to the context injection (blank-line separated).
    pub fn push_context(&mut self, block: &str) {
        match &mut self.context_injection {
            Some(ctx) => {
                ctx.push_str("\n\n");
                ctx.push_str(block);
            }
            None => self.context_injection = Some(block.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Gemini runtime: one generic shape
// ---------------------------------------------------------------------------

/// Reply object for the gemini runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiReply {
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "systemMessage")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "hookSpecificOutput")]
    pub hook_specific_output: Option<GeminiHookSpecificOutput>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiHookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "additionalContext")]
    pub additional_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "updatedInput")]
    pub updated_input: Option<Map<String, Value>>,
}

// ---------------------------------------------------------------------------
// Claude runtime: stop shape + general shape
// ---------------------------------------------------------------------------

/// Claude reply for `Stop`/`SessionEnd` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeStopReply {
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "stopReason")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "systemMessage")]
    pub system_message: Option<String>,
}

/// Claude reply for all non-stop events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaudeGeneralReply {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "systemMessage")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "hookSpecificOutput")]
    pub hook_specific_output: Option<ClaudeHookSpecificOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeHookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "permissionDecision")]
    pub permission_decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "additionalContext")]
    pub additional_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "updatedInput")]
    pub updated_input: Option<Map<String, Value>>,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode the canonical reply as the JSON object for the given runtime.
pub fn encode(client: ClientKind, event: &HookEvent, reply: &CanonicalReply) -> Value {
    match client {
        ClientKind::Gemini => {
            serde_json::to_value(encode_gemini(event, reply)).unwrap_or_else(|_| Value::Object(Map::new()))
        }
        ClientKind::Claude if event.is_stop_class() => {
            serde_json::to_value(encode_claude_stop(reply)).unwrap_or_else(|_| Value::Object(Map::new()))
        }
        ClientKind::Claude => {
            serde_json::to_value(encode_claude_general(event, reply))
                .unwrap_or_else(|_| Value::Object(Map::new()))
        }
    }
}

/// Gemini shape. `ask` has no native encoding here: it downgrades to allow
/// with the prompt carried in `additionalContext`.
pub fn encode_gemini(event: &HookEvent, reply: &CanonicalReply) -> GeminiReply {
    let mut out = GeminiReply {
        decision: "allow".to_string(),
        reason: None,
        system_message: reply.system_message.clone(),
        hook_specific_output: None,
        metadata: reply.metadata.clone(),
    };

    if reply.verdict == Verdict::Deny {
        out.decision = "deny".to_string();
        if let Some(ctx) = &reply.context_injection {
            out.reason = Some(ctx.clone());
            if out.system_message.is_none() {
                out.system_message = Some(format!("Blocked: {ctx}"));
            }
        } else if let Some(msg) = &out.system_message {
            out.reason = Some(msg.clone());
        }
        return out;
    }

    let context = match (&reply.context_injection, reply.verdict) {
        (Some(ctx), _) => Some(ctx.clone()),
        (None, Verdict::Ask) => reply.system_message.clone(),
        _ => None,
    };
    if context.is_some() || reply.updated_input.is_some() {
        out.hook_specific_output = Some(GeminiHookSpecificOutput {
            hook_event_name: event.as_str().to_string(),
            additional_context: context,
            updated_input: reply.updated_input.clone(),
        });
    }
    out
}

/// Claude stop shape: `approve`/`block` with the instruction in `reason`.
pub fn encode_claude_stop(reply: &CanonicalReply) -> ClaudeStopReply {
    ClaudeStopReply {
        decision: if reply.verdict == Verdict::Deny { "block" } else { "approve" }.to_string(),
        reason: reply.context_injection.clone(),
        stop_reason: reply.system_message.clone(),
        system_message: reply.system_message.clone(),
    }
}

/// Claude general shape with a native `permissionDecision`.
pub fn encode_claude_general(event: &HookEvent, reply: &CanonicalReply) -> ClaudeGeneralReply {
    let permission = match reply.verdict {
        Verdict::Deny => "deny",
        Verdict::Ask => "ask",
        Verdict::Warn | Verdict::Allow => "allow",
    };
    ClaudeGeneralReply {
        system_message: reply.system_message.clone(),
        hook_specific_output: Some(ClaudeHookSpecificOutput {
            hook_event_name: event.as_str().to_string(),
            permission_decision: Some(permission.to_string()),
            additional_context: reply.context_injection.clone(),
            updated_input: reply.updated_input.clone(),
        }),
    }
}

#[cfg(test)]
#[path = "reply_tests.rs"]
mod tests;
