// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative gate model.
//!
//! A gate is a named policy + state machine gating agent actions. Each gate
//! is a row of data, a [`GateConfig`], evaluated by the generic engine in
//! [`engine`]; new policies are new rows, not new code paths. Behavior that
//! the declarative model cannot express hangs off named custom checks and
//! actions in [`custom`].

pub mod builtin;
pub mod custom;
pub mod engine;
pub mod registry;
pub mod tools;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::GateStatus;

/// Verdict of a gate (and of the merged reply).
///
/// Precedence when merging: `deny > ask > warn > allow`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[default]
    Allow,
    Warn,
    Ask,
    Deny,
}

impl Verdict {
    fn rank(self) -> u8 {
        match self {
            Self::Allow => 0,
            Self::Warn => 1,
            Self::Ask => 2,
            Self::Deny => 3,
        }
    }

    /// Merge two verdicts under the precedence order.
    pub fn merge(self, other: Self) -> Self {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Warn => "warn",
            Self::Ask => "ask",
            Self::Deny => "deny",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one gate's evaluation for one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateResult {
    pub verdict: Verdict,
    /// User-visible note appended to the reply's system message.
    pub system_message: Option<String>,
    /// Instruction re-inserted into the agent's prompt stream.
    pub context_injection: Option<String>,
    /// Mutated tool input; the last producing gate wins on merge.
    pub updated_input: Option<Map<String, Value>>,
    pub metadata: Map<String, Value>,
}

impl GateResult {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn warn() -> Self {
        Self { verdict: Verdict::Warn, ..Self::default() }
    }

    pub fn deny() -> Self {
        Self { verdict: Verdict::Deny, ..Self::default() }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_injection = Some(context.into());
        self
    }

    /// True when this result carries nothing worth reporting.
    pub fn is_empty(&self) -> bool {
        self.verdict == Verdict::Allow
            && self.system_message.is_none()
            && self.context_injection.is_none()
            && self.updated_input.is_none()
            && self.metadata.is_empty()
    }

    /// Fold `other` into `self`: verdict by precedence, messages joined by
    /// newline, context injections by blank line, last `updated_input`
    /// wins.
    pub fn merge(&mut self, other: GateResult) {
        self.verdict = self.verdict.merge(other.verdict);
        self.system_message = join_opt(self.system_message.take(), other.system_message, "\n");
        self.context_injection =
            join_opt(self.context_injection.take(), other.context_injection, "\n\n");
        if other.updated_input.is_some() {
            self.updated_input = other.updated_input;
        }
        self.metadata.extend(other.metadata);
    }
}

fn join_opt(a: Option<String>, b: Option<String>, sep: &str) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(format!("{a}{sep}{b}")),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

// ---------------------------------------------------------------------------
// Configuration model
// ---------------------------------------------------------------------------

/// Tool categories used by condition exclusions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// Read-only tools (file reads, searches, web fetches).
    Read,
    /// File-editing tools.
    Edit,
    /// Shell execution.
    Shell,
    /// Sub-agent / skill spawning tools.
    Spawn,
    Other,
}

/// Conjunction of clauses; all present clauses must hold.
///
/// Evaluation is total: a clause over a field the context does not carry is
/// false, never an error.
#[derive(Debug, Clone, Default)]
pub struct GateCondition {
    pub current_status: Option<GateStatus>,
    /// Event name: regex when the pattern carries a metacharacter, plain
    /// equality otherwise.
    pub hook_event: Option<&'static str>,
    pub tool_name_pattern: Option<&'static str>,
    pub excluded_tool_categories: &'static [ToolCategory],
    /// Searched against the JSON-stringified tool input.
    pub tool_input_pattern: Option<&'static str>,
    /// Requires a non-empty subagent type on the context.
    pub subagent_type_pattern: Option<&'static str>,
    pub min_ops_since_open: Option<u64>,
    pub min_ops_since_close: Option<u64>,
    pub min_turns_since_open: Option<u64>,
    /// Named check in [`custom`].
    pub custom_check: Option<&'static str>,
}

/// State mutation applied when a trigger's condition matches.
#[derive(Debug, Clone, Default)]
pub struct GateTransition {
    pub target_status: Option<GateStatus>,
    pub reset_ops_counter: bool,
    pub set_metrics: &'static [(&'static str, &'static str)],
    pub increment_metrics: &'static [&'static str],
    /// Named action in [`custom`]; runs before template rendering so it can
    /// set metrics the templates need.
    pub custom_action: Option<&'static str>,
    pub system_message_template: Option<&'static str>,
    pub context_template: Option<&'static str>,
}

/// A trigger: condition → transition. The first matching trigger fires.
#[derive(Debug, Clone)]
pub struct GateTrigger {
    pub condition: GateCondition,
    pub transition: GateTransition,
}

/// A policy: condition → verdict. The first matching policy fires.
#[derive(Debug, Clone)]
pub struct GatePolicy {
    pub condition: GateCondition,
    pub verdict: Verdict,
    pub custom_action: Option<&'static str>,
    pub message_template: &'static str,
    pub context_template: Option<&'static str>,
}

/// Advance warning before a counter-threshold policy fires.
#[derive(Debug, Clone)]
pub struct Countdown {
    /// `ops_since_open`, `ops_since_close`, or a metric key.
    pub metric: &'static str,
    pub threshold: u64,
    /// Warnings start `start_before` ops before the threshold.
    pub start_before: u64,
    pub message_template: &'static str,
}

/// One gate, fully described by data.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub name: &'static str,
    pub initial_status: GateStatus,
    pub countdown: Option<Countdown>,
    pub triggers: Vec<GateTrigger>,
    pub policies: Vec<GatePolicy>,
}

// ---------------------------------------------------------------------------
// Template rendering
// ---------------------------------------------------------------------------

/// Gate evaluation error. Template errors are programmer errors (a
/// malformed gate config); the router surfaces them as a deny with a
/// diagnostic rather than emitting a broken instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    Template { gate: String, variable: String, available: Vec<String> },
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template { gate, variable, available } => write!(
                f,
                "gate '{gate}' template has unresolved variable '{variable}' \
                 (available: {})",
                available.join(", ")
            ),
        }
    }
}

impl std::error::Error for GateError {}

/// Render `{name}` placeholders from `vars`. A placeholder with no binding
/// is an error: the engine must refuse to emit a broken instruction.
pub fn render_template(
    gate: &str,
    template: &str,
    vars: &BTreeMap<String, String>,
) -> Result<String, GateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if is_placeholder(&after[..end]) => {
                let name = &after[..end];
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(GateError::Template {
                            gate: gate.to_string(),
                            variable: name.to_string(),
                            available: vars.keys().cloned().collect(),
                        })
                    }
                }
                rest = &after[end + 1..];
            }
            _ => {
                // Literal brace, not a placeholder.
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn is_placeholder(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
