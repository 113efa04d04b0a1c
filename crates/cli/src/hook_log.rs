// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session append-only hook event log.
//!
//! One JSONL record per hook invocation, written after the verdict is
//! final so the record carries the output. Append-only writes need no
//! lock; a logging failure never affects the reply.

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::gate::Verdict;
use crate::paths::{now_secs, Paths};

/// Input values longer than this are elided from the log.
const MAX_LOGGED_VALUE: usize = 2000;

/// One gate's contribution to the merged verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateContribution {
    pub gate: String,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

/// One log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookLogEntry {
    pub event: String,
    pub trace_id: String,
    pub logged_at: f64,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<GateContribution>,
    #[serde(default)]
    pub input: Map<String, Value>,
}

impl HookLogEntry {
    pub fn new(event: &str, trace_id: &str, verdict: Verdict) -> Self {
        Self {
            event: event.to_string(),
            trace_id: trace_id.to_string(),
            logged_at: now_secs(),
            verdict,
            system_message: None,
            gates: Vec::new(),
            input: Map::new(),
        }
    }
}

/// Append one record to the session's hook log.
pub fn append(paths: &Paths, session_id: &str, entry: &HookLogEntry) {
    let path = paths.hook_log_file(session_id);
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(mut line) = serde_json::to_string(entry) else {
        return;
    };
    line.push('\n');
    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&path) else {
        warn!("cannot open hook log {}", path.display());
        return;
    };
    let _ = file.write_all(line.as_bytes());
}

/// Copy of the raw input with large blobs elided.
pub fn trim_input(raw: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in raw {
        let trimmed = match value {
            Value::String(s) if s.len() > MAX_LOGGED_VALUE => {
                Value::String(format!("(elided: {} bytes)", s.len()))
            }
            other => {
                let rendered = other.to_string();
                if rendered.len() > MAX_LOGGED_VALUE {
                    Value::String(format!("(elided: {} bytes)", rendered.len()))
                } else {
                    other.clone()
                }
            }
        };
        out.insert(key.clone(), trimmed);
    }
    out
}

#[cfg(test)]
#[path = "hook_log_tests.rs"]
mod tests;
