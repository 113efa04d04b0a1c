// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-session state document.
//!
//! One JSON document per session id, persisted atomically after every hook
//! invocation. Gates read and mutate it through [`crate::gate`]; the store
//! in [`crate::store`] owns durability and locking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::paths::now_secs;

/// Current schema version written to new state files.
pub const STATE_VERSION: u32 = 2;

/// Workflows that skip the critic/QA stop requirements.
pub const STREAMLINED_WORKFLOWS: [&str; 3] =
    ["interactive-followup", "simple-question", "direct-skill"];

/// Gate status: open gates pass, closed gates enforce their policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Open,
    Closed,
}

/// Per-gate persistent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateState {
    pub status: GateStatus,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    /// PostToolUse events observed while the gate was open, since the last
    /// open transition.
    #[serde(default)]
    pub ops_since_open: u64,
    /// PostToolUse events observed while the gate was closed, since the
    /// last close transition.
    #[serde(default)]
    pub ops_since_close: u64,
    #[serde(default)]
    pub last_open_ts: f64,
    #[serde(default)]
    pub last_close_ts: f64,
    #[serde(default)]
    pub last_open_turn: u64,
    #[serde(default)]
    pub last_close_turn: u64,
    /// Gate-defined keys (e.g. `temp_path`, `original_prompt`).
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
}

impl GateState {
    pub fn new(status: GateStatus) -> Self {
        Self {
            status,
            blocked: false,
            block_reason: None,
            ops_since_open: 0,
            ops_since_close: 0,
            last_open_ts: 0.0,
            last_close_ts: 0.0,
            last_open_turn: 0,
            last_close_turn: 0,
            metrics: BTreeMap::new(),
        }
    }

    /// Transition to open. No-op if already open; on transition the
    /// `ops_since_open` counter resets and the open timestamp/turn are
    /// stamped.
    pub fn open(&mut self, turn: u64) {
        if self.status == GateStatus::Open {
            return;
        }
        self.status = GateStatus::Open;
        self.last_open_ts = now_secs();
        self.last_open_turn = turn;
        self.ops_since_open = 0;
    }

    /// Transition to closed; mirror of [`GateState::open`].
    pub fn close(&mut self, turn: u64) {
        if self.status == GateStatus::Closed {
            return;
        }
        self.status = GateStatus::Closed;
        self.last_close_ts = now_secs();
        self.last_close_turn = turn;
        self.ops_since_close = 0;
    }

    /// String form of a metric for template rendering.
    pub fn metric_str(&self, key: &str) -> Option<String> {
        self.metrics.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Main-agent bookkeeping: the bound task and the prompt under work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MainAgentState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_binding_ts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydrated_intent: Option<String>,
}

/// Cross-cutting session flags shared by gates and side handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFlags {
    /// Set by the `.` bypass prefix: all stop/tool policies stand down.
    #[serde(default)]
    pub gates_bypassed: bool,
    /// A hydration payload exists and the hydrator has not completed.
    #[serde(default)]
    pub hydration_pending: bool,
    /// The hydrator sub-agent is currently running.
    #[serde(default)]
    pub hydrator_active: bool,
    /// Handover recognized and not invalidated by later destructive tools.
    #[serde(default)]
    pub handover_skill_invoked: bool,
    #[serde(default)]
    pub plan_mode_invoked: bool,
    #[serde(default)]
    pub qa_invoked: bool,
    #[serde(default)]
    pub critic_invoked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_workflow: Option<String>,
    /// Recent stop-deny timestamps for the crash-loop circuit breaker.
    #[serde(default)]
    pub stop_block_timestamps: Vec<f64>,
    #[serde(default)]
    pub tool_calls_since_compliance: u64,
    #[serde(default)]
    pub last_compliance_ts: f64,
}

/// One sub-agent type's invocation history within the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubagentRecord {
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<f64>,
}

/// Hydration bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrationState {
    /// -1 = never hydrated, 0 = just hydrated, >0 = ops since hydration.
    pub turns_since_hydration: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critic_verdict: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

impl Default for HydrationState {
    fn default() -> Self {
        Self { turns_since_hydration: -1, critic_verdict: None, acceptance_criteria: Vec::new() }
    }
}

/// The durable per-session document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub version: u32,
    pub session_id: String,
    #[serde(default)]
    pub created_at: f64,
    /// Monotonic, incremented per hydrated user prompt.
    #[serde(default)]
    pub global_turn_count: u64,
    #[serde(default)]
    pub main_agent: MainAgentState,
    #[serde(default)]
    pub gates: BTreeMap<String, GateState>,
    #[serde(default, rename = "state")]
    pub flags: SessionFlags,
    #[serde(default)]
    pub subagents: BTreeMap<String, SubagentRecord>,
    #[serde(default)]
    pub hydration: HydrationState,
}

impl SessionState {
    pub fn new(session_id: &str) -> Self {
        Self {
            version: STATE_VERSION,
            session_id: session_id.to_string(),
            created_at: now_secs(),
            global_turn_count: 0,
            main_agent: MainAgentState::default(),
            gates: BTreeMap::new(),
            flags: SessionFlags::default(),
            subagents: BTreeMap::new(),
            hydration: HydrationState::default(),
        }
    }

    /// Gate state by name, created at `initial` on first reference.
    pub fn ensure_gate(&mut self, name: &str, initial: GateStatus) -> &mut GateState {
        self.gates.entry(name.to_string()).or_insert_with(|| GateState::new(initial))
    }

    /// Open a gate by name (created open if absent).
    pub fn open_gate(&mut self, name: &str) {
        let turn = self.global_turn_count;
        self.ensure_gate(name, GateStatus::Closed).open(turn);
    }

    /// Close a gate by name (created closed if absent).
    pub fn close_gate(&mut self, name: &str) {
        let turn = self.global_turn_count;
        self.ensure_gate(name, GateStatus::Open).close(turn);
    }

    /// Hydrator has produced a plan in this session.
    pub fn is_hydrated(&self) -> bool {
        self.main_agent.hydrated_intent.is_some()
    }

    /// Current workflow is one of the streamlined set.
    pub fn is_streamlined(&self) -> bool {
        match &self.flags.current_workflow {
            Some(wf) => STREAMLINED_WORKFLOWS.contains(&wf.as_str()),
            None => false,
        }
    }

    /// Record a sub-agent invocation (spawn observed on PostToolUse).
    pub fn record_subagent(&mut self, subagent_type: &str) {
        self.subagents.entry(subagent_type.to_string()).or_default().count += 1;
    }

    /// Record a sub-agent completion with its result.
    pub fn record_subagent_stop(&mut self, subagent_type: &str, result: Value) {
        let record = self.subagents.entry(subagent_type.to_string()).or_default();
        if record.count == 0 {
            record.count = 1;
        }
        record.last_result = Some(result);
        record.stopped_at = Some(now_secs());
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
