// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level hook router.
//!
//! One invocation: normalize the payload, load session state under the
//! session lock, run side handlers (logging, notifications, auto-commit,
//! transcript), dispatch gates in registry order, merge verdicts, apply
//! the stop crash-loop breaker, persist state, log, and hand back the
//! canonical reply for encoding.

use std::io::Write;

use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::config::Config;
use crate::event::{HookContext, HookEvent};
use crate::gate::custom::GateEnv;
use crate::gate::registry::GateRegistry;
use crate::gate::{tools, GateError, GateResult, Verdict};
use crate::hook_log::{self, GateContribution, HookLogEntry};
use crate::hydrate::{self, PromptDisposition};
use crate::normalize::Normalizer;
use crate::notify::Notifier;
use crate::paths::{now_secs, Paths};
use crate::reply::CanonicalReply;
use crate::state::{GateStatus, SessionState};
use crate::store::FileStore;
use crate::{autocommit, transcript};

/// Sub-agent types that bypass policy verdicts; their events still drive
/// gate triggers so state stays current.
pub const COMPLIANCE_SUBAGENT_TYPES: &[&str] = &["custodiet", "critic", "qa", "prompt-hydrator"];

/// Stop denies inside this window feed the crash-loop breaker.
const STOP_BLOCK_WINDOW_SECS: f64 = 120.0;
const STOP_BLOCK_LIMIT: usize = 5;

pub struct Router<'a> {
    config: &'a Config,
    registry: &'a GateRegistry,
    paths: Paths,
    store: FileStore,
    notifier: Notifier,
}

impl<'a> Router<'a> {
    pub fn new(config: &'a Config, registry: &'a GateRegistry) -> Self {
        let paths = config.paths();
        Self {
            config,
            registry,
            paths: paths.clone(),
            store: FileStore::new(paths),
            notifier: Notifier::new(config.ntfy_topic.clone()),
        }
    }

    /// Process one raw payload into a canonical reply.
    pub async fn handle(&self, raw: Map<String, Value>) -> (HookContext, CanonicalReply) {
        self.debug_log_input(&raw);

        let normalizer =
            Normalizer::new(&self.paths, self.config.client, self.config.subagent_type.clone());
        let ctx = normalizer.normalize(raw, self.config.event.as_deref());

        // Lock spans the whole read-modify-write cycle. On timeout we
        // proceed in memory and skip the save.
        let lock = self.store.acquire(&ctx.session_id);
        let mut state = self.store.load(&ctx.session_id);
        let mut reply = CanonicalReply::default();

        self.run_side_handlers(&ctx, &mut state, &mut reply).await;

        let contributions = self.dispatch_gates(&ctx, &mut state, &mut reply);

        self.append_status_icons(&state, &mut reply);
        self.apply_stop_breaker(&ctx, &mut state, &mut reply);

        if lock.is_some() {
            if let Err(e) = self.store.save(&state) {
                error!("CRITICAL: failed to save session state: {e:#}");
            }
        }
        drop(lock);

        self.append_hook_log(&ctx, &reply, contributions);
        (ctx, reply)
    }

    // -- Side handlers ------------------------------------------------------

    async fn run_side_handlers(
        &self,
        ctx: &HookContext,
        state: &mut SessionState,
        reply: &mut CanonicalReply,
    ) {
        match &ctx.hook_event {
            HookEvent::SessionStart => self.on_session_start(ctx, reply).await,
            HookEvent::UserPromptSubmit => self.on_user_prompt(ctx, state, reply).await,
            HookEvent::PostToolUse => self.on_post_tool(ctx, state, reply).await,
            HookEvent::SubagentStop => self.on_subagent_stop(ctx, state).await,
            HookEvent::Stop => {
                if let Some(path) = &ctx.transcript_path {
                    transcript::generate(self.config.transcript_cmd.as_deref(), path).await;
                }
                let task = state.main_agent.current_task.clone();
                self.notifier.session_stop(&ctx.session_id, task.as_deref()).await;
            }
            _ => {}
        }
    }

    /// Session start: make sure the session directory is writable before
    /// anything depends on it, then report the session's files.
    async fn on_session_start(&self, ctx: &HookContext, reply: &mut CanonicalReply) {
        let sessions_dir = self.paths.sessions_dir();
        if let Err(e) = std::fs::create_dir_all(&sessions_dir) {
            reply.verdict = Verdict::Deny;
            reply.push_message(&format!(
                "Cannot create session state directory {}: {e}. \
                 Check WARDEN_STATE_DIR and directory permissions.",
                sessions_dir.display()
            ));
            return;
        }
        reply.push_message(&format!(
            "Session started: {} ({})",
            ctx.session_id, ctx.session_short_hash
        ));
        reply.push_message(&format!(
            "State file: {}",
            self.paths.state_file(&ctx.session_id).display()
        ));
        reply.push_message(&format!(
            "Hook log: {}",
            self.paths.hook_log_file(&ctx.session_id).display()
        ));
        self.notifier.session_start(&ctx.session_id).await;
    }

    /// User prompt: decide between skip, follow-up, and full hydration.
    async fn on_user_prompt(
        &self,
        ctx: &HookContext,
        state: &mut SessionState,
        reply: &mut CanonicalReply,
    ) {
        let prompt = ctx.raw_str("prompt").unwrap_or_default().to_string();
        if prompt.is_empty() {
            return;
        }
        match hydrate::classify(&prompt, state) {
            PromptDisposition::Skip { bypass } => {
                hydrate::record_skipped_prompt(state, &prompt, bypass);
                if bypass {
                    reply.push_message("Gates bypassed for this session.");
                }
            }
            PromptDisposition::FollowUp => {
                state.global_turn_count += 1;
                hydrate::record_skipped_prompt(state, &prompt, false);
                reply.push_message("Follow-up prompt: inheriting active session context.");
            }
            PromptDisposition::Hydrate => {
                let inputs = hydrate::BuilderInputs {
                    cwd: ctx.cwd.as_deref().map(std::path::Path::new),
                    framework_dir: self.config.framework_dir.as_deref(),
                    task_cli: self.config.task_cli.as_deref(),
                };
                match hydrate::build_instruction(&self.paths, &inputs, &prompt, state).await {
                    Ok(outcome) => reply.push_context(&outcome.instruction),
                    Err(e) => {
                        // A broken payload write would leave the agent
                        // pointed at a missing file; refuse the event.
                        error!("hydration payload write failed: {e:#}");
                        reply.verdict = Verdict::Deny;
                        reply.push_message(&format!("Hydration payload write failed: {e:#}"));
                    }
                }
            }
        }
    }

    /// Post-tool accounting: sub-agent records, hydration counters, task
    /// binding, plan mode, and the data-repo auto-commit.
    async fn on_post_tool(
        &self,
        ctx: &HookContext,
        state: &mut SessionState,
        reply: &mut CanonicalReply,
    ) {
        let Some(tool) = ctx.tool_name.clone() else {
            return;
        };

        // Sub-agent spawn tracking. PostToolUse on the spawn tool means the
        // tool call returned, so the hydrator is no longer running; the
        // pending flag is cleared only by completion evidence.
        if tools::SPAWN_TOOLS.contains(&tool.as_str())
            || tool.to_lowercase().contains("hydrator")
        {
            if tools::is_hydrator_spawn(&tool, &ctx.tool_input) {
                state.flags.hydrator_active = false;
            }
            let target = tools::spawn_target(&ctx.tool_input)
                .map(str::to_string)
                .or_else(|| {
                    (!tools::SPAWN_TOOLS.contains(&tool.as_str())).then(|| tool.clone())
                });
            if let Some(target) = target {
                // Utility skills are not work: they don't register as
                // sub-agent runs (the critic gate keys on those).
                if !tools::INFRASTRUCTURE_SKILLS.contains(&target.as_str()) {
                    state.record_subagent(&target);
                }
                if matches!(tool.as_str(), "Task" | "delegate_to_agent") {
                    let verdict = ctx
                        .tool_output
                        .get("verdict")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    self.notifier
                        .subagent_stop(&ctx.session_id, &target, verdict.as_deref())
                        .await;
                }
            }
        }

        // Hydration distance only advances on tools that can change state.
        if !tools::is_safe_read(&tool) && state.hydration.turns_since_hydration >= 0 {
            state.hydration.turns_since_hydration += 1;
        }

        // Session-wide tool counter. The custodiet gate's own ops counter
        // is reset by its trigger; this one is visibility only.
        if !tools::is_skill_invocation(&tool, &ctx.tool_input, &["custodiet"]) {
            state.flags.tool_calls_since_compliance += 1;
        }

        if matches!(tool.as_str(), "EnterPlanMode" | "ExitPlanMode" | "exit_plan_mode")
            && !state.flags.plan_mode_invoked
        {
            state.flags.plan_mode_invoked = true;
            reply.push_message("Plan mode recorded.");
        }

        self.apply_task_binding(ctx, state, reply, &tool).await;

        if let Some(data_dir) = &self.config.data_dir {
            if autocommit::touched_data_repo(&tool, &ctx.tool_input, data_dir) {
                autocommit::commit_and_push(data_dir, &tool, &ctx.tool_input).await;
            }
        }
    }

    /// Bind/unbind the session task from task-manager tool traffic.
    async fn apply_task_binding(
        &self,
        ctx: &HookContext,
        state: &mut SessionState,
        reply: &mut CanonicalReply,
        tool: &str,
    ) {
        if !tools::matches_mcp_tool(tool, tools::TASK_BINDING_TOOLS) {
            return;
        }
        let bare = tool.rsplit_once("__").map(|(_, bare)| bare).unwrap_or(tool);
        let status = ctx.tool_input.get("status").and_then(Value::as_str);
        let task_id = ctx
            .tool_output
            .get("id")
            .or_else(|| ctx.tool_output.get("task_id"))
            .or_else(|| ctx.tool_input.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let binds = bare == "claim_next_task" || (bare == "update_task" && status == Some("in_progress"));
        let unbinds = matches!(bare, "complete_task" | "complete_tasks")
            || (bare == "update_task" && status == Some("done"));

        if binds {
            let Some(task_id) = task_id else {
                return;
            };
            if let Some(current) = &state.main_agent.current_task {
                if current != &task_id {
                    reply.push_message(&format!(
                        "Session already bound to task {current}; ignoring {task_id}."
                    ));
                    return;
                }
            }
            state.main_agent.current_task = Some(task_id.clone());
            state.main_agent.task_binding_ts = Some(now_secs());
            reply.push_message(&format!("Task bound to session: {task_id}"));
            self.notifier.task_bound(&ctx.session_id, &task_id).await;
        } else if unbinds {
            if let Some(current) = state.main_agent.current_task.take() {
                state.main_agent.task_binding_ts = None;
                reply.push_message(&format!("Task completed and unbound from session: {current}"));
                self.notifier.task_completed(&ctx.session_id, &current).await;
            }
        }
    }

    /// Sub-agent completion: record the result; hydration gate triggers
    /// own the pending flag.
    async fn on_subagent_stop(&self, ctx: &HookContext, state: &mut SessionState) {
        let Some(subagent_type) = ctx.subagent_type.clone() else {
            warn!("SubagentStop without subagent_type; skipping record");
            return;
        };
        state.record_subagent_stop(&subagent_type, ctx.tool_output.clone());
        if subagent_type.to_lowercase().contains("hydrator") {
            state.flags.hydrator_active = false;
        }
        if subagent_type == "critic" {
            state.flags.critic_invoked = true;
            let text = ctx.output_text().to_uppercase();
            for verdict in ["PROCEED", "REVISE", "HALT"] {
                if text.contains(verdict) {
                    state.hydration.critic_verdict = Some(verdict.to_string());
                    break;
                }
            }
        }
    }

    // -- Gate dispatch ------------------------------------------------------

    fn dispatch_gates(
        &self,
        ctx: &HookContext,
        state: &mut SessionState,
        reply: &mut CanonicalReply,
    ) -> Vec<GateContribution> {
        // Unknown runtime events and notifications pass through: side
        // handlers only.
        if matches!(ctx.hook_event, HookEvent::Unknown(_) | HookEvent::Notification) {
            return Vec::new();
        }

        // Compliance sub-agents never hit policies, but their events still
        // fire triggers so gate state stays current.
        let compliance_bypass = ctx.is_subagent
            && (state.flags.hydrator_active
                || ctx
                    .subagent_type
                    .as_deref()
                    .is_some_and(|st| COMPLIANCE_SUBAGENT_TYPES.contains(&st)));

        let env = GateEnv { paths: &self.paths };
        let mut contributions = Vec::new();

        for gate in self.registry.gates() {
            let result = if compliance_bypass {
                gate.triggers_only(&env, ctx, state)
            } else {
                match &ctx.hook_event {
                    HookEvent::PreToolUse => gate.check(&env, ctx, state),
                    HookEvent::PostToolUse => gate.on_tool_use(&env, ctx, state),
                    HookEvent::Stop | HookEvent::SessionEnd => gate.on_stop(&env, ctx, state),
                    _ => gate.triggers_only(&env, ctx, state),
                }
            };

            match result {
                Ok(Some(gate_result)) => {
                    let deny = gate_result.verdict == Verdict::Deny;
                    contributions.push(GateContribution {
                        gate: gate.name().to_string(),
                        verdict: gate_result.verdict,
                        system_message: gate_result.system_message.clone(),
                    });
                    self.merge_gate_result(reply, gate_result, compliance_bypass);
                    if deny && !compliance_bypass {
                        // First deny wins; later gates keep their state for
                        // the next event.
                        break;
                    }
                }
                Ok(None) => {}
                Err(e @ GateError::Template { .. }) => {
                    // Malformed config: refuse to emit a broken
                    // instruction, name the gate and variable.
                    error!("{e}");
                    contributions.push(GateContribution {
                        gate: gate.name().to_string(),
                        verdict: Verdict::Deny,
                        system_message: Some(e.to_string()),
                    });
                    if !compliance_bypass {
                        reply.verdict = reply.verdict.merge(Verdict::Deny);
                        reply.push_message(&e.to_string());
                    }
                }
            }
        }
        contributions
    }

    fn merge_gate_result(
        &self,
        reply: &mut CanonicalReply,
        result: GateResult,
        compliance_bypass: bool,
    ) {
        if !compliance_bypass {
            reply.verdict = reply.verdict.merge(result.verdict);
        }
        if let Some(message) = &result.system_message {
            reply.push_message(message);
        }
        if let Some(context) = &result.context_injection {
            reply.push_context(context);
        }
        if result.updated_input.is_some() {
            reply.updated_input = result.updated_input;
        }
        reply.metadata.extend(result.metadata);
    }

    // -- Reply finishing ----------------------------------------------------

    /// Compact icon strip naming the gates that need attention.
    fn append_status_icons(&self, state: &SessionState, reply: &mut CanonicalReply) {
        let mut parts: Vec<String> = Vec::new();

        let hydration_closed = state
            .gates
            .get("hydration")
            .map_or(true, |gate| gate.status == GateStatus::Closed);
        if hydration_closed {
            parts.push("\u{1F4A7}".to_string()); // droplet: hydration pending
        }

        if let Some(config) = self.registry.get("custodiet") {
            if let (Some(countdown), Some(gate)) =
                (config.countdown.as_ref(), state.gates.get("custodiet"))
            {
                let ops = gate.ops_since_open;
                if ops >= countdown.threshold {
                    parts.push("\u{25C7}".to_string()); // overdue
                } else if ops >= countdown.threshold.saturating_sub(countdown.start_before) {
                    parts.push(format!("\u{25C7} {}", countdown.threshold - ops));
                }
            }
        }

        let handover_done = state
            .gates
            .get("handover")
            .is_some_and(|gate| gate.status == GateStatus::Open)
            && state.flags.handover_skill_invoked;
        if handover_done {
            parts.push("\u{2261}".to_string());
        }

        if let Some(task) = &state.main_agent.current_task {
            parts.push(format!("\u{25B6} {task}"));
        }

        let strip = if parts.is_empty() { "\u{2713}".to_string() } else { parts.join(" ") };
        match &mut reply.system_message {
            Some(message) => {
                message.push(' ');
                message.push_str(&strip);
            }
            None => reply.system_message = Some(strip),
        }
    }

    /// Crash-loop breaker: the 5th stop deny inside two minutes flips to a
    /// visible allow and clears the history, so a wedged gate cannot trap
    /// the session.
    fn apply_stop_breaker(
        &self,
        ctx: &HookContext,
        state: &mut SessionState,
        reply: &mut CanonicalReply,
    ) {
        if !ctx.hook_event.is_stop_class() || reply.verdict != Verdict::Deny {
            return;
        }
        let now = now_secs();
        state.flags.stop_block_timestamps.retain(|ts| now - ts < STOP_BLOCK_WINDOW_SECS);
        state.flags.stop_block_timestamps.push(now);
        if state.flags.stop_block_timestamps.len() >= STOP_BLOCK_LIMIT {
            reply.verdict = Verdict::Allow;
            reply.push_message(
                "SAFETY OVERRIDE: stop blocked 5 times within 2 minutes. \
                 Auto-approving to prevent a stalled session.",
            );
            state.flags.stop_block_timestamps.clear();
        }
    }

    fn append_hook_log(
        &self,
        ctx: &HookContext,
        reply: &CanonicalReply,
        gates: Vec<GateContribution>,
    ) {
        let mut entry = HookLogEntry::new(ctx.hook_event.as_str(), &ctx.trace_id, reply.verdict);
        entry.system_message = reply.system_message.clone();
        entry.gates = gates;
        entry.input = hook_log::trim_input(&ctx.raw_input);
        if let Some(tool) = &ctx.tool_name {
            entry.input.insert("tool_name".to_string(), Value::String(tool.clone()));
        }
        hook_log::append(&self.paths, &ctx.session_id, &entry);
    }

    /// Raw-input debug log, enabled by configuration only.
    fn debug_log_input(&self, raw: &Map<String, Value>) {
        let Some(path) = &self.config.debug_log else {
            return;
        };
        let entry = serde_json::json!({
            "ts": now_secs(),
            "client": self.config.client.to_string(),
            "event": self.config.event,
            "input": Value::Object(raw.clone()),
        });
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{entry}"));
        if let Err(e) = result {
            warn!("debug log write failed: {e}");
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
