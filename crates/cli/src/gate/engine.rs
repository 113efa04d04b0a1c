// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generic gate engine: evaluates a [`GateConfig`] against one event.
//!
//! One engine serves every gate; gates differ only in their config rows.
//! Per event the engine runs triggers (state transitions), policies
//! (verdicts), and the countdown warning, in the order the hook class
//! prescribes (see the per-event methods).

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{error, warn};

use crate::event::HookContext;
use crate::state::{GateState, GateStatus, SessionState};

use super::custom::{self, GateEnv};
use super::{
    render_template, Countdown, GateCondition, GateConfig, GateError, GatePolicy, GateResult,
    GateTransition, Verdict,
};

/// A gate: a config row plus the generic evaluation logic.
pub struct Gate<'a> {
    config: &'a GateConfig,
}

impl<'a> Gate<'a> {
    pub fn new(config: &'a GateConfig) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    // -- Per-event entry points ---------------------------------------------

    /// PreToolUse: triggers first (JIT transitions such as unblocking the
    /// hydrator), then policies, then the countdown (only when no policy
    /// fired). Results merge under verdict precedence.
    pub fn check(
        &self,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        session: &mut SessionState,
    ) -> Result<Option<GateResult>, GateError> {
        self.with_state(session, |this, gate, session| {
            let trigger = this.eval_triggers(env, ctx, gate, session)?;
            let policy = this.eval_policies(env, ctx, gate, session)?;
            let countdown = match &policy {
                Some(p) if p.verdict != Verdict::Allow => None,
                _ => this.eval_countdown(env, ctx, gate),
            };
            let mut merged = GateResult::allow();
            let mut fired = false;
            for result in [trigger, policy, countdown].into_iter().flatten() {
                merged.merge(result);
                fired = true;
            }
            Ok(fired.then_some(merged))
        })
    }

    /// PostToolUse: count the op against the current status, then run
    /// triggers.
    pub fn on_tool_use(
        &self,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        session: &mut SessionState,
    ) -> Result<Option<GateResult>, GateError> {
        self.with_state(session, |this, gate, session| {
            match gate.status {
                GateStatus::Open => gate.ops_since_open += 1,
                GateStatus::Closed => gate.ops_since_close += 1,
            }
            this.eval_triggers(env, ctx, gate, session)
        })
    }

    /// Stop/SessionEnd: policies may deny; when they do not, triggers run
    /// (cleanup). A policy warning outranks trigger output.
    pub fn on_stop(
        &self,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        session: &mut SessionState,
    ) -> Result<Option<GateResult>, GateError> {
        self.with_state(session, |this, gate, session| {
            let policy = this.eval_policies(env, ctx, gate, session)?;
            if let Some(result) = &policy {
                if result.verdict == Verdict::Deny {
                    return Ok(policy);
                }
            }
            let trigger = this.eval_triggers(env, ctx, gate, session)?;
            match policy {
                Some(result) if result.verdict == Verdict::Warn => Ok(Some(result)),
                _ => Ok(trigger),
            }
        })
    }

    /// All remaining events run triggers only.
    pub fn triggers_only(
        &self,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        session: &mut SessionState,
    ) -> Result<Option<GateResult>, GateError> {
        self.with_state(session, |this, gate, session| {
            this.eval_triggers(env, ctx, gate, session)
        })
    }

    // -- Evaluation ---------------------------------------------------------

    /// Run the gate body with its state taken out of the session map, then
    /// write the (possibly mutated) state back.
    fn with_state<F>(&self, session: &mut SessionState, f: F) -> Result<Option<GateResult>, GateError>
    where
        F: FnOnce(
            &Self,
            &mut GateState,
            &mut SessionState,
        ) -> Result<Option<GateResult>, GateError>,
    {
        let mut gate = session
            .gates
            .get(self.config.name)
            .cloned()
            .unwrap_or_else(|| GateState::new(self.config.initial_status));
        let result = f(self, &mut gate, session);
        session.gates.insert(self.config.name.to_string(), gate);
        result
    }

    /// First matching trigger fires; later triggers are not consulted so
    /// the state transition stays deterministic.
    fn eval_triggers(
        &self,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        gate: &mut GateState,
        session: &mut SessionState,
    ) -> Result<Option<GateResult>, GateError> {
        for trigger in &self.config.triggers {
            if self.condition_holds(&trigger.condition, env, ctx, gate, session) {
                let result = self.apply_transition(&trigger.transition, env, ctx, gate, session)?;
                return Ok(Some(result));
            }
        }
        Ok(None)
    }

    /// First matching policy fires.
    fn eval_policies(
        &self,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        gate: &mut GateState,
        session: &mut SessionState,
    ) -> Result<Option<GateResult>, GateError> {
        for policy in &self.config.policies {
            if self.condition_holds(&policy.condition, env, ctx, gate, session) {
                return Ok(Some(self.apply_policy(policy, env, ctx, gate, session)?));
            }
        }
        Ok(None)
    }

    fn apply_policy(
        &self,
        policy: &GatePolicy,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        gate: &mut GateState,
        session: &mut SessionState,
    ) -> Result<GateResult, GateError> {
        // Action side effects run before rendering: they may set metrics
        // the templates reference.
        let mut message_prefix = String::new();
        let mut context_prefix = String::new();
        if let Some(action) = policy.custom_action {
            if let Some(output) = custom::run_action(action, env, ctx, gate, session) {
                if let Some(msg) = output.system_message {
                    message_prefix = format!("{msg}\n");
                }
                if let Some(ctx_frag) = output.context_injection {
                    context_prefix = format!("{ctx_frag}\n\n");
                }
            }
        }

        let vars = self.template_vars(ctx, gate);
        let message = render_template(self.config.name, policy.message_template, &vars)?;
        let context = match policy.context_template {
            Some(template) => {
                let rendered = render_template(self.config.name, template, &vars)?;
                Some(format!("<SYSTEM HOOK INSTRUCTION>{rendered}</SYSTEM HOOK INSTRUCTION>"))
            }
            None => None,
        };

        let mut result = GateResult { verdict: policy.verdict, ..GateResult::default() };
        result.system_message = Some(format!("{message_prefix}{message}"));
        let combined_context = match context {
            Some(c) => format!("{context_prefix}{c}"),
            None => context_prefix.trim_end().to_string(),
        };
        if !combined_context.is_empty() {
            result.context_injection = Some(combined_context);
        }
        Ok(result)
    }

    fn apply_transition(
        &self,
        transition: &GateTransition,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        gate: &mut GateState,
        session: &mut SessionState,
    ) -> Result<GateResult, GateError> {
        if let Some(target) = transition.target_status {
            match target {
                GateStatus::Open => gate.open(session.global_turn_count),
                GateStatus::Closed => gate.close(session.global_turn_count),
            }
        }
        if transition.reset_ops_counter {
            gate.ops_since_open = 0;
            gate.ops_since_close = 0;
        }
        for (key, value) in transition.set_metrics {
            gate.metrics.insert((*key).to_string(), Value::String((*value).to_string()));
        }
        for key in transition.increment_metrics {
            let next = gate.metrics.get(*key).and_then(Value::as_i64).unwrap_or(0) + 1;
            gate.metrics.insert((*key).to_string(), Value::from(next));
        }

        // Action before rendering, same reason as in policies.
        let mut action_message = None;
        let mut action_context = None;
        if let Some(action) = transition.custom_action {
            if let Some(output) = custom::run_action(action, env, ctx, gate, session) {
                action_message = output.system_message;
                action_context = output.context_injection;
            }
        }

        let vars = self.template_vars(ctx, gate);
        let mut result = GateResult::allow();
        if let Some(template) = transition.system_message_template {
            result.system_message = Some(render_template(self.config.name, template, &vars)?);
        }
        if let Some(template) = transition.context_template {
            result.context_injection = Some(render_template(self.config.name, template, &vars)?);
        }
        if let Some(msg) = action_message {
            result.system_message = Some(match result.system_message.take() {
                Some(existing) => format!("{existing}\n{msg}"),
                None => msg,
            });
        }
        if let Some(ctx_frag) = action_context {
            result.context_injection = Some(match result.context_injection.take() {
                Some(existing) => format!("{existing}\n\n{ctx_frag}"),
                None => ctx_frag,
            });
        }
        Ok(result)
    }

    /// Countdown warning inside the window before a threshold policy.
    ///
    /// Advisory only: a template failure degrades to a stock message
    /// instead of failing the event.
    fn eval_countdown(
        &self,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        gate: &GateState,
    ) -> Option<GateResult> {
        let countdown = self.config.countdown.as_ref()?;
        let current = countdown_metric(countdown, gate);
        let start_at = countdown.threshold.saturating_sub(countdown.start_before);
        if current < start_at || current >= countdown.threshold {
            return None;
        }
        let remaining = countdown.threshold - current;

        // The temp path is derivable before the policy ever fires, so the
        // warning can point at it in advance.
        let temp_path = gate
            .metric_str("temp_path")
            .unwrap_or_else(|| env.paths.gate_file(self.config.name, &ctx.session_id).display().to_string());

        let mut vars = BTreeMap::new();
        vars.insert("remaining".to_string(), remaining.to_string());
        vars.insert("threshold".to_string(), countdown.threshold.to_string());
        vars.insert("current".to_string(), current.to_string());
        vars.insert("gate_name".to_string(), self.config.name.to_string());
        vars.insert("temp_path".to_string(), temp_path);

        let message = match render_template(self.config.name, countdown.message_template, &vars) {
            Ok(message) => message,
            Err(e) => {
                warn!("countdown template error: {e}");
                format!("{remaining} ops until {} check required.", self.config.name)
            }
        };
        Some(GateResult::allow().with_message(message))
    }

    /// Conjunction over all present clauses; a clause over a missing
    /// optional is false, never an error.
    fn condition_holds(
        &self,
        condition: &GateCondition,
        env: &GateEnv<'_>,
        ctx: &HookContext,
        gate: &GateState,
        session: &SessionState,
    ) -> bool {
        if let Some(status) = condition.current_status {
            if gate.status != status {
                return false;
            }
        }
        if let Some(pattern) = condition.hook_event {
            if !pattern_matches(pattern, ctx.hook_event.as_str()) {
                return false;
            }
        }
        if let Some(pattern) = condition.tool_name_pattern {
            match &ctx.tool_name {
                Some(tool) if regex_search(pattern, tool) => {}
                _ => return false,
            }
        }
        if !condition.excluded_tool_categories.is_empty() {
            if let Some(tool) = &ctx.tool_name {
                if condition.excluded_tool_categories.contains(&super::tools::category(tool)) {
                    return false;
                }
            }
        }
        if let Some(pattern) = condition.tool_input_pattern {
            let input_str = Value::Object(ctx.tool_input.clone()).to_string();
            if !regex_search(pattern, &input_str) {
                return false;
            }
        }
        if let Some(pattern) = condition.subagent_type_pattern {
            match &ctx.subagent_type {
                Some(st) if !st.is_empty() && regex_search(pattern, st) => {}
                _ => return false,
            }
        }
        if let Some(min) = condition.min_ops_since_open {
            if gate.ops_since_open < min {
                return false;
            }
        }
        if let Some(min) = condition.min_ops_since_close {
            if gate.ops_since_close < min {
                return false;
            }
        }
        if let Some(min) = condition.min_turns_since_open {
            if session.global_turn_count.saturating_sub(gate.last_open_turn) < min {
                return false;
            }
        }
        if let Some(check) = condition.custom_check {
            if !custom::run_check(check, env, ctx, gate, session) {
                return false;
            }
        }
        true
    }

    fn template_vars(&self, ctx: &HookContext, gate: &GateState) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        vars.insert("session_id".to_string(), ctx.session_id.clone());
        vars.insert("tool_name".to_string(), ctx.tool_name.clone().unwrap_or_default());
        vars.insert(
            "gate_status".to_string(),
            match gate.status {
                GateStatus::Open => "open".to_string(),
                GateStatus::Closed => "closed".to_string(),
            },
        );
        vars.insert("ops_since_open".to_string(), gate.ops_since_open.to_string());
        vars.insert("ops_since_close".to_string(), gate.ops_since_close.to_string());
        vars.insert("blocked".to_string(), gate.blocked.to_string());
        vars.insert("block_reason".to_string(), gate.block_reason.clone().unwrap_or_default());
        for (key, value) in &gate.metrics {
            vars.insert(
                key.clone(),
                match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
            );
        }
        vars
    }
}

fn countdown_metric(countdown: &Countdown, gate: &GateState) -> u64 {
    match countdown.metric {
        "ops_since_open" => gate.ops_since_open,
        "ops_since_close" => gate.ops_since_close,
        key => gate.metrics.get(key).and_then(Value::as_u64).unwrap_or(0),
    }
}

/// Equality unless the pattern carries a regex metacharacter.
pub fn pattern_matches(pattern: &str, value: &str) -> bool {
    if pattern.chars().any(|c| "^$|[](){}*+?.\\".contains(c)) {
        regex_search(pattern, value)
    } else {
        pattern == value
    }
}

/// Unanchored regex search. A pattern that fails to compile evaluates to
/// false (conditions are total) with an error log.
pub fn regex_search(pattern: &str, value: &str) -> bool {
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            error!("bad condition pattern {pattern:?}: {e}");
            false
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
