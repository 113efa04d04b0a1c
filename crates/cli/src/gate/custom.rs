// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named custom checks and actions referenced by gate configs.
//!
//! The declarative condition model covers status, event, and pattern
//! clauses; anything needing real logic (tool classification, git state,
//! response scanning) is a named check here. Actions are the transition
//! side effects that mutate session flags or produce extra message
//! fragments. Names are resolved by `match`: configs are static rows, so
//! an unknown name is a programmer error and evaluates to false / no-op
//! with an error log.

use std::io::Read;
use std::process::Stdio;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{error, warn};

use crate::event::{HookContext, HookEvent};
use crate::paths::{self, Paths};
use crate::state::{GateState, SessionState};

use super::tools;

/// Environment handed to checks and actions alongside the event context.
pub struct GateEnv<'a> {
    pub paths: &'a Paths,
}

/// Message fragments produced by a custom action, concatenated with the
/// transition's template output.
#[derive(Debug, Default)]
pub struct ActionOutput {
    pub system_message: Option<String>,
    pub context_injection: Option<String>,
}

/// Required bold fields of a valid framework reflection.
const REFLECTION_FIELDS: &[&str] = &[
    "Prompts",
    "Guidance received",
    "Followed",
    "Outcome",
    "Accomplishments",
    "Friction points",
    "Proposed changes",
    "Next step",
];

const HYDRATION_RESULT_PATTERN: &str =
    r"(?i)(?:##\s*|\*\*)?(?:HYDRATION RESULT|Execution Plan|Execution Steps)";

/// Evaluate a named check. Unknown names are false.
pub fn run_check(
    name: &str,
    env: &GateEnv<'_>,
    ctx: &HookContext,
    _gate: &GateState,
    state: &SessionState,
) -> bool {
    match name {
        "mutating_tool" => mutating_tool(ctx),
        "hydration_blocks" => hydration_blocks(env, ctx, state),
        "task_unbound_mutation" => task_unbound_mutation(env, ctx, state),
        "custodiet_invoked" => skill_invoked(ctx, &["custodiet"]),
        "handover_invoked" => skill_invoked(ctx, &["handover"]),
        "qa_invoked" => skill_invoked(ctx, &["qa"]),
        "critic_invoked" => skill_invoked(ctx, &["critic"]),
        "destructive_tool_used" => mutating_tool(ctx),
        "hydrator_result_valid" => hydrator_result_valid(ctx),
        "response_has_hydration_result" => response_matches(ctx, HYDRATION_RESULT_PATTERN),
        "response_has_valid_reflection" => {
            reflection_state(ctx) == ReflectionState::Valid
        }
        "response_has_partial_reflection" => {
            reflection_state(ctx) == ReflectionState::MissingFields
        }
        "handover_stop_blocks" => handover_stop_blocks(ctx, state),
        "qa_required" => qa_required(state),
        "critic_required" => critic_required(state),
        other => {
            error!("unknown custom check '{other}'");
            false
        }
    }
}

/// Execute a named action. Unknown names are a no-op.
pub fn run_action(
    name: &str,
    _env: &GateEnv<'_>,
    ctx: &HookContext,
    gate: &mut GateState,
    state: &mut SessionState,
) -> Option<ActionOutput> {
    match name {
        "complete_hydration" => Some(complete_hydration(ctx, gate, state)),
        "reflection_warning" => Some(reflection_warning(ctx)),
        "record_handover" => {
            state.flags.handover_skill_invoked = true;
            None
        }
        "note_destructive_op" => note_destructive_op(state),
        "record_compliance" => {
            state.flags.tool_calls_since_compliance = 0;
            state.flags.last_compliance_ts = paths::now_secs();
            None
        }
        "record_qa" => {
            state.flags.qa_invoked = true;
            None
        }
        "record_critic" => {
            state.flags.critic_invoked = true;
            let text = ctx.output_text().to_uppercase();
            for verdict in ["PROCEED", "REVISE", "HALT"] {
                if text.contains(verdict) {
                    state.hydration.critic_verdict = Some(verdict.to_string());
                    break;
                }
            }
            None
        }
        other => {
            error!("unknown custom action '{other}'");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn mutating_tool(ctx: &HookContext) -> bool {
    match &ctx.tool_name {
        Some(tool) => tools::is_destructive_call(tool, &ctx.tool_input),
        None => false,
    }
}

fn skill_invoked(ctx: &HookContext, names: &[&str]) -> bool {
    match &ctx.tool_name {
        Some(tool) => tools::is_skill_invocation(tool, &ctx.tool_input, names),
        None => false,
    }
}

/// Hydration gate block: a payload is pending and this call would modify
/// state before the hydrator has run. Spawning the hydrator itself and
/// shell commands that touch the hydration temp dir are let through.
fn hydration_blocks(env: &GateEnv<'_>, ctx: &HookContext, state: &SessionState) -> bool {
    if !state.flags.hydration_pending || state.flags.gates_bypassed {
        return false;
    }
    let Some(tool) = &ctx.tool_name else {
        return false;
    };
    if tools::is_hydrator_spawn(tool, &ctx.tool_input) {
        return false;
    }
    if !tools::is_destructive_call(tool, &ctx.tool_input) {
        return false;
    }
    // A shell command working inside the hydration temp dir is part of the
    // hydration flow itself.
    let temp_dir = env.paths.temp_dir(&ctx.session_id);
    if let Some(command) = ctx.tool_input.get("command").and_then(|v| v.as_str()) {
        if command.contains(&temp_dir.display().to_string()) {
            return false;
        }
    }
    true
}

/// Task gate block: state-modifying call with no bound task, unless the
/// write targets a framework-controlled temp prefix.
fn task_unbound_mutation(env: &GateEnv<'_>, ctx: &HookContext, state: &SessionState) -> bool {
    if state.flags.gates_bypassed || state.main_agent.current_task.is_some() {
        return false;
    }
    let Some(tool) = &ctx.tool_name else {
        return false;
    };
    if !tools::is_destructive_call(tool, &ctx.tool_input) {
        return false;
    }
    if target_in_safe_prefix(env, ctx) {
        return false;
    }
    true
}

fn target_in_safe_prefix(env: &GateEnv<'_>, ctx: &HookContext) -> bool {
    let target = ["file_path", "TargetFile", "path", "notebook_path"]
        .iter()
        .find_map(|key| ctx.tool_input.get(*key).and_then(|v| v.as_str()));
    let Some(target) = target else {
        return false;
    };
    let expanded = expand_home(target);
    paths::safe_temp_prefixes(env.paths)
        .iter()
        .any(|prefix| expanded.starts_with(&prefix.display().to_string()))
}

fn expand_home(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            format!("{home}/{rest}")
        }
        None => path.to_string(),
    }
}

fn hydrator_result_valid(ctx: &HookContext) -> bool {
    ctx.hook_event == HookEvent::SubagentStop && ctx.output_text().contains("HYDRATION RESULT")
}

fn response_matches(ctx: &HookContext, pattern: &str) -> bool {
    let Some(text) = ctx.raw_str("prompt_response") else {
        return false;
    };
    match Regex::new(pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            error!("bad response pattern {pattern:?}: {e}");
            false
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ReflectionState {
    Absent,
    MissingFields,
    Valid,
}

fn reflection_state(ctx: &HookContext) -> ReflectionState {
    let Some(text) = ctx.raw_str("prompt_response") else {
        return ReflectionState::Absent;
    };
    if !text.contains("## Framework Reflection") {
        return ReflectionState::Absent;
    }
    if missing_reflection_fields(text).is_empty() {
        ReflectionState::Valid
    } else {
        ReflectionState::MissingFields
    }
}

fn missing_reflection_fields(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    REFLECTION_FIELDS
        .iter()
        .filter(|field| !lower.contains(&format!("**{}**:", field.to_lowercase())))
        .copied()
        .collect()
}

fn handover_stop_blocks(ctx: &HookContext, state: &SessionState) -> bool {
    if state.flags.gates_bypassed || state.flags.handover_skill_invoked {
        return false;
    }
    state.main_agent.current_task.is_some() || git_worktree_dirty(ctx.cwd.as_deref())
}

fn qa_required(state: &SessionState) -> bool {
    !state.flags.gates_bypassed
        && state.is_hydrated()
        && !state.is_streamlined()
        && !state.flags.qa_invoked
}

fn critic_required(state: &SessionState) -> bool {
    !state.flags.gates_bypassed
        && state.is_hydrated()
        && state.subagents.is_empty()
        && !state.is_streamlined()
}

/// `git status --porcelain` with a 5 s budget. Any failure or timeout
/// reads as clean (fail-open: this check can only block stops).
fn git_worktree_dirty(cwd: Option<&str>) -> bool {
    let mut cmd = std::process::Command::new("git");
    cmd.args(["status", "--porcelain"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(_) => return false,
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return false;
                }
                let mut out = String::new();
                if let Some(mut stdout) = child.stdout.take() {
                    let _ = stdout.read_to_string(&mut out);
                }
                return !out.trim().is_empty();
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    warn!("git status timed out; treating worktree as clean");
                    let _ = child.kill();
                    let _ = child.wait();
                    return false;
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(_) => return false,
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Hydrator completion: clear the pending flag, reset the hydration
/// counter, record the intent, and parse the workflow the plan selected.
fn complete_hydration(
    ctx: &HookContext,
    gate: &mut GateState,
    state: &mut SessionState,
) -> ActionOutput {
    state.flags.hydration_pending = false;
    state.flags.hydrator_active = false;
    state.hydration.turns_since_hydration = 0;

    let text = match ctx.hook_event {
        HookEvent::SubagentStop => ctx.output_text(),
        _ => ctx.raw_str("prompt_response").unwrap_or_default().to_string(),
    };

    let intent = hydrated_intent_from(&text)
        .or_else(|| gate.metric_str("original_prompt"))
        .unwrap_or_else(|| "(hydrated)".to_string());
    state.main_agent.hydrated_intent = Some(intent);

    let workflow = workflow_from(&text);
    if let Some(wf) = &workflow {
        state.flags.current_workflow = Some(wf.clone());
    }

    if state.is_streamlined() {
        let wf = workflow.unwrap_or_default();
        return ActionOutput {
            system_message: Some(format!(
                "[gate] Hydration complete (workflow: {wf}). Streamlined mode enabled."
            )),
            context_injection: None,
        };
    }

    ActionOutput {
        system_message: Some("[gate] Hydration plan detected. Gate satisfied.".to_string()),
        context_injection: Some(
            "<system-reminder>\n\
             Hydration plan detected. Next step: invoke the critic to review this plan\n\
             before acting on it.\n\
             </system-reminder>"
                .to_string(),
        ),
    }
}

fn hydrated_intent_from(text: &str) -> Option<String> {
    let idx = text.find("HYDRATION RESULT")?;
    let after = &text[idx..];
    let line = after.lines().nth(1).unwrap_or_default().trim();
    if line.is_empty() {
        return None;
    }
    Some(line.chars().take(200).collect())
}

fn workflow_from(text: &str) -> Option<String> {
    let re = Regex::new(r"\*\*Workflows?\*\*:\s*\[\[workflows/([^\]]+)\]\]").ok()?;
    re.captures(text).map(|caps| caps[1].to_string())
}

/// Reflection header present but fields missing: warn and show the format,
/// keep the gate closed.
fn reflection_warning(ctx: &HookContext) -> ActionOutput {
    let text = ctx.raw_str("prompt_response").unwrap_or_default();
    let missing = missing_reflection_fields(text);
    let list = missing.join(", ");
    ActionOutput {
        system_message: Some(format!(
            "[gate] Framework reflection found but missing required fields: {list}. \
             Handover gate remains closed."
        )),
        context_injection: Some(format!(
            "<system-reminder>\n\
             Your framework reflection is missing required fields: {list}.\n\
             The reflection must contain each of these as a `**Field**:` line:\n\
             Prompts, Guidance received, Followed, Outcome, Accomplishments,\n\
             Friction points, Proposed changes, Next step.\n\
             </system-reminder>"
        )),
    }
}

/// Destructive tool observed: the handover record is stale. Only message
/// on the transition from recorded to required.
fn note_destructive_op(state: &mut SessionState) -> Option<ActionOutput> {
    if !state.flags.handover_skill_invoked {
        return None;
    }
    state.flags.handover_skill_invoked = false;
    Some(ActionOutput {
        system_message: Some(
            "[gate] Destructive tool used. Handover required before stop.".to_string(),
        ),
        context_injection: None,
    })
}

#[cfg(test)]
#[path = "custom_tests.rs"]
mod tests;
