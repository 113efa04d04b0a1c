// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool classification across agent runtimes.
//!
//! The claude and gemini runtimes spell the same operations differently
//! (`Read` vs `read_file`, `Bash` vs `run_shell_command`). Gates reason in
//! terms of categories and intents; this module owns the spelling tables.
//! Divergent spellings are enumerated explicitly rather than matched by
//! suffix, so a new runtime's names cannot collide with an existing one.

use serde_json::{Map, Value};

use super::ToolCategory;

/// Read-only tools that never modify state. These do not reset the
/// handover gate, do not advance hydration counters, and are exempt from
/// the mutating-tool policies.
pub const SAFE_READ_TOOLS: &[&str] = &[
    // claude
    "Read",
    "Glob",
    "Grep",
    "WebFetch",
    "WebSearch",
    // gemini
    "read_file",
    "view_file",
    "list_dir",
    "find_by_name",
    "grep_search",
    "search_web",
    "read_url_content",
];

/// File-editing tools (always destructive).
pub const EDIT_TOOLS: &[&str] = &[
    "Edit",
    "Write",
    "NotebookEdit",
    "write_to_file",
    "write_file",
    "replace",
    "replace_file_content",
    "multi_replace_file_content",
];

/// Shell-execution tools.
pub const SHELL_TOOLS: &[&str] = &["Bash", "run_shell_command", "run_command"];

/// Tools that spawn sub-agents or skills.
pub const SPAWN_TOOLS: &[&str] = &["Task", "Skill", "delegate_to_agent", "activate_skill"];

/// Task-manager operations that bind or unbind a task.
pub const TASK_BINDING_TOOLS: &[&str] =
    &["update_task", "claim_next_task", "complete_task", "complete_tasks"];

/// Read-only tool check, including MCP memory-retrieval variants.
pub fn is_safe_read(tool_name: &str) -> bool {
    SAFE_READ_TOOLS.contains(&tool_name) || matches_mcp_tool(tool_name, &["retrieve_memory"])
}

/// Coarse category for condition exclusions.
pub fn category(tool_name: &str) -> ToolCategory {
    if is_safe_read(tool_name) {
        return ToolCategory::Read;
    }
    if EDIT_TOOLS.contains(&tool_name) {
        return ToolCategory::Edit;
    }
    if SHELL_TOOLS.contains(&tool_name) {
        return ToolCategory::Shell;
    }
    if SPAWN_TOOLS.contains(&tool_name) {
        return ToolCategory::Spawn;
    }
    ToolCategory::Other
}

/// Match a tool by its bare name or its MCP-prefixed form
/// (`mcp__<server>__<name>`).
pub fn matches_mcp_tool(tool_name: &str, names: &[&str]) -> bool {
    if names.contains(&tool_name) {
        return true;
    }
    match tool_name.rsplit_once("__") {
        Some((prefix, bare)) => prefix.starts_with("mcp__") && names.contains(&bare),
        None => false,
    }
}

/// Read-only shell commands (no task binding required). A command is
/// read-only when it equals an entry or starts with `entry + space`.
const READONLY_COMMAND_PREFIXES: &[&str] = &[
    "git status",
    "git diff",
    "git log",
    "git show",
    "git branch",
    "git remote",
    "git fetch",
    "ls",
    "cat",
    "head",
    "tail",
    "grep",
    "rg",
    "find",
    "which",
    "type",
    "echo",
    "pwd",
    "env",
    "printenv",
    "uname",
    "whoami",
    "date",
    "uptime",
];

/// Shell constructs that modify state.
const DESTRUCTIVE_COMMAND_MARKERS: &[&str] = &[
    "git commit",
    "git push",
    "git merge",
    "git rebase",
    "git reset",
    "git checkout",
    "git restore",
    "git clean",
    "git stash",
    "rm ",
    "rmdir",
    "mv ",
    "cp ",
    "mkdir",
    "touch ",
    "chmod ",
    "chown ",
    "> ",
    ">>",
    "tee ",
    "sed -i",
    "npm install",
    "npm run",
    "yarn ",
    "pip install",
    "cargo install",
];

/// Whether a shell command modifies state.
///
/// Destructive markers win even inside chained commands (a read-only
/// prefix must not launder `git status && git commit`); then read-only
/// prefixes pass; anything unrecognized is destructive (fail-closed).
pub fn is_destructive_command(command: &str) -> bool {
    let cmd = command.trim().to_lowercase();
    for marker in DESTRUCTIVE_COMMAND_MARKERS {
        if cmd.starts_with(marker) || cmd.contains(&format!(" {marker}")) {
            return true;
        }
    }
    for prefix in READONLY_COMMAND_PREFIXES {
        if cmd == *prefix || cmd.starts_with(&format!("{prefix} ")) {
            return false;
        }
    }
    true
}

/// Whether this tool call actually modifies state.
///
/// Edit-class tools always do; shell tools depend on the command text
/// (a missing command is assumed destructive); everything else does not.
pub fn is_destructive_call(tool_name: &str, tool_input: &Map<String, Value>) -> bool {
    if EDIT_TOOLS.contains(&tool_name) {
        return true;
    }
    if SHELL_TOOLS.contains(&tool_name) {
        return match command_text(tool_input) {
            Some(command) => is_destructive_command(command),
            None => true,
        };
    }
    false
}

fn command_text(tool_input: &Map<String, Value>) -> Option<&str> {
    tool_input
        .get("command")
        .or_else(|| tool_input.get("CommandLine"))
        .and_then(Value::as_str)
}

/// Target of a spawn-style tool call, most specific field first.
///
/// Several runtimes overload the same tools with different parameter names;
/// when more than one candidate is present the most specific wins.
pub fn spawn_target(tool_input: &Map<String, Value>) -> Option<&str> {
    for key in ["subagent_type", "agent_name", "name", "skill"] {
        if let Some(target) = tool_input.get(key).and_then(Value::as_str) {
            if !target.is_empty() {
                return Some(target);
            }
        }
    }
    None
}

/// Whether this call invokes one of the named skills, across all known
/// invocation shapes: direct tool name, `Skill`/`activate_skill` payloads,
/// `delegate_to_agent`, and `Task` sub-agent types.
pub fn is_skill_invocation(
    tool_name: &str,
    tool_input: &Map<String, Value>,
    skill_names: &[&str],
) -> bool {
    if skill_names.contains(&tool_name) {
        return true;
    }
    if SPAWN_TOOLS.contains(&tool_name) {
        if let Some(target) = spawn_target(tool_input) {
            return skill_names.contains(&target);
        }
    }
    false
}

/// Whether a spawn call targets the prompt hydrator.
pub fn is_hydrator_spawn(tool_name: &str, tool_input: &Map<String, Value>) -> bool {
    if tool_name.to_lowercase().contains("hydrator") {
        return true;
    }
    if !SPAWN_TOOLS.contains(&tool_name) {
        return false;
    }
    match spawn_target(tool_input) {
        Some(target) => target == "prompt-hydrator" || target.to_lowercase().contains("hydrator"),
        None => false,
    }
}

/// Utility skills that never count as work: spawning one does not satisfy
/// the hydration intent and does not register as a sub-agent run.
pub const INFRASTRUCTURE_SKILLS: &[&str] = &[
    "diag",
    "dump",
    "log",
    "remember",
    "handover",
    "audit",
    "garden",
    "session-insights",
    "task-viz",
    "prompt-hydrator",
];

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
