// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-commit of the agent data repository.
//!
//! After a state-modifying tool event that touched the data repo, commit
//! and push the changes so agent-produced data survives the session. Every
//! step is hard-timed and every failure degrades to a warning; a sync
//! conflict aborts the rebase and leaves the repo as it was.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::process::Command;
use tracing::warn;

use crate::gate::tools;

const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
const BRANCH_TIMEOUT: Duration = Duration::from_secs(2);
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const REBASE_TIMEOUT: Duration = Duration::from_secs(30);
const COMMIT_TIMEOUT: Duration = Duration::from_secs(10);
const PUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether this tool call may have modified files under the data repo.
///
/// Edit-class tools targeting a path inside `data_dir` qualify, as do
/// task-manager operations (their storage lives in the data repo).
pub fn touched_data_repo(
    tool_name: &str,
    tool_input: &Map<String, Value>,
    data_dir: &Path,
) -> bool {
    if tools::matches_mcp_tool(tool_name, tools::TASK_BINDING_TOOLS) {
        return true;
    }
    if !tools::EDIT_TOOLS.contains(&tool_name) {
        return false;
    }
    let target = ["file_path", "TargetFile", "path", "notebook_path"]
        .iter()
        .find_map(|key| tool_input.get(*key).and_then(Value::as_str));
    match target {
        Some(path) => path.starts_with(&data_dir.display().to_string()),
        None => false,
    }
}

/// Commit and push the data repo. Never blocks the agent: all failures
/// log warnings and return.
pub async fn commit_and_push(data_dir: &Path, tool_name: &str, tool_input: &Map<String, Value>) {
    if !data_dir.join(".git").exists() {
        return;
    }
    if !has_changes(data_dir).await {
        return;
    }

    // Sync with the remote before committing so the push does not race a
    // concurrent session.
    if run_git(data_dir, &["fetch", "--quiet"], FETCH_TIMEOUT).await.is_none() {
        warn!("autocommit: fetch failed; committing without sync");
    } else if behind_remote(data_dir).await {
        let rebased = run_git(data_dir, &["pull", "--rebase", "--quiet"], REBASE_TIMEOUT).await;
        if rebased.is_none() {
            let _ = run_git(data_dir, &["rebase", "--abort"], STATUS_TIMEOUT).await;
            warn!("autocommit: rebase conflict; aborted cleanly, skipping this cycle");
            return;
        }
    }

    if run_git(data_dir, &["add", "-A"], STATUS_TIMEOUT).await.is_none() {
        warn!("autocommit: git add failed");
        return;
    }
    let message = commit_message(tool_name, tool_input);
    if run_git(data_dir, &["commit", "-m", &message], COMMIT_TIMEOUT).await.is_none() {
        warn!("autocommit: commit failed");
        return;
    }
    if run_git(data_dir, &["push", "--quiet"], PUSH_TIMEOUT).await.is_none() {
        warn!("autocommit: push failed (will retry on next cycle)");
    }
}

/// Protected branches refuse auto-commits; the data repo is the standing
/// exception (its default branch is the write target by design).
pub fn is_protected_branch(branch: Option<&str>, is_data_repo: bool) -> bool {
    if is_data_repo {
        return false;
    }
    match branch {
        Some(branch) => matches!(branch.to_lowercase().as_str(), "main" | "master"),
        None => true,
    }
}

fn commit_message(tool_name: &str, tool_input: &Map<String, Value>) -> String {
    let target = ["file_path", "TargetFile", "path"]
        .iter()
        .find_map(|key| tool_input.get(*key).and_then(Value::as_str))
        .and_then(|path| Path::new(path).file_name())
        .map(|name| name.to_string_lossy().to_string());
    match target {
        Some(name) => format!("warden: update {name} after {tool_name}"),
        None => format!("warden: update after {tool_name}"),
    }
}

async fn has_changes(repo: &Path) -> bool {
    match run_git(repo, &["status", "--porcelain"], STATUS_TIMEOUT).await {
        Some(out) => !out.trim().is_empty(),
        None => false,
    }
}

async fn behind_remote(repo: &Path) -> bool {
    let branch = run_git(repo, &["rev-parse", "--abbrev-ref", "HEAD"], BRANCH_TIMEOUT).await;
    let Some(branch) = branch.map(|b| b.trim().to_string()) else {
        return false;
    };
    if branch == "HEAD" {
        return false;
    }
    let upstream = format!("{branch}@{{u}}");
    let behind =
        run_git(repo, &["rev-list", "--count", &format!("HEAD..{upstream}")], BRANCH_TIMEOUT)
            .await;
    behind.and_then(|count| count.trim().parse::<u64>().ok()).is_some_and(|count| count > 0)
}

/// Run git in `repo` with a timeout. `None` on any failure, timeout, or
/// non-zero exit.
async fn run_git(repo: &Path, args: &[&str], timeout: Duration) -> Option<String> {
    let mut cmd = Command::new("git");
    cmd.args(args)
        .current_dir(repo)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let output = tokio::time::timeout(timeout, cmd.output()).await.ok()?.ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
#[path = "autocommit_tests.rs"]
mod tests;
