// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for the external task CLI.
//!
//! The task system is a collaborator, not part of this crate: we shell out
//! to a configured command and degrade silently to an empty snapshot on
//! any failure or timeout.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

const LIST_TIMEOUT: Duration = Duration::from_secs(5);
const LIST_LIMIT: u32 = 20;

/// Current work snapshot for the hydration payload: active tasks plus the
/// inbox of ready work. Empty when the CLI is unconfigured or failing.
pub async fn work_state(task_cli: Option<&str>) -> String {
    let Some(cli) = task_cli else {
        return String::new();
    };
    let active = run_list(cli, "active").await;
    let inbox = run_list(cli, "inbox").await;

    let mut sections = Vec::new();
    if let Some(active) = active {
        sections.push(format!("### Active Tasks\n\n{active}"));
    }
    if let Some(inbox) = inbox {
        sections.push(format!("### Incoming Tasks (inbox)\n\n{inbox}"));
    }
    sections.join("\n\n")
}

/// `<cli> list --status=<status> --limit=20` with a 5 s budget.
async fn run_list(cli: &str, status: &str) -> Option<String> {
    let mut parts = cli.split_whitespace();
    let program = parts.next()?;
    let mut cmd = Command::new(program);
    cmd.args(parts)
        .arg("list")
        .arg(format!("--status={status}"))
        .arg(format!("--limit={LIST_LIMIT}"))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(LIST_TIMEOUT, cmd.output()).await.ok()?.ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
