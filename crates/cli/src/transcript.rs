// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcript generator invocation.
//!
//! On Stop, the configured external command turns the runtime transcript
//! into its archived form. One shot, two-minute budget, non-zero exits
//! tolerated: transcript generation must never hold up the agent.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::warn;

const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Run `<cmd> <transcript_path>`. No-op when unconfigured.
pub async fn generate(transcript_cmd: Option<&str>, transcript_path: &str) {
    let Some(cmd_line) = transcript_cmd else {
        return;
    };
    let mut parts = cmd_line.split_whitespace();
    let Some(program) = parts.next() else {
        return;
    };
    let mut cmd = Command::new(program);
    cmd.args(parts)
        .arg(transcript_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(GENERATE_TIMEOUT, cmd.output()).await {
        Ok(Ok(output)) if !output.status.success() => {
            warn!("transcript generation exited with {}", output.status);
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("transcript generation failed to run: {e}"),
        Err(_) => warn!("transcript generation timed out"),
    }
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
