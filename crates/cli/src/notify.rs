// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push notifications over ntfy.
//!
//! Entirely best-effort: an unset or empty topic disables the sender, and
//! delivery failures are logged without touching the reply.

use std::time::Duration;

use tracing::warn;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_SERVER: &str = "https://ntfy.sh";

/// ntfy sender bound to one topic.
pub struct Notifier {
    topic: Option<String>,
    server: String,
    client: reqwest::Client,
}

impl Notifier {
    /// `topic` comes from configuration; `None` or empty disables sends.
    pub fn new(topic: Option<String>) -> Self {
        let server =
            std::env::var("WARDEN_NTFY_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string());
        Self {
            topic: topic.filter(|t| !t.is_empty()),
            server,
            client: reqwest::Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.topic.is_some()
    }

    async fn send(&self, title: &str, message: &str) {
        let Some(topic) = &self.topic else {
            return;
        };
        let url = format!("{}/{topic}", self.server);
        let result = self
            .client
            .post(&url)
            .header("Title", title)
            .body(message.to_string())
            .send()
            .await;
        if let Err(e) = result {
            warn!("ntfy send failed: {e}");
        }
    }

    pub async fn session_start(&self, session_id: &str) {
        self.send("Session started", session_id).await;
    }

    pub async fn session_stop(&self, session_id: &str, current_task: Option<&str>) {
        let message = match current_task {
            Some(task) => format!("{session_id} (task {task} still bound)"),
            None => session_id.to_string(),
        };
        self.send("Session stopped", &message).await;
    }

    pub async fn task_bound(&self, session_id: &str, task_id: &str) {
        self.send("Task bound", &format!("{task_id} -> {session_id}")).await;
    }

    pub async fn task_completed(&self, session_id: &str, task_id: &str) {
        self.send("Task completed", &format!("{task_id} ({session_id})")).await;
    }

    pub async fn subagent_stop(&self, session_id: &str, agent_type: &str, verdict: Option<&str>) {
        let message = match verdict {
            Some(verdict) => format!("{agent_type}: {verdict} ({session_id})"),
            None => format!("{agent_type} ({session_id})"),
        };
        self.send("Sub-agent finished", &message).await;
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
