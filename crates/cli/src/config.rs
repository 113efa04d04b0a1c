// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::path::PathBuf;

use clap::Parser;

use crate::gate::builtin::{GateMode, GateModes};
use crate::paths::Paths;

/// Policy-and-state engine for AI-agent coding sessions.
#[derive(Debug, Parser)]
#[command(name = "warden", version, about)]
pub struct Config {
    /// Client runtime issuing the hook call.
    #[arg(long, value_enum)]
    pub client: ClientKind,

    /// Event name override (required for the gemini runtime when the
    /// payload carries none).
    pub event: Option<String>,

    /// Session state directory override.
    #[arg(long, env = "WARDEN_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Framework docs directory (WORKFLOWS.md, SKILLS.md, AXIOMS.md, ...).
    #[arg(long, env = "WARDEN_FRAMEWORK_DIR")]
    pub framework_dir: Option<PathBuf>,

    /// Agent data repository auto-committed after state-modifying tools.
    #[arg(long, env = "WARDEN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// ntfy topic for push notifications. Unset or empty disables them.
    #[arg(long, env = "WARDEN_NTFY_TOPIC")]
    pub ntfy_topic: Option<String>,

    /// External task CLI (e.g. "tasks" or "python task_cli.py").
    #[arg(long, env = "WARDEN_TASK_CLI")]
    pub task_cli: Option<String>,

    /// Transcript generator command, invoked once on Stop.
    #[arg(long, env = "WARDEN_TRANSCRIPT_CMD")]
    pub transcript_cmd: Option<String>,

    /// Hydration gate mode (block, warn, off).
    #[arg(long, env = "WARDEN_HYDRATION_MODE", default_value = "block")]
    pub hydration_mode: String,

    /// Task gate mode (block, warn, off).
    #[arg(long, env = "WARDEN_TASK_GATE_MODE", default_value = "block")]
    pub task_gate_mode: String,

    /// Custodiet gate mode (block, warn, off).
    #[arg(long, env = "WARDEN_CUSTODIET_MODE", default_value = "block")]
    pub custodiet_mode: String,

    /// Mutating ops allowed between compliance reviews.
    #[arg(long, env = "WARDEN_CUSTODIET_THRESHOLD", default_value = "7")]
    pub custodiet_threshold: u64,

    /// Authoritative sub-agent type override.
    #[arg(long, env = "WARDEN_SUBAGENT_TYPE")]
    pub subagent_type: Option<String>,

    /// Append raw hook inputs to this file (debugging). Unset disables.
    #[arg(long, env = "WARDEN_DEBUG_LOG")]
    pub debug_log: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Logs go to stderr;
    /// stdout carries only the JSON reply.
    #[arg(long, env = "WARDEN_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Log format (json or text).
    #[arg(long, env = "WARDEN_LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

/// Known client runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ClientKind {
    Claude,
    Gemini,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claude => f.write_str("claude"),
            Self::Gemini => f.write_str("gemini"),
        }
    }
}

impl Config {
    /// Resolved filesystem layout.
    pub fn paths(&self) -> Paths {
        Paths::resolve(self.state_dir.as_deref())
    }

    /// Gate toggles baked into the built-in gate set.
    pub fn gate_modes(&self) -> GateModes {
        GateModes {
            hydration: GateMode::parse(&self.hydration_mode),
            task: GateMode::parse(&self.task_gate_mode),
            custodiet: GateMode::parse(&self.custodiet_mode),
            custodiet_threshold: self.custodiet_threshold,
            ..GateModes::default()
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
