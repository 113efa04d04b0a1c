// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout for session state, logs, and hydration temp files.
//!
//! Everything lives under one state home:
//! `$WARDEN_STATE_DIR`, else `$XDG_STATE_HOME/warden`, else
//! `~/.local/state/warden`. File names embed the UTC date and an 8-char
//! session hash so an external `grep` over the directory can correlate
//! state files, hook logs, and temp files for one session.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// Resolved filesystem layout for one warden invocation.
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    /// Resolve the state home from an explicit override or the environment.
    pub fn resolve(state_dir: Option<&Path>) -> Self {
        if let Some(dir) = state_dir {
            return Self { root: dir.to_path_buf() };
        }
        let state_home = std::env::var("XDG_STATE_HOME").unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_default();
            format!("{home}/.local/state")
        });
        Self { root: PathBuf::from(state_home).join("warden") }
    }

    /// Use an explicit root (tests).
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// State home root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding session state files and hook logs.
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    /// Session state file: `sessions/{YYYYMMDD}-{sid8}.json`.
    pub fn state_file(&self, session_id: &str) -> PathBuf {
        let name = format!("{}-{}.json", utc_date_compact(), short_hash(session_id));
        self.sessions_dir().join(name)
    }

    /// Lock sentinel adjacent to the state file.
    pub fn lock_file(&self, session_id: &str) -> PathBuf {
        let name = format!("{}-{}.lock", utc_date_compact(), short_hash(session_id));
        self.sessions_dir().join(name)
    }

    /// Per-session hook log: `sessions/{YYYYMMDD}-{sid8}-hooks.jsonl`.
    pub fn hook_log_file(&self, session_id: &str) -> PathBuf {
        let name = format!("{}-{}-hooks.jsonl", utc_date_compact(), short_hash(session_id));
        self.sessions_dir().join(name)
    }

    /// Session-scoped temp directory for hydration payloads.
    pub fn temp_dir(&self, session_id: &str) -> PathBuf {
        self.root.join("tmp").join(short_hash(session_id))
    }

    /// Deterministic per-gate context file path.
    ///
    /// Computable before the file exists so countdown warnings can name it
    /// in advance of the policy ever firing.
    pub fn gate_file(&self, gate_name: &str, session_id: &str) -> PathBuf {
        self.temp_dir(session_id).join(format!("{gate_name}.md"))
    }

    /// Map from parent-process id to the last-known session identity.
    pub fn pid_map_file(&self) -> PathBuf {
        self.root.join("pid-map.json")
    }
}

/// Stable 8-character hash of a session id (hex prefix of SHA-256).
pub fn short_hash(session_id: &str) -> String {
    let digest = Sha256::digest(session_id.as_bytes());
    let mut out = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Seconds since the Unix epoch as a float (sub-second precision).
pub fn now_secs() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// Today's UTC date as `YYYYMMDD`.
pub fn utc_date_compact() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let (y, m, d) = civil_from_days((secs / 86_400) as i64);
    format!("{y:04}{m:02}{d:02}")
}

/// Current UTC timestamp as `YYYYMMDD-HHMMSS` (synthetic session ids).
pub fn utc_stamp_compact() -> String {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let (y, m, d) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!("{y:04}{m:02}{d:02}-{:02}{:02}{:02}", rem / 3600, (rem % 3600) / 60, rem % 60)
}

/// Days-since-epoch to civil (year, month, day), proleptic Gregorian.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// Framework-controlled temp prefixes where writes never require a bound
/// task (session state management, hook logging, hydration payloads).
pub fn safe_temp_prefixes(paths: &Paths) -> Vec<PathBuf> {
    let home = PathBuf::from(std::env::var("HOME").unwrap_or_default());
    vec![
        home.join(".claude").join("tmp"),
        home.join(".claude").join("projects"),
        home.join(".gemini").join("tmp"),
        paths.root().join("tmp"),
    ]
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
