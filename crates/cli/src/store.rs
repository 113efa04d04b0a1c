// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed session state store.
//!
//! Multiple hook processes can run concurrently for one session (a
//! sub-agent's PreToolUse while the main agent's PostToolUse is still
//! finishing), so every read-modify-write cycle is serialized with an
//! advisory lock on a sentinel adjacent to the state file:
//!
//! 1. acquire the lock (bounded wait, ≤ 10 s)
//! 2. read state
//! 3. compute the verdict (no state I/O)
//! 4. write atomically (temp file + rename) while holding the lock
//! 5. release
//!
//! Persistence failures never block the agent: a failed load substitutes a
//! fresh document with a warning, a failed save or lock timeout logs at
//! CRITICAL level and the invocation proceeds in memory.

use std::fs::File;
use std::io::Write;
use std::time::{Duration, Instant};

use nix::fcntl::{Flock, FlockArg};
use tracing::{error, warn};

use crate::paths::Paths;
use crate::state::SessionState;

/// Maximum wait for the session lock before proceeding unlocked.
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_RETRY: Duration = Duration::from_millis(50);

/// Held advisory lock on a session. Unlocks on drop.
pub struct SessionLock {
    _lock: Flock<File>,
}

/// File-backed store rooted at a [`Paths`] layout.
///
/// Tests point [`Paths`] at a temp directory; nothing here reads global
/// process state.
pub struct FileStore {
    paths: Paths,
}

impl FileStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    /// Acquire the per-session advisory lock.
    ///
    /// Returns `None` on timeout or I/O failure; the caller proceeds with
    /// in-memory state per the operational policy.
    pub fn acquire(&self, session_id: &str) -> Option<SessionLock> {
        let lock_path = self.paths.lock_file(session_id);
        if let Some(parent) = lock_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("CRITICAL: cannot create session dir {}: {e}", parent.display());
                return None;
            }
        }
        let deadline = Instant::now() + LOCK_TIMEOUT;
        loop {
            let file = match File::options().create(true).truncate(false).write(true).open(&lock_path) {
                Ok(f) => f,
                Err(e) => {
                    error!("CRITICAL: cannot open lock file {}: {e}", lock_path.display());
                    return None;
                }
            };
            match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
                Ok(lock) => return Some(SessionLock { _lock: lock }),
                Err((_, errno)) => {
                    if Instant::now() >= deadline {
                        error!(
                            "CRITICAL: session lock timeout after {}s ({errno}); \
                             proceeding with in-memory state",
                            LOCK_TIMEOUT.as_secs()
                        );
                        return None;
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
            }
        }
    }

    /// Load the session document, or a fresh one at the current schema
    /// version when missing or unreadable.
    pub fn load(&self, session_id: &str) -> SessionState {
        let path = self.paths.state_file(session_id);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return SessionState::new(session_id);
            }
            Err(e) => {
                warn!("failed to read session state {}: {e}; starting fresh", path.display());
                return SessionState::new(session_id);
            }
        };
        match serde_json::from_str(&contents) {
            Ok(state) => state,
            Err(e) => {
                warn!("corrupt session state {}: {e}; starting fresh", path.display());
                SessionState::new(session_id)
            }
        }
    }

    /// Persist the document atomically: temp file in the same directory,
    /// flush, rename over the target.
    pub fn save(&self, state: &SessionState) -> anyhow::Result<()> {
        let path = self.paths.state_file(&state.session_id);
        let dir = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("state path has no parent: {}", path.display()))?;
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, state)?;
        tmp.as_file_mut().flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
