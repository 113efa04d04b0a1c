// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hydration context builder.
//!
//! On a real user prompt, assemble a deterministic context payload so a
//! downstream hydrator sub-agent can plan before the main agent acts. The
//! payload goes to a temp file; the agent gets a short instruction naming
//! the path; the hydration gate closes until the hydrator completes.

pub mod file_index;
pub mod sections;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tracing::warn;
use uuid::Uuid;

use crate::paths::{self, Paths};
use crate::state::SessionState;
use crate::tasks;

/// Temp file prefix; stale-file cleanup keys on it.
pub const FILE_PREFIX: &str = "hydrate_";

/// Temp files older than this are removed before each write.
const STALE_AFTER: Duration = Duration::from_secs(3600);

/// Follow-up prompts at most this many words long skip fresh hydration.
const FOLLOWUP_MAX_WORDS: usize = 30;

/// Markers indicating a prompt continues work already in flight.
const CONTINUATION_MARKERS: &[&str] = &[
    // pronouns referring to prior context
    "this", "that", "those", "these", "it",
    // additive markers
    "also", "too", "as well", "while you're at it",
    // repetition markers
    "same", "again", "another",
    // short imperative verbs for quick tasks
    "save", "add", "put", "update", "log", "note",
    // continuation phrases
    "one more", "quick", "before you go",
];

/// How the prompt handler should treat a submitted prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptDisposition {
    /// No hydration, no gate change. `bypass` carries the `.` prefix:
    /// the user is taking over interactively and gates stand down.
    Skip { bypass: bool },
    /// Continuation of in-flight work: consumes a turn, no fresh payload.
    FollowUp,
    /// Full hydration.
    Hydrate,
}

/// Classify a prompt against the skip and follow-up rules.
pub fn classify(prompt: &str, state: &SessionState) -> PromptDisposition {
    let trimmed = prompt.trim();
    // Envelope tags from background agents: the notification is not a user
    // request.
    if trimmed.starts_with("<agent-notification>") || trimmed.starts_with("<task-notification>") {
        return PromptDisposition::Skip { bypass: false };
    }
    // Expanded slash commands: the expansion is the hydration.
    if prompt.contains("<command-name>/") {
        return PromptDisposition::Skip { bypass: false };
    }
    if trimmed.starts_with('/') || trimmed.starts_with("# /") {
        return PromptDisposition::Skip { bypass: false };
    }
    if trimmed.starts_with('.') {
        return PromptDisposition::Skip { bypass: true };
    }
    if is_followup(trimmed, state) {
        return PromptDisposition::FollowUp;
    }
    PromptDisposition::Hydrate
}

/// A follow-up inherits context from the active session: the session must
/// already carry work context, the prompt must be short, and it must carry
/// a continuation marker.
pub fn is_followup(prompt: &str, state: &SessionState) -> bool {
    let has_context = state.hydration.turns_since_hydration > 0
        || state.main_agent.current_task.is_some();
    if !has_context {
        return false;
    }
    if prompt.split_whitespace().count() > FOLLOWUP_MAX_WORDS {
        return false;
    }
    let lower = prompt.to_lowercase();
    CONTINUATION_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Inputs for payload assembly beyond the session itself.
pub struct BuilderInputs<'a> {
    pub cwd: Option<&'a Path>,
    pub framework_dir: Option<&'a Path>,
    pub task_cli: Option<&'a str>,
}

/// Result of a successful build.
pub struct HydrationOutcome {
    pub temp_path: PathBuf,
    pub instruction: String,
}

/// Assemble the payload, write it to the session temp dir, close the
/// hydration gate, and return the instruction for the main agent.
///
/// A failed payload write is fatal to the hook invocation: emitting an
/// instruction that points at a missing file would wedge the session.
pub async fn build_instruction(
    paths: &Paths,
    inputs: &BuilderInputs<'_>,
    prompt: &str,
    state: &mut SessionState,
) -> anyhow::Result<HydrationOutcome> {
    let session_id = state.session_id.clone();
    let temp_dir = paths.temp_dir(&session_id);
    cleanup_stale(&temp_dir);

    let task_state = tasks::work_state(inputs.task_cli).await;
    let relevant_files = inputs
        .cwd
        .map(|cwd| file_index::formatted_relevant_paths(cwd, prompt, 10))
        .unwrap_or_default();

    let payload = render_payload(paths, inputs, &session_id, prompt, &task_state, &relevant_files);

    std::fs::create_dir_all(&temp_dir)
        .with_context(|| format!("creating hydration temp dir {}", temp_dir.display()))?;
    let file_name = format!(
        "{FILE_PREFIX}{}_{}.md",
        paths::utc_stamp_compact(),
        &Uuid::new_v4().to_string()[..8]
    );
    let temp_path = temp_dir.join(file_name);
    let mut tmp = tempfile::NamedTempFile::new_in(&temp_dir)
        .with_context(|| format!("creating temp file in {}", temp_dir.display()))?;
    std::io::Write::write_all(&mut tmp, payload.as_bytes())
        .context("writing hydration payload")?;
    tmp.persist(&temp_path)
        .map_err(|e| e.error)
        .with_context(|| format!("persisting hydration payload to {}", temp_path.display()))?;

    // State updates: a new turn begins, the gate closes until the hydrator
    // reports back.
    state.global_turn_count += 1;
    state.main_agent.original_prompt = Some(prompt.to_string());
    state.close_gate("hydration");
    if let Some(gate) = state.gates.get_mut("hydration") {
        gate.metrics.insert(
            "temp_path".to_string(),
            serde_json::Value::String(temp_path.display().to_string()),
        );
        gate.metrics
            .insert("original_prompt".to_string(), serde_json::Value::String(prompt.to_string()));
    }
    state.flags.hydration_pending = true;
    state.flags.hydrator_active = false;

    let instruction = render_instruction(prompt, &temp_path);
    Ok(HydrationOutcome { temp_path, instruction })
}

/// Record a prompt that skips hydration: state reflects the prompt but the
/// gate stays untouched.
pub fn record_skipped_prompt(state: &mut SessionState, prompt: &str, bypass: bool) {
    state.main_agent.original_prompt = Some(prompt.to_string());
    state.flags.hydration_pending = false;
    if bypass {
        state.flags.gates_bypassed = true;
    }
}

fn render_payload(
    paths: &Paths,
    inputs: &BuilderInputs<'_>,
    session_id: &str,
    prompt: &str,
    task_state: &str,
    relevant_files: &str,
) -> String {
    let framework_paths = sections::framework_paths(paths, session_id, inputs.framework_dir);
    let tools = sections::tools_index();
    let env = sections::env_vars();
    let workflows = sections::workflows_index(inputs.framework_dir, inputs.cwd, prompt);
    let skills = sections::skills_index(inputs.framework_dir);
    let scripts = sections::scripts_index(inputs.framework_dir);
    let axioms = sections::axioms(inputs.framework_dir);
    let heuristics = sections::heuristics(inputs.framework_dir);
    let context_index = sections::project_context_index(inputs.cwd);

    let mut out = format!(
        "# Hydration Context\n\n\
         ## Prompt\n\n{prompt}\n\n\
         ## Framework Paths\n\n{framework_paths}\n\n\
         ## Tool Servers\n\n{tools}\n\n\
         ## Environment\n\n{env}\n\n\
         ## Workflows\n\n{workflows}\n\n\
         ## Skills\n\n{skills}\n\n\
         ## Scripts\n\n{scripts}\n\n\
         ## Axioms\n\n{axioms}\n\n\
         ## Heuristics\n\n{heuristics}\n"
    );
    if !context_index.is_empty() {
        out.push_str(&format!("\n## Project Context Index\n\n{context_index}\n"));
    }
    if !relevant_files.is_empty() {
        out.push_str(&format!("\n## Relevant Files\n\n{relevant_files}\n"));
    }
    if !task_state.is_empty() {
        out.push_str(&format!("\n## Task State\n\n{task_state}\n"));
    }
    out
}

/// The short instruction injected into the agent's context. The payload
/// itself stays on disk; this stays within a few hundred tokens.
fn render_instruction(prompt: &str, temp_path: &Path) -> String {
    let mut preview: String = prompt.chars().take(80).collect::<String>().replace('\n', " ");
    if prompt.chars().count() > 80 {
        preview.push_str("...");
    }
    format!(
        "Prompt hydration required.\n\n\
         A context payload for this prompt was written to:\n{}\n\n\
         Spawn the prompt-hydrator sub-agent with that file path. The hydrator reads \
         the payload, selects a workflow, and returns a plan under a \
         \"## HYDRATION RESULT\" heading. Do not modify state before it completes.\n\n\
         Prompt: {preview}",
        temp_path.display()
    )
}

/// Remove payload files older than an hour so the temp dir cannot grow
/// without bound.
fn cleanup_stale(temp_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(temp_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(FILE_PREFIX) {
            continue;
        }
        let stale = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .is_some_and(|age| age > STALE_AFTER);
        if stale {
            if let Err(e) = std::fs::remove_file(entry.path()) {
                warn!("failed to remove stale hydration file {name:?}: {e}");
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
