// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hydration payload sections.
//!
//! Each loader returns a markdown fragment. Loaders copy configured files
//! and tables into the payload; they never analyze content beyond
//! frontmatter stripping and keyword matching for project workflows.
//! Missing inputs degrade to placeholders; the payload must always
//! assemble.

use std::path::Path;

use crate::paths::Paths;

/// Framework and session paths table.
pub fn framework_paths(paths: &Paths, session_id: &str, framework_dir: Option<&Path>) -> String {
    let mut lines = vec![
        "| Path | Resolved |".to_string(),
        "|------|----------|".to_string(),
        format!("| State home | `{}` |", paths.root().display()),
        format!("| Sessions | `{}` |", paths.sessions_dir().display()),
        format!("| Session temp | `{}` |", paths.temp_dir(session_id).display()),
        format!("| Hook log | `{}` |", paths.hook_log_file(session_id).display()),
    ];
    if let Some(dir) = framework_dir {
        lines.push(format!("| Framework | `{}` |", dir.display()));
    }
    lines.join("\n")
}

/// Known tool servers available to the hydrator.
pub fn tools_index() -> String {
    [
        "| Server | Description |",
        "|--------|-------------|",
        "| task_manager | Hierarchical task system (create, update, claim, complete) |",
        "| memory | Semantic memory retrieval and recall |",
    ]
    .join("\n")
}

/// Recognized environment variables and their current values.
pub fn env_vars() -> String {
    let vars = [
        "WARDEN_STATE_DIR",
        "WARDEN_FRAMEWORK_DIR",
        "WARDEN_DATA_DIR",
        "WARDEN_NTFY_TOPIC",
        "WARDEN_HYDRATION_MODE",
        "WARDEN_CUSTODIET_MODE",
        "WARDEN_TASK_GATE_MODE",
        "WARDEN_TASK_CLI",
    ];
    let mut lines = vec!["| Variable | Value |".to_string(), "|----------|-------|".to_string()];
    for var in vars {
        let value = std::env::var(var).unwrap_or_else(|_| "(not set)".to_string());
        lines.push(format!("| {var} | `{value}` |"));
    }
    lines.join("\n")
}

/// Framework workflows index plus any project-local overrides.
pub fn workflows_index(framework_dir: Option<&Path>, cwd: Option<&Path>, prompt: &str) -> String {
    let base = read_indexed_file(framework_dir, "WORKFLOWS.md");
    let project = cwd.map(|dir| project_workflows(dir, prompt)).unwrap_or_default();
    if project.is_empty() {
        base
    } else {
        format!("{base}{project}")
    }
}

pub fn skills_index(framework_dir: Option<&Path>) -> String {
    read_indexed_file(framework_dir, "SKILLS.md")
}

pub fn scripts_index(framework_dir: Option<&Path>) -> String {
    read_indexed_file(framework_dir, "SCRIPTS.md")
}

pub fn axioms(framework_dir: Option<&Path>) -> String {
    read_indexed_file(framework_dir, "AXIOMS.md")
}

pub fn heuristics(framework_dir: Option<&Path>) -> String {
    read_indexed_file(framework_dir, "HEURISTICS.md")
}

fn read_indexed_file(framework_dir: Option<&Path>, name: &str) -> String {
    let Some(dir) = framework_dir else {
        return format!("({name} not configured)");
    };
    match std::fs::read_to_string(dir.join(name)) {
        Ok(content) => strip_frontmatter(&content).to_string(),
        Err(_) => format!("({name} not found)"),
    }
}

/// Project-local workflows under `.agent/workflows/`. A `WORKFLOWS.md`
/// index wins outright; otherwise the files are listed and the ones whose
/// keywords match the prompt are inlined.
fn project_workflows(cwd: &Path, prompt: &str) -> String {
    let agent_dir = cwd.join(".agent");
    if let Ok(content) = std::fs::read_to_string(agent_dir.join("WORKFLOWS.md")) {
        return format!("\n\n## Project Workflows\n\n{}", strip_frontmatter(&content));
    }
    let workflows_dir = agent_dir.join("workflows");
    let Ok(entries) = std::fs::read_dir(&workflows_dir) else {
        return String::new();
    };
    let mut files: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    if files.is_empty() {
        return String::new();
    }
    files.sort();

    let mut lines = vec!["\n\n## Project Workflows".to_string(), String::new()];
    lines.push("| Workflow | File |".to_string());
    lines.push("|----------|------|".to_string());
    for file in &files {
        let stem = file.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        lines.push(format!("| {} | `{}` |", stem.replace(['-', '_'], " "), file.display()));
    }

    let prompt_lower = prompt.to_lowercase();
    let keyword_map: &[(&str, &[&str])] = &[
        ("TESTING.md", &["test", "e2e", "unit", "mock"]),
        ("DEBUGGING.md", &["debug", "investigate", "error", "traceback"]),
        ("DEVELOPMENT.md", &["develop", "implement", "feature", "refactor"]),
    ];
    for file in &files {
        let name = file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let Some((_, keywords)) = keyword_map.iter().find(|(k, _)| *k == name) else {
            continue;
        };
        if !keywords.iter().any(|kw| prompt_lower.contains(kw)) {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(file) {
            lines.push(format!("\n### {name}\n\n{}", strip_frontmatter(&content)));
        }
    }
    lines.join("\n")
}

/// Project context map: a topic → path index the agent reads on demand.
/// Malformed or absent maps are skipped silently (optional feature).
pub fn project_context_index(cwd: Option<&Path>) -> String {
    let Some(cwd) = cwd else {
        return String::new();
    };
    let Ok(raw) = std::fs::read_to_string(cwd.join(".agent").join("context-map.json")) else {
        return String::new();
    };
    let Ok(map) = serde_json::from_str::<serde_json::Value>(&raw) else {
        return String::new();
    };
    let Some(docs) = map.get("docs").and_then(|d| d.as_array()) else {
        return String::new();
    };
    let mut lines = Vec::new();
    for doc in docs {
        let Some(doc) = doc.as_object() else {
            continue;
        };
        let topic = doc.get("topic").and_then(|v| v.as_str()).unwrap_or("Unknown");
        let path = doc.get("path").and_then(|v| v.as_str()).unwrap_or_default();
        let mut entry = format!("- **{}** (`{path}`)", topic.replace('_', " "));
        if let Some(desc) = doc.get("description").and_then(|v| v.as_str()) {
            entry.push_str(&format!(": {desc}"));
        }
        lines.push(entry);
    }
    lines.join("\n")
}

/// Drop a leading YAML frontmatter block if present.
pub fn strip_frontmatter(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("---") else {
        return content.trim();
    };
    match rest.find("\n---") {
        Some(end) => rest[end + 4..].trim(),
        None => content.trim(),
    }
}

#[cfg(test)]
#[path = "sections_tests.rs"]
mod tests;
