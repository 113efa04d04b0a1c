// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt-relevance ranking over the working tree.
//!
//! Selective injection: instead of dumping a file tree into the hydration
//! payload, rank repository paths by how many prompt keywords they contain
//! and include only the top few.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Words too common to discriminate anything.
const STOPWORDS: &[&str] = &[
    "this", "that", "with", "from", "into", "have", "will", "what", "when", "where", "then",
    "them", "they", "their", "would", "could", "should", "about", "after", "before", "make",
    "need", "want", "please", "file", "files", "code", "using", "been", "were", "also",
];

/// Directories never worth indexing.
const SKIP_DIRS: &[&str] = &["target", "node_modules", "dist", "build", "__pycache__", ".venv"];

const MAX_WALK_ENTRIES: usize = 20_000;

/// Lowercased keywords from the prompt: words longer than three chars,
/// minus stopwords, deduplicated.
pub fn keywords(prompt: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for word in prompt.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-') {
        let word = word.to_lowercase();
        if word.len() <= 3 || STOPWORDS.contains(&word.as_str()) || out.contains(&word) {
            continue;
        }
        out.push(word);
    }
    out
}

/// Paths under `root` ranked by keyword hits, best first, at most `max`.
pub fn relevant_paths(root: &Path, prompt: &str, max: usize) -> Vec<PathBuf> {
    let keywords = keywords(prompt);
    if keywords.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(usize, PathBuf)> = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !(name.starts_with('.') && name.len() > 1) && !SKIP_DIRS.contains(&name.as_ref())
    });
    for entry in walker.flatten().take(MAX_WALK_ENTRIES) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let hay = rel.display().to_string().to_lowercase();
        let score = keywords.iter().filter(|kw| hay.contains(kw.as_str())).count();
        if score > 0 {
            scored.push((score, rel.to_path_buf()));
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.into_iter().take(max).map(|(_, path)| path).collect()
}

/// Markdown bullet list of the ranked paths, or empty when none match.
pub fn formatted_relevant_paths(root: &Path, prompt: &str, max: usize) -> String {
    let paths = relevant_paths(root, prompt, max);
    if paths.is_empty() {
        return String::new();
    }
    let mut lines = Vec::with_capacity(paths.len());
    for path in paths {
        lines.push(format!("- `{}`", path.display()));
    }
    lines.join("\n")
}

#[cfg(test)]
#[path = "file_index_tests.rs"]
mod tests;
