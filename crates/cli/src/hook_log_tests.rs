// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::{json, Map, Value};

use crate::gate::Verdict;
use crate::paths::Paths;

use super::{append, trim_input, GateContribution, HookLogEntry};

#[test]
fn append_writes_one_jsonl_record_per_call() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let paths = Paths::at(dir.path());

    let mut entry = HookLogEntry::new("PreToolUse", "trace-1", Verdict::Deny);
    entry.system_message = Some("blocked".to_string());
    entry.gates.push(GateContribution {
        gate: "hydration".to_string(),
        verdict: Verdict::Deny,
        system_message: Some("blocked".to_string()),
    });
    append(&paths, "sess-1", &entry);
    append(&paths, "sess-1", &HookLogEntry::new("PostToolUse", "trace-2", Verdict::Allow));

    let contents = std::fs::read_to_string(paths.hook_log_file("sess-1"))?;
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: HookLogEntry = serde_json::from_str(lines[0])?;
    assert_eq!(first.event, "PreToolUse");
    assert_eq!(first.verdict, Verdict::Deny);
    assert_eq!(first.gates.len(), 1);
    assert_eq!(first.gates[0].gate, "hydration");
    Ok(())
}

#[test]
fn append_never_truncates() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let paths = Paths::at(dir.path());
    for i in 0..5 {
        append(&paths, "sess-1", &HookLogEntry::new("Stop", &format!("t-{i}"), Verdict::Allow));
    }
    let contents = std::fs::read_to_string(paths.hook_log_file("sess-1"))?;
    assert_eq!(contents.lines().count(), 5);
    Ok(())
}

#[test]
fn trim_input_elides_large_blobs() {
    let mut raw = Map::new();
    raw.insert("prompt".to_string(), Value::String("short".to_string()));
    raw.insert("transcript".to_string(), Value::String("x".repeat(5000)));
    raw.insert("nested".to_string(), json!({"blob": "y".repeat(5000)}));

    let trimmed = trim_input(&raw);
    assert_eq!(trimmed["prompt"], Value::String("short".to_string()));
    let elided = trimmed["transcript"].as_str().unwrap_or_default();
    assert!(elided.starts_with("(elided:"), "{elided}");
    assert!(trimmed["nested"].as_str().unwrap_or_default().starts_with("(elided:"));
}
