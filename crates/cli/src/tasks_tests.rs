// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::unix::fs::PermissionsExt;

use super::work_state;

fn write_script(dir: &std::path::Path, body: &str) -> String {
    let path = dir.join("task-cli.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path.display().to_string()
}

#[tokio::test]
async fn unconfigured_cli_yields_empty_snapshot() {
    assert_eq!(work_state(None).await, "");
}

#[tokio::test]
async fn missing_binary_degrades_silently() {
    assert_eq!(work_state(Some("/no/such/task-cli")).await, "");
}

#[tokio::test]
async fn failing_cli_degrades_silently() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cli = write_script(dir.path(), "exit 3");
    assert_eq!(work_state(Some(&cli)).await, "");
}

#[tokio::test]
async fn snapshot_sections_follow_list_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    // Echo the status argument back so both list calls produce output.
    let cli = write_script(dir.path(), r#"echo "tasks for $2""#);
    let snapshot = work_state(Some(&cli)).await;
    assert!(snapshot.contains("### Active Tasks"), "{snapshot}");
    assert!(snapshot.contains("### Incoming Tasks (inbox)"), "{snapshot}");
    assert!(snapshot.contains("--status=active"), "{snapshot}");
    assert!(snapshot.contains("--status=inbox"), "{snapshot}");
}

#[tokio::test]
async fn multi_word_cli_commands_are_split() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = write_script(dir.path(), r#"echo "ran $1""#);
    let snapshot = work_state(Some(&format!("sh {script}"))).await;
    assert!(snapshot.contains("ran list"), "{snapshot}");
}
