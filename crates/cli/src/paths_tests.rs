// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use super::{safe_temp_prefixes, short_hash, utc_date_compact, utc_stamp_compact, Paths};

#[test]
fn short_hash_is_stable_and_eight_chars() {
    let a = short_hash("session-abc");
    let b = short_hash("session-abc");
    assert_eq!(a, b);
    assert_eq!(a.len(), 8);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(short_hash("session-abc"), short_hash("session-abd"));
}

#[test]
fn state_file_name_embeds_date_and_hash() {
    let paths = Paths::at("/state");
    let file = paths.state_file("sess-1");
    let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let date = utc_date_compact();
    assert_eq!(name, format!("{date}-{}.json", short_hash("sess-1")));
    assert!(file.starts_with("/state/sessions"));
}

#[test]
fn companion_files_share_the_session_stem() {
    let paths = Paths::at("/state");
    let state = paths.state_file("sess-1");
    let lock = paths.lock_file("sess-1");
    let log = paths.hook_log_file("sess-1");
    let stem = state.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let stem = stem.trim_end_matches(".json");
    assert_eq!(lock.file_name().and_then(|n| n.to_str()), Some(format!("{stem}.lock").as_str()));
    assert_eq!(
        log.file_name().and_then(|n| n.to_str()),
        Some(format!("{stem}-hooks.jsonl").as_str())
    );
}

#[test]
fn temp_dir_is_session_scoped() {
    let paths = Paths::at("/state");
    let a = paths.temp_dir("sess-1");
    let b = paths.temp_dir("sess-2");
    assert_ne!(a, b);
    assert!(a.starts_with("/state/tmp"));
}

#[test]
fn gate_file_is_deterministic() {
    let paths = Paths::at("/state");
    assert_eq!(paths.gate_file("custodiet", "sess-1"), paths.gate_file("custodiet", "sess-1"));
    assert!(paths
        .gate_file("custodiet", "sess-1")
        .display()
        .to_string()
        .ends_with("custodiet.md"));
}

#[test]
fn resolve_honors_explicit_override() {
    let paths = Paths::resolve(Some(Path::new("/custom/spot")));
    assert_eq!(paths.root(), Path::new("/custom/spot"));
}

#[test]
fn date_and_stamp_formats() {
    let date = utc_date_compact();
    assert_eq!(date.len(), 8);
    assert!(date.chars().all(|c| c.is_ascii_digit()));

    let stamp = utc_stamp_compact();
    assert_eq!(stamp.len(), 15);
    assert_eq!(&stamp[..8], date.as_str());
    assert_eq!(stamp.as_bytes()[8], b'-');
}

#[test]
fn safe_prefixes_include_the_state_temp_tree() {
    let paths = Paths::at("/state");
    let prefixes = safe_temp_prefixes(&paths);
    assert!(prefixes.iter().any(|p| p == Path::new("/state/tmp")));
}
