// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload normalization.
//!
//! Runtimes disagree on event names, field spellings, and whether nested
//! objects arrive as JSON strings. All of that variance is resolved here;
//! the rest of the system sees only [`HookContext`].

use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::config::ClientKind;
use crate::event::{HookContext, HookEvent};
use crate::paths::{self, Paths};

/// Auxiliary (gemini) runtime event names mapped onto the canonical set.
/// Canonical names pass through untouched, so the map applies to every
/// client.
const EVENT_MAP: &[(&str, &str)] = &[
    ("BeforeTool", "PreToolUse"),
    ("AfterTool", "PostToolUse"),
    ("BeforeAgent", "UserPromptSubmit"),
];

/// Payload fields consumed by normalization; everything else stays in
/// `raw_input`.
const PROCESSED_FIELDS: &[&str] = &[
    "hook_event_name",
    "session_id",
    "transcript_path",
    "trace_id",
    "tool_name",
    "tool_input",
    "tool_result",
    "toolResult",
    "tool_response",
    "subagent_result",
    "agent_id",
    "agentId",
    "slug",
    "cwd",
    "is_sidechain",
    "isSidechain",
    "subagent_type",
    "agent_type",
];

pub struct Normalizer<'a> {
    paths: &'a Paths,
    client: ClientKind,
    /// Authoritative sub-agent type override (environment).
    subagent_type_override: Option<String>,
}

/// Last-known session identity for hook processes that arrive without a
/// session id, keyed by parent-process id.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
struct PidMapEntry {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    subagent_type: Option<String>,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        paths: &'a Paths,
        client: ClientKind,
        subagent_type_override: Option<String>,
    ) -> Self {
        Self { paths, client, subagent_type_override }
    }

    /// Build the canonical context from a raw payload and the optional CLI
    /// event-name argument (which overrides any name in the payload).
    pub fn normalize(&self, mut raw: Map<String, Value>, event_arg: Option<&str>) -> HookContext {
        let event_name = event_arg
            .map(str::to_string)
            .or_else(|| raw.get("hook_event_name").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default();
        let hook_event = HookEvent::from_wire(map_event_name(&event_name));

        let pid_entry = self.read_pid_entry();

        let session_id = raw
            .get("session_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| pid_entry.session_id.clone())
            .unwrap_or_else(|| self.synthesize_session_id(&hook_event));

        let agent_id = raw
            .get("agent_id")
            .or_else(|| raw.get("agentId"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| pid_entry.agent_id.clone());

        let trace_id = raw
            .get("trace_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let tool_name = raw.get("tool_name").and_then(Value::as_str).map(str::to_string);

        let tool_input = match raw.get("tool_input").map(|v| parse_json_field(v.clone())) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let tool_output = ["tool_result", "toolResult", "tool_response", "subagent_result"]
            .iter()
            .find_map(|key| raw.get(*key))
            .map(|v| parse_json_field(v.clone()))
            .unwrap_or(Value::Null);

        // Sub-agent type: the env override is authoritative, then payload
        // fields, then the pid map, then spawn-tool metadata.
        let mut from_skill_tool = false;
        let mut subagent_type = self.subagent_type_override.clone().or_else(|| {
            raw.get("subagent_type")
                .or_else(|| raw.get("agent_type"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| pid_entry.subagent_type.clone())
        });
        if subagent_type.is_none() {
            if let Some(tool) = &tool_name {
                if crate::gate::tools::SPAWN_TOOLS.contains(&tool.as_str()) {
                    if let Some(target) = crate::gate::tools::spawn_target(&tool_input) {
                        subagent_type = Some(target.to_string());
                        // Skill invocations run in the main agent's
                        // session; they must not flip is_subagent below.
                        from_skill_tool = matches!(tool.as_str(), "Skill" | "activate_skill");
                    }
                }
            }
        }

        let sidechain = raw
            .get("is_sidechain")
            .or_else(|| raw.get("isSidechain"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let mut is_subagent = sidechain;
        if !is_subagent && !from_skill_tool && (subagent_type.is_some() || agent_id.is_some()) {
            is_subagent = true;
        }
        // SubagentStart/SubagentStop fire in the parent's stream ABOUT the
        // sub-agent; the metadata they carry must not classify them as
        // sub-agent events.
        if matches!(hook_event, HookEvent::SubagentStart | HookEvent::SubagentStop) {
            is_subagent = false;
        }

        let transcript_path =
            raw.get("transcript_path").and_then(Value::as_str).map(str::to_string);
        let cwd = raw.get("cwd").and_then(Value::as_str).map(str::to_string);
        let slug = raw.get("slug").and_then(Value::as_str).map(str::to_string);

        if hook_event == HookEvent::SessionStart {
            self.persist_pid_entry(&PidMapEntry {
                session_id: Some(session_id.clone()),
                agent_id: agent_id.clone(),
                subagent_type: subagent_type.clone(),
            });
        }

        for field in PROCESSED_FIELDS {
            raw.remove(*field);
        }

        HookContext {
            session_short_hash: paths::short_hash(&session_id),
            session_id,
            trace_id,
            hook_event,
            agent_id,
            slug,
            is_subagent,
            subagent_type,
            tool_name,
            tool_input,
            tool_output,
            transcript_path,
            cwd,
            raw_input: raw,
        }
    }

    fn synthesize_session_id(&self, event: &HookEvent) -> String {
        let uuid = Uuid::new_v4().to_string();
        let rand8 = &uuid[..8];
        if *event == HookEvent::SessionStart {
            format!("{}-{}-{rand8}", self.client, paths::utc_stamp_compact())
        } else {
            format!("unknown-{rand8}")
        }
    }

    fn read_pid_entry(&self) -> PidMapEntry {
        let path = self.paths.pid_map_file();
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return PidMapEntry::default();
        };
        let Ok(map) = serde_json::from_str::<Map<String, Value>>(&raw) else {
            return PidMapEntry::default();
        };
        let ppid = std::os::unix::process::parent_id().to_string();
        map.get(&ppid)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Merge this process's entry into the pid map, atomically.
    fn persist_pid_entry(&self, entry: &PidMapEntry) {
        let path = self.paths.pid_map_file();
        let Some(parent) = path.parent() else {
            return;
        };
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("cannot create state dir {}: {e}", parent.display());
            return;
        }
        let mut map = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<Map<String, Value>>(&raw).ok())
            .unwrap_or_default();
        let ppid = std::os::unix::process::parent_id().to_string();
        match serde_json::to_value(entry) {
            Ok(value) => {
                map.insert(ppid, value);
            }
            Err(_) => return,
        }
        let result = tempfile::NamedTempFile::new_in(parent).and_then(|mut tmp| {
            std::io::Write::write_all(&mut tmp, Value::Object(map).to_string().as_bytes())?;
            tmp.persist(&path)?;
            Ok(())
        });
        if let Err(e) = result {
            warn!("failed to persist pid map: {e}");
        }
    }
}

/// Map an auxiliary runtime event name to its canonical form.
fn map_event_name(name: &str) -> &str {
    EVENT_MAP
        .iter()
        .find(|(from, _)| *from == name)
        .map(|(_, to)| *to)
        .unwrap_or(name)
}

/// Parse a field that may carry JSON as a string. Unparsable strings pass
/// through unchanged.
pub fn parse_json_field(value: Value) -> Value {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
            _ => Value::String(s),
        },
        other => other,
    }
}

/// Rebuild a runtime payload from a canonical context (tests and the
/// normalization round-trip law).
pub fn denormalize(ctx: &HookContext) -> Map<String, Value> {
    let mut raw = ctx.raw_input.clone();
    raw.insert("hook_event_name".into(), Value::String(ctx.hook_event.as_str().to_string()));
    raw.insert("session_id".into(), Value::String(ctx.session_id.clone()));
    raw.insert("trace_id".into(), Value::String(ctx.trace_id.clone()));
    if let Some(tool) = &ctx.tool_name {
        raw.insert("tool_name".into(), Value::String(tool.clone()));
    }
    if !ctx.tool_input.is_empty() {
        raw.insert("tool_input".into(), Value::Object(ctx.tool_input.clone()));
    }
    if ctx.tool_output != Value::Null {
        raw.insert("tool_result".into(), ctx.tool_output.clone());
    }
    if let Some(path) = &ctx.transcript_path {
        raw.insert("transcript_path".into(), Value::String(path.clone()));
    }
    if let Some(cwd) = &ctx.cwd {
        raw.insert("cwd".into(), Value::String(cwd.clone()));
    }
    if let Some(agent_id) = &ctx.agent_id {
        raw.insert("agent_id".into(), Value::String(agent_id.clone()));
    }
    if let Some(slug) = &ctx.slug {
        raw.insert("slug".into(), Value::String(slug.clone()));
    }
    if let Some(subagent_type) = &ctx.subagent_type {
        raw.insert("subagent_type".into(), Value::String(subagent_type.clone()));
    }
    if ctx.is_subagent {
        raw.insert("is_sidechain".into(), Value::Bool(true));
    }
    raw
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
