// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Read;

use clap::Parser;
use serde_json::{Map, Value};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use warden::config::Config;
use warden::gate::registry::GateRegistry;
use warden::reply;
use warden::router::Router;

/// Initialize tracing to stderr; stdout carries only the JSON reply.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let result = match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().try_init()
        }
        _ => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init(),
    };
    drop(result);
}

/// Read one JSON object from stdin. Malformed or empty input yields an
/// empty payload: the reply is `{}` and the agent continues.
fn read_stdin_payload() -> Map<String, Value> {
    let mut buffer = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut buffer) {
        warn!("failed to read stdin: {e}");
        return Map::new();
    }
    if buffer.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(&buffer) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!("stdin was not a JSON object; replying with empty object");
            Map::new()
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::parse();
    init_tracing(&config);

    let raw = read_stdin_payload();
    if raw.is_empty() && config.event.is_none() {
        // Nothing to route. Reply empty and let the agent continue.
        println!("{{}}");
        return;
    }

    let registry = GateRegistry::global(&config.gate_modes());
    let router = Router::new(&config, registry);
    let (ctx, canonical) = router.handle(raw).await;

    let output = reply::encode(config.client, &ctx.hook_event, &canonical);
    println!("{output}");
}
