// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gate registry: the ordered set of gate configs for this process.
//!
//! Iteration order defines policy merge order. The production registry is
//! a process-wide singleton initialized once from the built-in set; tests
//! construct their own registries with custom rows.

use std::sync::OnceLock;

use super::builtin::{self, GateModes};
use super::engine::Gate;
use super::GateConfig;

static GLOBAL: OnceLock<GateRegistry> = OnceLock::new();

/// Ordered, immutable set of gate configs.
pub struct GateRegistry {
    configs: Vec<GateConfig>,
}

impl GateRegistry {
    pub fn new(configs: Vec<GateConfig>) -> Self {
        Self { configs }
    }

    /// The built-in gate set under the given modes.
    pub fn builtin(modes: &GateModes) -> Self {
        Self::new(builtin::configs(modes))
    }

    /// Process-wide registry, built on first access. Later calls ignore
    /// `modes` (the process handles exactly one hook invocation).
    pub fn global(modes: &GateModes) -> &'static Self {
        GLOBAL.get_or_init(|| Self::builtin(modes))
    }

    /// Gates in registry (merge) order.
    pub fn gates(&self) -> impl Iterator<Item = Gate<'_>> {
        self.configs.iter().map(Gate::new)
    }

    pub fn get(&self, name: &str) -> Option<&GateConfig> {
        self.configs.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
