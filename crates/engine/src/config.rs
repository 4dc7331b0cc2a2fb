// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration, read from `.ken/config.toml`.
//!
//! Every field has a default; a missing file is a valid (default)
//! configuration so `ken process` works right after `ken init`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Concurrency budget: active + waking sessions at once
    pub max_active: usize,
    /// Scheduler tick interval in milliseconds
    pub tick_interval_ms: u64,
    pub agent: AgentConfig,
    pub diagnose: DiagnoseConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_active: 4,
            tick_interval_ms: 500,
            agent: AgentConfig::default(),
            diagnose: DiagnoseConfig::default(),
        }
    }
}

/// How to launch the agent driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "ken-agent".to_string(),
            args: Vec::new(),
        }
    }
}

/// Thresholds for the diagnose ruleset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnoseConfig {
    /// Active this long without a heartbeat counts as stalled
    pub stalled_active_secs: u64,
    /// Pending this long counts as starved
    pub stale_pending_secs: u64,
}

impl Default for DiagnoseConfig {
    fn default() -> Self {
        Self {
            stalled_active_secs: 900,
            stale_pending_secs: 3600,
        }
    }
}

impl EngineConfig {
    /// Load from a toml file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Starter config written by `ken init`.
    pub fn default_toml() -> &'static str {
        r#"# ken engine configuration

# How many sessions may be waking or active at once.
max_active = 4

# Scheduler tick interval in milliseconds.
tick_interval_ms = 500

[agent]
# The agent driver: receives the composed prompt on stdin and talks back
# over the socket named in KEN_SOCKET.
command = "ken-agent"
args = []

[diagnose]
# Active sessions silent for this long are flagged as stalled.
stalled_active_secs = 900
# Pending sessions older than this are flagged as starved.
stale_pending_secs = 3600
"#
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
