// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess-backed agent adapter.
//!
//! Pipes the composed prompt into the driver command's stdin, appends its
//! stdout/stderr to the session log, and reports exit status through a
//! oneshot. The adapter never parses agent output for payloads; requests
//! arrive over the request channel, not stdout.

use crate::{AgentAdapter, AgentError, AgentExit, AgentSpawnConfig, SpawnedAgent};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Launches real agent subprocesses.
#[derive(Debug, Clone, Default)]
pub struct ProcessAgentAdapter;

impl ProcessAgentAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AgentAdapter for ProcessAgentAdapter {
    async fn spawn(&self, config: AgentSpawnConfig) -> Result<SpawnedAgent, AgentError> {
        if let Some(parent) = config.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AgentError::Log(e.to_string()))?;
        }
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_path)
            .map_err(|e| AgentError::Log(e.to_string()))?;
        let log_err = log
            .try_clone()
            .map_err(|e| AgentError::Log(e.to_string()))?;

        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .current_dir(&config.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        for (key, value) in &config.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| AgentError::SpawnFailed(format!("{}: {e}", config.command)))?;
        let pid = child.id();
        debug!(session = %config.session_id, ?pid, "agent process spawned");

        // Deliver the prompt without blocking the spawner; the agent may
        // not read stdin immediately.
        if let Some(mut stdin) = child.stdin.take() {
            let prompt = config.prompt;
            let session_id = config.session_id.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                    warn!(session = %session_id, error = %e, "failed to write prompt to agent stdin");
                }
                // Dropping stdin closes the pipe, signalling end of prompt.
            });
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(error = %e, "failed to wait on agent process");
                    None
                }
            };
            let _ = exit_tx.send(AgentExit { code });
        });

        Ok(SpawnedAgent { pid, exit: exit_rx })
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
