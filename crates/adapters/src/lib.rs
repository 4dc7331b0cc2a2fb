// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Agent driver adapters.
//!
//! The engine treats the agent driver as a black box: give it a composed
//! prompt and a working directory, get back a process whose exit status
//! it can observe. Everything else about what the agent is and how it thinks
//! lives behind the [`AgentAdapter`] trait.

mod process;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeAgentAdapter, SpawnCall};

pub use process::ProcessAgentAdapter;

use async_trait::async_trait;
use ken_core::SessionId;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("agent log unavailable: {0}")]
    Log(String),
}

/// Everything needed to launch one agent process.
#[derive(Debug, Clone)]
pub struct AgentSpawnConfig {
    pub session_id: SessionId,
    /// Composed wake prompt, delivered on the agent's stdin
    pub prompt: String,
    /// Driver command and arguments from engine config
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment (KEN_SESSION_ID, KEN_SOCKET, ...)
    pub env: Vec<(String, String)>,
    /// Working directory: the project root
    pub cwd: PathBuf,
    /// Where the agent's stdout/stderr are appended
    pub log_path: PathBuf,
}

/// Exit status of an agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentExit {
    /// Process exit code; None when killed by a signal
    pub code: Option<i32>,
}

impl AgentExit {
    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {code}"),
            None => "killed by signal".to_string(),
        }
    }
}

/// A launched agent: its pid and a waiter that resolves on exit.
pub struct SpawnedAgent {
    pub pid: Option<u32>,
    pub exit: oneshot::Receiver<AgentExit>,
}

/// Adapter that turns a spawn config into a live agent process.
#[async_trait]
pub trait AgentAdapter: Clone + Send + Sync + 'static {
    async fn spawn(&self, config: AgentSpawnConfig) -> Result<SpawnedAgent, AgentError>;
}
