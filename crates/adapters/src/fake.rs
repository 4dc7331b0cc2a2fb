// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake agent adapter for deterministic testing
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::{AgentAdapter, AgentError, AgentExit, AgentSpawnConfig, SpawnedAgent};
use async_trait::async_trait;
use ken_core::SessionId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Recorded spawn call, prompt included so tests can assert on composer
/// output without a real process.
#[derive(Debug, Clone)]
pub struct SpawnCall {
    pub session_id: SessionId,
    pub prompt: String,
    pub env: Vec<(String, String)>,
}

struct FakeState {
    calls: Vec<SpawnCall>,
    exits: HashMap<SessionId, oneshot::Sender<AgentExit>>,
    spawn_error: Option<String>,
    next_pid: u32,
}

/// Fake agent adapter: records spawns, lets the test decide when and how
/// each "agent" exits.
#[derive(Clone)]
pub struct FakeAgentAdapter {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeAgentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAgentAdapter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                calls: Vec::new(),
                exits: HashMap::new(),
                spawn_error: None,
                next_pid: 1000,
            })),
        }
    }

    /// All recorded spawn calls
    pub fn calls(&self) -> Vec<SpawnCall> {
        self.inner.lock().calls.clone()
    }

    /// Prompt delivered to the most recent spawn for a session
    pub fn last_prompt_for(&self, session_id: &SessionId) -> Option<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .rev()
            .find(|call| &call.session_id == session_id)
            .map(|call| call.prompt.clone())
    }

    /// Resolve the exit waiter for a spawned session
    pub fn exit(&self, session_id: &SessionId, code: Option<i32>) {
        let sender = self.inner.lock().exits.remove(session_id);
        if let Some(sender) = sender {
            let _ = sender.send(AgentExit { code });
        }
    }

    /// Make the next spawn fail with the given message
    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        self.inner.lock().spawn_error = Some(message.into());
    }

    /// Whether a session currently has an unresolved exit waiter
    pub fn is_running(&self, session_id: &SessionId) -> bool {
        self.inner.lock().exits.contains_key(session_id)
    }
}

#[async_trait]
impl AgentAdapter for FakeAgentAdapter {
    async fn spawn(&self, config: AgentSpawnConfig) -> Result<SpawnedAgent, AgentError> {
        let mut inner = self.inner.lock();
        if let Some(message) = inner.spawn_error.take() {
            return Err(AgentError::SpawnFailed(message));
        }
        inner.calls.push(SpawnCall {
            session_id: config.session_id.clone(),
            prompt: config.prompt,
            env: config.env,
        });
        let (exit_tx, exit_rx) = oneshot::channel();
        inner.exits.insert(config.session_id, exit_tx);
        inner.next_pid += 1;
        Ok(SpawnedAgent {
            pid: Some(inner.next_pid),
            exit: exit_rx,
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
