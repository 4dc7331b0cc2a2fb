// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The request/response protocol through which agents mutate state.
//!
//! Each message is one line of UTF-8 JSON. Agents must emit exactly one
//! terminal request (complete, fail, sleep, or spawn_and_sleep) before
//! exiting; checkpoint is the only non-terminal verb.

use crate::id::SessionId;
use crate::session::DoneWhen;
use crate::trigger::TriggerSpec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A child to mint inside spawn_and_sleep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSpec {
    /// Kenning for the child; validated against the ken-path grammar
    /// when the request executes.
    #[serde(alias = "ken")]
    pub ken_path: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_when: Option<DoneWhen>,
}

/// The verbs agents may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentRequest {
    Complete {
        session_id: SessionId,
        result: String,
    },
    Fail {
        session_id: SessionId,
        reason: String,
    },
    Sleep {
        session_id: SessionId,
        trigger: TriggerSpec,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checkpoint: Option<String>,
    },
    SpawnAndSleep {
        session_id: SessionId,
        children: Vec<ChildSpec>,
        trigger: TriggerSpec,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checkpoint: Option<String>,
    },
    Checkpoint {
        session_id: SessionId,
        checkpoint: String,
    },
}

impl AgentRequest {
    /// Wire names of every recognised verb.
    pub const TYPES: [&'static str; 5] =
        ["complete", "fail", "sleep", "spawn_and_sleep", "checkpoint"];

    pub fn type_name(&self) -> &'static str {
        match self {
            AgentRequest::Complete { .. } => "complete",
            AgentRequest::Fail { .. } => "fail",
            AgentRequest::Sleep { .. } => "sleep",
            AgentRequest::SpawnAndSleep { .. } => "spawn_and_sleep",
            AgentRequest::Checkpoint { .. } => "checkpoint",
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            AgentRequest::Complete { session_id, .. }
            | AgentRequest::Fail { session_id, .. }
            | AgentRequest::Sleep { session_id, .. }
            | AgentRequest::SpawnAndSleep { session_id, .. }
            | AgentRequest::Checkpoint { session_id, .. } => session_id,
        }
    }

    /// Parse one request line, distinguishing malformed JSON from an
    /// unrecognised type so the two produce different error responses.
    pub fn parse(line: &str) -> Result<Self, RequestParseError> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| RequestParseError::Malformed(e.to_string()))?;
        let type_name = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(RequestParseError::MissingType)?;
        if !Self::TYPES.contains(&type_name) {
            return Err(RequestParseError::UnknownType);
        }
        serde_json::from_value(value).map_err(|e| RequestParseError::Malformed(e.to_string()))
    }
}

/// Errors from parsing a request line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestParseError {
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("request has no type field")]
    MissingType,
    #[error("unknown request type")]
    UnknownType,
}

/// Response envelope: `{"ok":true,"data"?:{}}` or `{"ok":false,"error":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            data: None,
            error: None,
        }
    }

    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
