// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol: one line of UTF-8 JSON per message, newline
//! terminated, over the project's Unix socket.
//!
//! Agent verbs are exactly the four-plus-one of the request contract;
//! the socket additionally accepts operator verbs so the CLI can reach
//! a store whose write lock the daemon holds.

use ken_core::{AgentRequest, AgentResponse, DoneWhen, RequestParseError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

/// Ceiling for a single request line (checkpoints can be large)
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Read/write timeout for one protocol exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line exceeds {MAX_LINE_BYTES} bytes")]
    LineTooLong,
    #[error("timeout")]
    Timeout,
}

/// Verbs the CLI sends on an operator's behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperatorRequest {
    /// Create a root session
    Wake {
        ken_path: String,
        task: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        done_when: Option<DoneWhen>,
    },
    /// Re-queue a failed session (id prefix accepted)
    Recover { id: String },
    /// Fail a stuck session with a synthesised result
    Abandon { id: String, reason: String },
    /// Liveness probe
    Ping,
    /// Stop the daemon loop
    Shutdown,
}

impl OperatorRequest {
    const TYPES: [&'static str; 5] = ["wake", "recover", "abandon", "ping", "shutdown"];
}

/// Anything the socket accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Request {
    Agent(AgentRequest),
    Operator(OperatorRequest),
}

impl Request {
    /// Parse one request line, keeping the agent contract's error
    /// distinctions (malformed vs unknown type).
    pub fn parse(line: &str) -> Result<Self, RequestParseError> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| RequestParseError::Malformed(e.to_string()))?;
        let type_name = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(RequestParseError::MissingType)?;

        if AgentRequest::TYPES.contains(&type_name) {
            let request = serde_json::from_value(value)
                .map_err(|e| RequestParseError::Malformed(e.to_string()))?;
            return Ok(Request::Agent(request));
        }
        if OperatorRequest::TYPES.contains(&type_name) {
            let request = serde_json::from_value(value)
                .map_err(|e| RequestParseError::Malformed(e.to_string()))?;
            return Ok(Request::Operator(request));
        }
        Err(RequestParseError::UnknownType)
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Read one newline-terminated line. `Ok(None)` is a clean EOF.
pub async fn read_line<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Option<String>, ProtocolError> {
    let mut buf = Vec::new();
    let read = tokio::time::timeout(timeout, reader.read_until(b'\n', &mut buf))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    if read == 0 {
        return Ok(None);
    }
    if buf.len() > MAX_LINE_BYTES {
        return Err(ProtocolError::LineTooLong);
    }
    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
    Ok(Some(line))
}

/// Write one response line.
pub async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &AgentResponse,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    // A response that cannot serialize is unrepresentable; the envelope
    // is plain data.
    let mut line = serde_json::to_vec(response).unwrap_or_else(|_| b"{\"ok\":false}".to_vec());
    line.push(b'\n');
    tokio::time::timeout(timeout, async {
        writer.write_all(&line).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| ProtocolError::Timeout)??;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
