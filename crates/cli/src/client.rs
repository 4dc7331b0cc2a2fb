// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket client: forwards request lines to a running engine.

use ken_core::AgentResponse;
use ken_daemon::ProjectPaths;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no engine socket at the expected path")]
    NoSocket,
    #[error("IO error talking to the engine: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine closed the connection without responding")]
    ClosedEarly,
    #[error("unparseable response from the engine: {0}")]
    BadResponse(String),
}

/// Whether a request socket exists for the project.
pub fn socket_exists(paths: &ProjectPaths) -> bool {
    paths.socket().exists()
}

/// Send one request line over the socket and read the response line.
pub async fn send(paths: &ProjectPaths, line: &str) -> Result<AgentResponse, ClientError> {
    let socket_path = paths.socket();
    if !socket_path.exists() {
        return Err(ClientError::NoSocket);
    }

    let stream = UnixStream::connect(&socket_path)
        .await
        .map_err(|_| ClientError::NoSocket)?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    let mut response_line = String::new();
    let read = reader.read_line(&mut response_line).await?;
    if read == 0 {
        return Err(ClientError::ClosedEarly);
    }
    serde_json::from_str(response_line.trim_end())
        .map_err(|e| ClientError::BadResponse(e.to_string()))
}
