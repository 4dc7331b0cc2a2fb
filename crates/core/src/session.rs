// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session record and the session state machine

use crate::id::SessionId;
use crate::trigger::Trigger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a session through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Waking,
    Active,
    Sleeping,
    Complete,
    Failed,
}

impl SessionStatus {
    /// Complete and failed sessions never transition again (operator
    /// `recover` is the one documented exception).
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Failed)
    }

    /// Edges of the session state machine.
    ///
    /// Any non-terminal status may fail (unexpected agent exit, operator
    /// abandon). Waking may revert to pending when the engine restarts
    /// mid-wake. Failed-to-pending is handled separately as the operator
    /// recover path and is deliberately absent here.
    pub fn can_transition(self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, to) {
            (Pending, Waking) => true,
            (Waking, Active) => true,
            (Active, Sleeping | Complete) => true,
            (Sleeping, Pending) => true,
            (Waking, Pending) => true,
            (Pending | Waking | Active | Sleeping, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Waking => "waking",
            SessionStatus::Active => "active",
            SessionStatus::Sleeping => "sleeping",
            SessionStatus::Complete => "complete",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Whether a wake delivers a first-run prompt or a reconstruction prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeMode {
    Fresh,
    Recover,
}

impl std::fmt::Display for WakeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WakeMode::Fresh => write!(f, "fresh"),
            WakeMode::Recover => write!(f, "recover"),
        }
    }
}

/// Completion criteria delivered verbatim to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneWhen {
    pub description: String,
    #[serde(default)]
    pub criteria: Vec<String>,
    /// Optional verification command the agent runs before completing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<String>,
}

/// Errors from kenning-path validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KenPathError {
    #[error("ken path is empty")]
    Empty,
    #[error("invalid ken path segment: {0:?}")]
    BadSegment(String),
}

/// Slash-delimited kenning identifier: lowercase alphanumeric-or-dash segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KenPath(String);

impl KenPath {
    pub fn new(path: impl Into<String>) -> Result<Self, KenPathError> {
        let path = path.into();
        if path.is_empty() {
            return Err(KenPathError::Empty);
        }
        for segment in path.split('/') {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
            if !valid {
                return Err(KenPathError::BadSegment(segment.to_string()));
            }
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl std::fmt::Display for KenPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for KenPath {
    type Err = KenPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for KenPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        KenPath::new(s).map_err(serde::de::Error::custom)
    }
}

/// One instance of work on one kenning with one task.
///
/// The engine owns `status`, `trigger`, and the timestamps; `checkpoint`
/// and `result` are agent-authored and opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub ken_path: KenPath,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_when: Option<DoneWhen>,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SessionId>,
    /// Present iff status is sleeping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
    /// Present iff status is complete or failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Ids captured from a dependency trigger when it fired, feeding the
    /// Dependency-Results block of the next composed prompt. Cleared on
    /// the next sleep and on terminal transitions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wake_deps: Vec<SessionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether the next wake is a first run or a reconstruction.
    pub fn wake_mode(&self) -> WakeMode {
        if self.checkpoint.is_some() {
            WakeMode::Recover
        } else {
            WakeMode::Fresh
        }
    }

    /// Seconds since the last update (zero when the clock ran backwards).
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.updated_at).num_seconds().max(0) as u64
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
