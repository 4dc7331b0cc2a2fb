// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit events for the ken engine.
//!
//! Events are the unit of durability: a store transaction commits a batch
//! of them as one WAL line, and the materialized state is derived by
//! applying them in order. Every state change has exactly one event.

use crate::id::SessionId;
use crate::session::{DoneWhen, KenPath, WakeMode};
use crate::trigger::Trigger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a recover transition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoverSource {
    /// An operator re-queued a failed session from its last checkpoint.
    Operator,
    /// Engine restart found the session mid-wake with no live agent.
    Startup,
}

/// Events that drive state transitions.
///
/// Serializes with `{"kind": "...", ...fields}`; the kind strings are the
/// audit vocabulary surfaced by `ken log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A session came into existence (root wake or spawn_and_sleep child)
    SessionCreated {
        id: SessionId,
        ken_path: KenPath,
        task: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        done_when: Option<DoneWhen>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<SessionId>,
        at: DateTime<Utc>,
    },

    /// The scheduler picked a pending session
    Wake {
        id: SessionId,
        mode: WakeMode,
        at: DateTime<Utc>,
    },

    /// An agent process launched for a waking session
    AgentSpawned {
        id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
        mode: WakeMode,
        at: DateTime<Utc>,
    },

    /// The agent saved a state snapshot while staying active
    Checkpoint {
        id: SessionId,
        checkpoint: String,
        at: DateTime<Utc>,
    },

    /// A parent minted children inside spawn_and_sleep
    Spawn {
        id: SessionId,
        children: Vec<SessionId>,
        at: DateTime<Utc>,
    },

    /// The agent went to sleep behind a trigger
    Sleep {
        id: SessionId,
        trigger: Trigger,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checkpoint: Option<String>,
        at: DateTime<Utc>,
    },

    /// Terminal success
    Complete {
        id: SessionId,
        result: String,
        at: DateTime<Utc>,
    },

    /// Terminal failure (agent fail request, crash, or operator abandon)
    Failed {
        id: SessionId,
        reason: String,
        at: DateTime<Utc>,
    },

    /// A sleeping session's trigger fired
    TriggerSatisfied { id: SessionId, at: DateTime<Utc> },

    /// A failed or orphaned session was re-queued
    Recover {
        id: SessionId,
        source: RecoverSource,
        at: DateTime<Utc>,
    },

    /// Non-fatal condition worth keeping in the audit log
    Warning {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<SessionId>,
        message: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SessionCreated { .. } => "session_created",
            Event::Wake { .. } => "wake",
            Event::AgentSpawned { .. } => "agent_spawned",
            Event::Checkpoint { .. } => "checkpoint",
            Event::Spawn { .. } => "spawn",
            Event::Sleep { .. } => "sleep",
            Event::Complete { .. } => "complete",
            Event::Failed { .. } => "failed",
            Event::TriggerSatisfied { .. } => "trigger_satisfied",
            Event::Recover { .. } => "recover",
            Event::Warning { .. } => "warning",
        }
    }

    /// Session the event belongs to, if any (warnings may be global).
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Event::SessionCreated { id, .. }
            | Event::Wake { id, .. }
            | Event::AgentSpawned { id, .. }
            | Event::Checkpoint { id, .. }
            | Event::Spawn { id, .. }
            | Event::Sleep { id, .. }
            | Event::Complete { id, .. }
            | Event::Failed { id, .. }
            | Event::TriggerSatisfied { id, .. }
            | Event::Recover { id, .. } => Some(id),
            Event::Warning { id, .. } => id.as_ref(),
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::SessionCreated { at, .. }
            | Event::Wake { at, .. }
            | Event::AgentSpawned { at, .. }
            | Event::Checkpoint { at, .. }
            | Event::Spawn { at, .. }
            | Event::Sleep { at, .. }
            | Event::Complete { at, .. }
            | Event::Failed { at, .. }
            | Event::TriggerSatisfied { at, .. }
            | Event::Recover { at, .. }
            | Event::Warning { at, .. } => *at,
        }
    }

    pub fn log_summary(&self) -> String {
        let kind = self.kind();
        match self {
            Event::SessionCreated {
                id,
                ken_path,
                parent_id,
                ..
            } => match parent_id {
                Some(parent) => format!(
                    "{kind} id={} ken={ken_path} parent={}",
                    id.short(8),
                    parent.short(8)
                ),
                None => format!("{kind} id={} ken={ken_path}", id.short(8)),
            },
            Event::Wake { id, mode, .. } => format!("{kind} id={} mode={mode}", id.short(8)),
            Event::AgentSpawned { id, pid, mode, .. } => match pid {
                Some(pid) => format!("{kind} id={} pid={pid} mode={mode}", id.short(8)),
                None => format!("{kind} id={} mode={mode}", id.short(8)),
            },
            Event::Checkpoint { id, checkpoint, .. } => {
                format!("{kind} id={} bytes={}", id.short(8), checkpoint.len())
            }
            Event::Spawn { id, children, .. } => {
                format!("{kind} id={} children={}", id.short(8), children.len())
            }
            Event::Sleep { id, trigger, .. } => {
                format!("{kind} id={} trigger={}", id.short(8), trigger.summary())
            }
            Event::Complete { id, .. } => format!("{kind} id={}", id.short(8)),
            Event::Failed { id, reason, .. } => {
                format!("{kind} id={} reason={reason}", id.short(8))
            }
            Event::TriggerSatisfied { id, .. } => format!("{kind} id={}", id.short(8)),
            Event::Recover { id, source, .. } => {
                format!("{kind} id={} source={source:?}", id.short(8))
            }
            Event::Warning { id, message, .. } => match id {
                Some(id) => format!("{kind} id={} {message}", id.short(8)),
                None => format!("{kind} {message}"),
            },
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
