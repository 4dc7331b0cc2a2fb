// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state derived from WAL replay.
//!
//! Events are facts about what happened; sessions are derived by applying
//! them in commit order. Replay is deterministic: timestamps and ids are
//! carried in the events, never re-read from the clock.

use ken_core::{Event, Session, SessionId, SessionStatus, Trigger};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// An applied event with its monotonic audit id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: u64,
    pub event: Event,
}

/// Sessions and the audit log, built from events.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub sessions: HashMap<String, Session>,
    pub events: Vec<StoredEvent>,
    /// Highest audit id assigned so far; ids are dense and strictly increasing
    #[serde(default)]
    pub last_event_id: u64,
}

impl MaterializedState {
    /// Get a session by exact id or unique prefix (like git commit hashes).
    pub fn get_session(&self, id: &str) -> Option<&Session> {
        if let Some(session) = self.sessions.get(id) {
            return Some(session);
        }

        let mut matches = self.sessions.iter().filter(|(k, _)| k.starts_with(id));
        match (matches.next(), matches.next()) {
            (Some((_, session)), None) => Some(session),
            _ => None,
        }
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id.as_str())
    }

    pub fn status_of(&self, id: &SessionId) -> Option<SessionStatus> {
        self.session(id).map(|s| s.status)
    }

    /// Sessions currently holding a concurrency slot.
    pub fn in_flight(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| matches!(s.status, SessionStatus::Waking | SessionStatus::Active))
            .count()
    }

    pub fn with_status(&self, status: SessionStatus) -> Vec<&Session> {
        self.sessions
            .values()
            .filter(|s| s.status == status)
            .collect()
    }

    pub fn children_of(&self, id: &SessionId) -> Vec<&Session> {
        let mut children: Vec<&Session> = self
            .sessions
            .values()
            .filter(|s| s.parent_id.as_ref() == Some(id))
            .collect();
        children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        children
    }

    pub fn roots(&self) -> Vec<&Session> {
        let mut roots: Vec<&Session> = self
            .sessions
            .values()
            .filter(|s| s.parent_id.is_none())
            .collect();
        roots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        roots
    }

    /// Parent-chain length; the walk is cycle-guarded so a corrupted
    /// store cannot hang the scheduler.
    pub fn depth(&self, id: &SessionId) -> usize {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut depth = 0;
        let mut cursor = self.sessions.get(id.as_str());
        while let Some(session) = cursor {
            if !seen.insert(session.id.as_str()) {
                break;
            }
            match &session.parent_id {
                Some(parent) => {
                    depth += 1;
                    cursor = self.sessions.get(parent.as_str());
                }
                None => break,
            }
        }
        depth
    }

    /// Audit records for one session, in order.
    pub fn events_for(&self, id: &SessionId) -> Vec<&StoredEvent> {
        self.events
            .iter()
            .filter(|e| e.event.session_id() == Some(id))
            .collect()
    }

    /// Apply an event: mutate the affected session and append the audit
    /// record. Callers validate before applying; replay trusts the WAL.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::SessionCreated {
                id,
                ken_path,
                task,
                done_when,
                parent_id,
                at,
            } => {
                self.sessions.insert(
                    id.as_str().to_string(),
                    Session {
                        id: id.clone(),
                        ken_path: ken_path.clone(),
                        task: task.clone(),
                        done_when: done_when.clone(),
                        status: SessionStatus::Pending,
                        parent_id: parent_id.clone(),
                        trigger: None,
                        checkpoint: None,
                        result: None,
                        wake_deps: Vec::new(),
                        created_at: *at,
                        updated_at: *at,
                        last_heartbeat: None,
                    },
                );
            }

            Event::Wake { id, at, .. } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.status = SessionStatus::Waking;
                    session.updated_at = *at;
                }
            }

            Event::AgentSpawned { id, at, .. } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.status = SessionStatus::Active;
                    session.updated_at = *at;
                    session.last_heartbeat = Some(*at);
                }
            }

            Event::Checkpoint { id, checkpoint, at } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.checkpoint = Some(checkpoint.clone());
                    session.updated_at = *at;
                    session.last_heartbeat = Some(*at);
                }
            }

            Event::Spawn { id, at, .. } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.last_heartbeat = Some(*at);
                }
            }

            Event::Sleep {
                id,
                trigger,
                checkpoint,
                at,
            } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.status = SessionStatus::Sleeping;
                    session.trigger = Some(trigger.clone());
                    if let Some(checkpoint) = checkpoint {
                        session.checkpoint = Some(checkpoint.clone());
                    }
                    session.wake_deps.clear();
                    session.updated_at = *at;
                    session.last_heartbeat = Some(*at);
                }
            }

            Event::Complete { id, result, at } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.status = SessionStatus::Complete;
                    session.result = Some(result.clone());
                    session.trigger = None;
                    session.wake_deps.clear();
                    session.updated_at = *at;
                    session.last_heartbeat = Some(*at);
                }
            }

            Event::Failed { id, reason, at } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.status = SessionStatus::Failed;
                    session.result = Some(reason.clone());
                    session.trigger = None;
                    session.wake_deps.clear();
                    session.updated_at = *at;
                }
            }

            Event::TriggerSatisfied { id, at } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    // Capture dependency ids before the trigger is cleared
                    // so the next composed prompt can report their results.
                    session.wake_deps = session
                        .trigger
                        .as_ref()
                        .map(dependency_ids)
                        .unwrap_or_default();
                    session.status = SessionStatus::Pending;
                    session.trigger = None;
                    session.updated_at = *at;
                }
            }

            Event::Recover { id, at, .. } => {
                if let Some(session) = self.sessions.get_mut(id.as_str()) {
                    session.status = SessionStatus::Pending;
                    session.result = None;
                    session.trigger = None;
                    session.updated_at = *at;
                }
            }

            Event::Warning { .. } => {}
        }

        self.last_event_id += 1;
        self.events.push(StoredEvent {
            id: self.last_event_id,
            event: event.clone(),
        });
    }

    /// Referential-integrity and invariant warnings over the whole store.
    ///
    /// Shared by `diagnose` and the startup integrity check.
    pub fn integrity_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut ordered: Vec<&Session> = self.sessions.values().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        for session in ordered {
            let id = session.id.short(8);

            if let Some(parent) = &session.parent_id {
                if !self.sessions.contains_key(parent.as_str()) {
                    warnings.push(format!(
                        "session {id} names missing parent {}",
                        parent.short(8)
                    ));
                }
            }

            if self.parent_chain_has_cycle(&session.id) {
                warnings.push(format!("session {id} sits on a parent cycle"));
            }

            match (&session.trigger, session.status) {
                (Some(_), SessionStatus::Sleeping) | (None, _) => {}
                (Some(_), status) => {
                    warnings.push(format!("session {id} is {status} but carries a trigger"));
                }
            }
            if session.status == SessionStatus::Sleeping && session.trigger.is_none() {
                warnings.push(format!("session {id} is sleeping without a trigger"));
            }

            if session.status.is_terminal() && session.result.is_none() {
                warnings.push(format!(
                    "session {id} is {} without a result",
                    session.status
                ));
            }
            if !session.status.is_terminal() && session.result.is_some() {
                warnings.push(format!(
                    "session {id} is {} but carries a result",
                    session.status
                ));
            }

            if let Some(trigger) = &session.trigger {
                for referenced in trigger.referenced_ids() {
                    if !self.sessions.contains_key(referenced.as_str()) {
                        warnings.push(format!(
                            "session {id} trigger references missing session {}",
                            referenced.short(8)
                        ));
                    }
                }
            }
        }

        warnings
    }

    fn parent_chain_has_cycle(&self, id: &SessionId) -> bool {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cursor = self.sessions.get(id.as_str());
        while let Some(session) = cursor {
            if !seen.insert(session.id.as_str()) {
                return true;
            }
            cursor = session
                .parent_id
                .as_ref()
                .and_then(|p| self.sessions.get(p.as_str()));
        }
        false
    }
}

/// Ids a dependency trigger waits on (timeouts contribute none).
fn dependency_ids(trigger: &Trigger) -> Vec<SessionId> {
    trigger.referenced_ids().into_iter().cloned().collect()
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
