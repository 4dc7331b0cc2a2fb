// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative wake conditions and their pure evaluator

use crate::id::SessionId;
use crate::session::SessionStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder agents may use in a `spawn_and_sleep` trigger; the engine
/// substitutes the freshly minted child ids.
pub const CHILDREN_SENTINEL: &str = "__CHILDREN__";

/// Stored wake condition for a sleeping session.
///
/// Serializes externally tagged, so the wire shape is
/// `{"all_complete":[ids]}`, `{"timeout_at":"<RFC3339>"}`, `{"any":[...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when every referenced session is terminal. Failed children
    /// satisfy it so parents can react instead of hanging forever.
    AllComplete(Vec<SessionId>),
    /// Fires when at least one referenced session completed. Failed alone
    /// never satisfies it.
    AnyComplete(Vec<SessionId>),
    /// Fires when the wall clock reaches the instant.
    TimeoutAt(DateTime<Utc>),
    /// Fires when any sub-trigger fires.
    #[serde(rename = "any")]
    AnyOf(Vec<Trigger>),
}

impl Trigger {
    /// All session ids referenced anywhere in the trigger tree.
    pub fn referenced_ids(&self) -> Vec<&SessionId> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids<'a>(&'a self, into: &mut Vec<&'a SessionId>) {
        match self {
            Trigger::AllComplete(ids) | Trigger::AnyComplete(ids) => into.extend(ids.iter()),
            Trigger::TimeoutAt(_) => {}
            Trigger::AnyOf(subs) => {
                for sub in subs {
                    sub.collect_ids(into);
                }
            }
        }
    }

    /// One-line rendering for tree output and event summaries.
    pub fn summary(&self) -> String {
        match self {
            Trigger::AllComplete(ids) => format!("all_complete({})", join_short(ids)),
            Trigger::AnyComplete(ids) => format!("any_complete({})", join_short(ids)),
            Trigger::TimeoutAt(at) => format!("timeout_at({})", at.to_rfc3339()),
            Trigger::AnyOf(subs) => {
                let inner: Vec<String> = subs.iter().map(Trigger::summary).collect();
                format!("any({})", inner.join(", "))
            }
        }
    }
}

fn join_short(ids: &[SessionId]) -> String {
    let shorts: Vec<&str> = ids.iter().map(|id| id.short(8)).collect();
    shorts.join(", ")
}

/// Evaluate a trigger against a status snapshot.
///
/// Pure: no mutation, no I/O; the same inputs always produce the same
/// answer. Ids missing from the snapshot never satisfy anything;
/// `diagnose` reports them as dangling references.
pub fn evaluate<F>(trigger: &Trigger, now: DateTime<Utc>, status_of: &F) -> bool
where
    F: Fn(&SessionId) -> Option<SessionStatus>,
{
    match trigger {
        Trigger::AllComplete(ids) => ids
            .iter()
            .all(|id| status_of(id).is_some_and(SessionStatus::is_terminal)),
        Trigger::AnyComplete(ids) => ids
            .iter()
            .any(|id| status_of(id) == Some(SessionStatus::Complete)),
        Trigger::TimeoutAt(at) => now >= *at,
        Trigger::AnyOf(subs) => subs.iter().any(|sub| evaluate(sub, now, status_of)),
    }
}

/// Ids still holding an unsatisfied trigger back, for the blocker chain.
///
/// Returns an empty list when the trigger has fired or only time blocks it.
pub fn blocking_ids<F>(trigger: &Trigger, now: DateTime<Utc>, status_of: &F) -> Vec<SessionId>
where
    F: Fn(&SessionId) -> Option<SessionStatus>,
{
    if evaluate(trigger, now, status_of) {
        return Vec::new();
    }
    let mut blockers = Vec::new();
    collect_blockers(trigger, now, status_of, &mut blockers);
    blockers
}

fn collect_blockers<F>(
    trigger: &Trigger,
    now: DateTime<Utc>,
    status_of: &F,
    into: &mut Vec<SessionId>,
) where
    F: Fn(&SessionId) -> Option<SessionStatus>,
{
    match trigger {
        Trigger::AllComplete(ids) => {
            for id in ids {
                if !status_of(id).is_some_and(SessionStatus::is_terminal) {
                    push_unique(into, id.clone());
                }
            }
        }
        Trigger::AnyComplete(ids) => {
            // Nothing completed yet; any of these finishing would unblock.
            for id in ids {
                if status_of(id) != Some(SessionStatus::Complete) {
                    push_unique(into, id.clone());
                }
            }
        }
        Trigger::TimeoutAt(_) => {}
        Trigger::AnyOf(subs) => {
            for sub in subs {
                collect_blockers(sub, now, status_of, into);
            }
        }
    }
}

fn push_unique(into: &mut Vec<SessionId>, id: SessionId) {
    if !into.contains(&id) {
        into.push(id);
    }
}

/// Errors from resolving a wire trigger into its stored form
#[derive(Debug, Error, PartialEq)]
pub enum TriggerError {
    #[error("trigger references no sessions")]
    Empty,
    #[error("__CHILDREN__ is only valid inside spawn_and_sleep")]
    SentinelWithoutChildren,
    #[error("unknown id-list sentinel: {0:?}")]
    UnknownSentinel(String),
    #[error("timeout_seconds must not be negative: {0}")]
    NegativeTimeout(f64),
}

/// An id list on the wire: either an array of ids (which may include the
/// `__CHILDREN__` sentinel) or the bare sentinel string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdListSpec {
    Sentinel(String),
    Ids(Vec<String>),
}

impl IdListSpec {
    fn resolve(&self, children: &[SessionId]) -> Result<Vec<SessionId>, TriggerError> {
        let mut out: Vec<SessionId> = Vec::new();
        let mut splice_children = |out: &mut Vec<SessionId>| -> Result<(), TriggerError> {
            if children.is_empty() {
                return Err(TriggerError::SentinelWithoutChildren);
            }
            for child in children {
                push_unique(out, child.clone());
            }
            Ok(())
        };
        match self {
            IdListSpec::Sentinel(s) if s == CHILDREN_SENTINEL => splice_children(&mut out)?,
            IdListSpec::Sentinel(s) => return Err(TriggerError::UnknownSentinel(s.clone())),
            IdListSpec::Ids(ids) => {
                for id in ids {
                    if id == CHILDREN_SENTINEL {
                        splice_children(&mut out)?;
                    } else {
                        push_unique(&mut out, SessionId::new(id.clone()));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// A trigger as agents write it. `timeout_seconds` and `__CHILDREN__`
/// exist only in this form; resolution produces the stored [`Trigger`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSpec {
    AllComplete(IdListSpec),
    AnyComplete(IdListSpec),
    TimeoutAt(DateTime<Utc>),
    TimeoutSeconds(f64),
    #[serde(rename = "any")]
    Any(Vec<TriggerSpec>),
}

impl TriggerSpec {
    /// Resolve relative timeouts against `now` and splice `children` in
    /// place of the sentinel. Rejects triggers that end up empty.
    pub fn resolve(
        &self,
        now: DateTime<Utc>,
        children: &[SessionId],
    ) -> Result<Trigger, TriggerError> {
        match self {
            TriggerSpec::AllComplete(list) => {
                let ids = list.resolve(children)?;
                if ids.is_empty() {
                    return Err(TriggerError::Empty);
                }
                Ok(Trigger::AllComplete(ids))
            }
            TriggerSpec::AnyComplete(list) => {
                let ids = list.resolve(children)?;
                if ids.is_empty() {
                    return Err(TriggerError::Empty);
                }
                Ok(Trigger::AnyComplete(ids))
            }
            TriggerSpec::TimeoutAt(at) => Ok(Trigger::TimeoutAt(*at)),
            TriggerSpec::TimeoutSeconds(secs) => {
                if *secs < 0.0 {
                    return Err(TriggerError::NegativeTimeout(*secs));
                }
                let millis = (*secs * 1000.0).round() as i64;
                Ok(Trigger::TimeoutAt(now + Duration::milliseconds(millis)))
            }
            TriggerSpec::Any(subs) => {
                if subs.is_empty() {
                    return Err(TriggerError::Empty);
                }
                let resolved: Result<Vec<Trigger>, TriggerError> =
                    subs.iter().map(|sub| sub.resolve(now, children)).collect();
                Ok(Trigger::AnyOf(resolved?))
            }
        }
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
