// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The transactional store.
//!
//! All mutation flows through [`Store::transaction`]: the body stages
//! events against a scratch copy of the state, every staged event is
//! validated against that scratch state, and on success the whole batch
//! becomes one fsynced WAL line. On any error nothing changes; partial
//! commits cannot exist, in memory or on disk.

use crate::snapshot::Snapshot;
use crate::state::MaterializedState;
use crate::wal::{self, Wal};
use crate::{SnapshotError, WalError};
use ken_core::{Event, RecoverSource, Session, SessionId, SessionStatus};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::info;

/// Save a snapshot and truncate the WAL after this many commits.
const SNAPSHOT_EVERY: u32 = 64;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown session: {0}")]
    NotFound(String),
    #[error("session id collision: {0}")]
    Conflict(String),
    #[error("unknown referenced session: {0}")]
    UnknownReference(String),
    #[error("illegal transition for session {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: SessionStatus,
        to: SessionStatus,
    },
    #[error("session {id} is {status}, expected {expected}")]
    WrongStatus {
        id: String,
        status: SessionStatus,
        expected: SessionStatus,
    },
    #[error("trigger may not reference its own session: {0}")]
    SelfReference(String),
    #[error("store is read-only")]
    ReadOnly,
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// On-disk locations of the store files.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub wal: PathBuf,
    pub snapshot: PathBuf,
}

impl StorePaths {
    /// Conventional layout under a store directory (`.ken/store`).
    pub fn under(store_dir: &Path) -> Self {
        Self {
            wal: store_dir.join("wal.jsonl"),
            snapshot: store_dir.join("snapshot.json"),
        }
    }
}

struct StoreInner {
    /// None when the store was opened read-only
    wal: Option<Wal>,
    state: MaterializedState,
    snapshot_path: PathBuf,
    commits_since_snapshot: u32,
}

/// Durable session store. Cheap to clone; all clones share one inner.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<StoreInner>>,
    /// Signalled after every commit: the scheduler's store-change wakeup
    notify: Arc<Notify>,
}

impl Store {
    /// Open for writing: load the snapshot if present, replay WAL commits
    /// past it, rotate corrupt artifacts to `.bak`.
    pub fn open(paths: &StorePaths) -> Result<Self, StoreError> {
        let (mut state, snapshot_seq) = match Snapshot::load(&paths.snapshot)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (MaterializedState::default(), 0),
        };

        let wal = Wal::open(&paths.wal)?;
        let commits = wal.commits_after(snapshot_seq)?;
        let replayed = commits.len();
        for commit in commits {
            for event in &commit.events {
                state.apply_event(event);
            }
        }
        if replayed > 0 {
            info!(replayed, after_seq = snapshot_seq, "replayed WAL commits");
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(StoreInner {
                wal: Some(wal),
                state,
                snapshot_path: paths.snapshot.clone(),
                commits_since_snapshot: 0,
            })),
            notify: Arc::new(Notify::new()),
        })
    }

    /// Open without the ability to write. Never mutates the store files,
    /// so it is safe while another process holds the write lock.
    pub fn open_read_only(paths: &StorePaths) -> Result<Self, StoreError> {
        let (mut state, snapshot_seq) = match Snapshot::peek(&paths.snapshot)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (MaterializedState::default(), 0),
        };

        for commit in wal::read_commits(&paths.wal)? {
            if commit.seq > snapshot_seq {
                for event in &commit.events {
                    state.apply_event(event);
                }
            }
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(StoreInner {
                wal: None,
                state,
                snapshot_path: paths.snapshot.clone(),
                commits_since_snapshot: 0,
            })),
            notify: Arc::new(Notify::new()),
        })
    }

    /// Run a read-only closure over the current state.
    pub fn read<T>(&self, f: impl FnOnce(&MaterializedState) -> T) -> T {
        let inner = self.inner.lock();
        f(&inner.state)
    }

    /// Clone the current state for longer-lived inspection (observer views).
    pub fn state_snapshot(&self) -> MaterializedState {
        self.inner.lock().state.clone()
    }

    /// Handle for waiting on the next commit.
    pub fn change_notify(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    /// Run `body` atomically. All events it stages commit together as one
    /// WAL line, or nothing changes at all. Read-only bodies (no staged
    /// events) commit nothing.
    pub fn transaction<T>(
        &self,
        body: impl FnOnce(&mut Txn) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut committed = false;
        let result = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            if inner.wal.is_none() {
                return Err(StoreError::ReadOnly);
            }

            let mut txn = Txn {
                staged: inner.state.clone(),
                events: Vec::new(),
            };
            let value = body(&mut txn)?;

            if !txn.events.is_empty() {
                let wal = inner.wal.as_mut().ok_or(StoreError::ReadOnly)?;
                let seq = wal.commit(&txn.events)?;
                inner.state = txn.staged;
                inner.commits_since_snapshot += 1;
                committed = true;

                // Snapshot maintenance is best-effort: the commit above is
                // already durable, so a failure here must not fail the
                // transaction.
                if inner.commits_since_snapshot >= SNAPSHOT_EVERY {
                    let snapshot = Snapshot::new(seq, inner.state.clone());
                    match snapshot.save(&inner.snapshot_path).map_err(StoreError::from) {
                        Ok(()) => {
                            if let Err(e) = wal.truncate_through(seq) {
                                tracing::warn!(error = %e, "WAL truncation after snapshot failed");
                            }
                            inner.commits_since_snapshot = 0;
                        }
                        Err(e) => tracing::warn!(error = %e, "periodic snapshot failed"),
                    }
                }
            }
            value
        };

        if committed {
            self.notify.notify_waiters();
        }
        Ok(result)
    }

    /// Save a snapshot of the current state (daemon shutdown path).
    pub fn save_snapshot(&self) -> Result<(), StoreError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let wal = inner.wal.as_mut().ok_or(StoreError::ReadOnly)?;
        let seq = wal.last_seq();
        if seq == 0 {
            return Ok(());
        }
        let snapshot = Snapshot::new(seq, inner.state.clone());
        snapshot.save(&inner.snapshot_path)?;
        wal.truncate_through(seq)?;
        inner.commits_since_snapshot = 0;
        Ok(())
    }
}

/// An in-flight transaction: scratch state plus the staged event batch.
pub struct Txn {
    staged: MaterializedState,
    events: Vec<Event>,
}

impl Txn {
    /// State as it will look if this transaction commits.
    pub fn state(&self) -> &MaterializedState {
        &self.staged
    }

    /// Resolve a session or fail the transaction.
    pub fn session(&self, id: &SessionId) -> Result<&Session, StoreError> {
        self.staged
            .session(id)
            .ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))
    }

    /// Validate an event against the staged state and apply it.
    ///
    /// Rejection leaves the transaction unusable only in the sense that
    /// the caller should propagate the error; nothing has been applied.
    pub fn stage(&mut self, event: Event) -> Result<(), StoreError> {
        validate(&self.staged, &event)?;
        self.staged.apply_event(&event);
        self.events.push(event);
        Ok(())
    }
}

/// The store-level guard: state-machine edges, id collisions, and
/// referential integrity, checked before an event may join a commit.
fn validate(state: &MaterializedState, event: &Event) -> Result<(), StoreError> {
    match event {
        Event::SessionCreated { id, parent_id, .. } => {
            if state.session(id).is_some() {
                return Err(StoreError::Conflict(id.as_str().to_string()));
            }
            if let Some(parent) = parent_id {
                if state.session(parent).is_none() {
                    return Err(StoreError::UnknownReference(parent.as_str().to_string()));
                }
            }
            Ok(())
        }

        Event::Wake { id, .. } => require_transition(state, id, SessionStatus::Waking),

        Event::AgentSpawned { id, .. } => require_transition(state, id, SessionStatus::Active),

        Event::Checkpoint { id, .. } | Event::Spawn { id, .. } => {
            require_status(state, id, SessionStatus::Active)
        }

        Event::Sleep { id, trigger, .. } => {
            require_transition(state, id, SessionStatus::Sleeping)?;
            for referenced in trigger.referenced_ids() {
                if referenced == id {
                    return Err(StoreError::SelfReference(id.as_str().to_string()));
                }
                if state.session(referenced).is_none() {
                    return Err(StoreError::UnknownReference(
                        referenced.as_str().to_string(),
                    ));
                }
            }
            Ok(())
        }

        Event::Complete { id, .. } => require_transition(state, id, SessionStatus::Complete),

        Event::Failed { id, .. } => require_transition(state, id, SessionStatus::Failed),

        Event::TriggerSatisfied { id, .. } => {
            require_transition(state, id, SessionStatus::Pending)
        }

        Event::Recover { id, source, .. } => {
            let session = state
                .session(id)
                .ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
            let allowed_from = match source {
                RecoverSource::Operator => SessionStatus::Failed,
                RecoverSource::Startup => SessionStatus::Waking,
            };
            if session.status != allowed_from {
                return Err(StoreError::WrongStatus {
                    id: id.as_str().to_string(),
                    status: session.status,
                    expected: allowed_from,
                });
            }
            Ok(())
        }

        // Warnings may reference sessions that no longer resolve; that is
        // often exactly what they are reporting.
        Event::Warning { .. } => Ok(()),
    }
}

fn require_status(
    state: &MaterializedState,
    id: &SessionId,
    expected: SessionStatus,
) -> Result<(), StoreError> {
    let session = state
        .session(id)
        .ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
    if session.status != expected {
        return Err(StoreError::WrongStatus {
            id: id.as_str().to_string(),
            status: session.status,
            expected,
        });
    }
    Ok(())
}

fn require_transition(
    state: &MaterializedState,
    id: &SessionId,
    to: SessionStatus,
) -> Result<(), StoreError> {
    let session = state
        .session(id)
        .ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
    if !session.status.can_transition(to) {
        return Err(StoreError::InvalidTransition {
            id: id.as_str().to_string(),
            from: session.status,
            to,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
