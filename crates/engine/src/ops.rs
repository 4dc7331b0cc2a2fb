// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator entry points: root wakes and the two manual transitions.
//!
//! These are the store mutations driven by a human rather than an agent
//! or the scheduler. Each is one transaction.

use ken_core::{Clock, DoneWhen, Event, IdGen, KenPath, RecoverSource, SessionId};
use ken_storage::{Store, StoreError};
use tracing::info;

/// Create a root session (the `ken wake` CLI path). Returns its id.
pub fn wake_root<C: Clock, G: IdGen>(
    store: &Store,
    clock: &C,
    idgen: &G,
    ken_path: KenPath,
    task: String,
    done_when: Option<DoneWhen>,
) -> Result<SessionId, StoreError> {
    let id = idgen.next();
    let at = clock.now();
    store.transaction(|tx| {
        tx.stage(Event::SessionCreated {
            id: id.clone(),
            ken_path: ken_path.clone(),
            task: task.clone(),
            done_when: done_when.clone(),
            parent_id: None,
            at,
        })
    })?;
    info!(session = %id, ken = %ken_path, "root session created");
    Ok(id)
}

/// Re-queue a failed session from its last checkpoint.
pub fn recover<C: Clock>(store: &Store, clock: &C, id: &SessionId) -> Result<(), StoreError> {
    let at = clock.now();
    store.transaction(|tx| {
        tx.stage(Event::Recover {
            id: id.clone(),
            source: RecoverSource::Operator,
            at,
        })
    })?;
    info!(session = %id, "session recovered by operator");
    Ok(())
}

/// Mark a stuck session failed with a synthesised result.
pub fn abandon<C: Clock>(
    store: &Store,
    clock: &C,
    id: &SessionId,
    reason: &str,
) -> Result<(), StoreError> {
    let at = clock.now();
    store.transaction(|tx| {
        tx.stage(Event::Failed {
            id: id.clone(),
            reason: format!("abandoned by operator: {reason}"),
            at,
        })
    })?;
    info!(session = %id, "session abandoned");
    Ok(())
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
