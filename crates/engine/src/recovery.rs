// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup recovery.
//!
//! A restarted engine has no live agent processes by construction, so
//! stored sessions claiming otherwise are reconciled before anything
//! else runs: waking sessions are re-queued (their agent, if any, is
//! orphaned) and active sessions are failed with a synthetic result an
//! operator can `recover` from.

use ken_core::{Clock, Event, RecoverSource, SessionId, SessionStatus};
use ken_storage::{Store, StoreError};
use tracing::{info, warn};

/// What the recovery pass did.
#[derive(Debug, Default, Clone)]
pub struct RecoveryReport {
    /// waking → pending (will re-spawn with the recover marker)
    pub requeued: Vec<SessionId>,
    /// active → failed (agent lost across the restart)
    pub agent_lost: Vec<SessionId>,
    /// Integrity warnings found in the recovered state
    pub warnings: Vec<String>,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.requeued.is_empty() && self.agent_lost.is_empty() && self.warnings.is_empty()
    }
}

/// Reconcile stored liveness claims with reality after a restart.
pub fn recover_on_startup<C: Clock>(store: &Store, clock: &C) -> Result<RecoveryReport, StoreError> {
    let at = clock.now();
    let mut report = RecoveryReport::default();

    let (waking, active): (Vec<SessionId>, Vec<SessionId>) = store.read(|state| {
        let mut waking: Vec<SessionId> = state
            .with_status(SessionStatus::Waking)
            .into_iter()
            .map(|s| s.id.clone())
            .collect();
        waking.sort();
        let mut active: Vec<SessionId> = state
            .with_status(SessionStatus::Active)
            .into_iter()
            .map(|s| s.id.clone())
            .collect();
        active.sort();
        (waking, active)
    });

    if !waking.is_empty() || !active.is_empty() {
        store.transaction(|tx| {
            for id in &waking {
                tx.stage(Event::Recover {
                    id: id.clone(),
                    source: RecoverSource::Startup,
                    at,
                })?;
                tx.stage(Event::Warning {
                    id: Some(id.clone()),
                    message: "engine restarted mid-wake; session re-queued".to_string(),
                    at,
                })?;
            }
            for id in &active {
                tx.stage(Event::Failed {
                    id: id.clone(),
                    reason: "engine restarted while the agent was active; agent lost".to_string(),
                    at,
                })?;
            }
            Ok(())
        })?;
        report.requeued = waking;
        report.agent_lost = active;
    }

    report.warnings = store.read(|state| state.integrity_warnings());

    for id in &report.requeued {
        info!(session = %id, "re-queued session orphaned mid-wake");
    }
    for id in &report.agent_lost {
        warn!(session = %id, "marked session failed: agent lost across restart");
    }
    for warning in &report.warnings {
        warn!(%warning, "store integrity warning");
    }

    Ok(report)
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
