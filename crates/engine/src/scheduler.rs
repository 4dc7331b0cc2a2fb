// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler: one cooperative loop driving triggers and wakes.
//!
//! A tick is one iteration of the loop: fire
//! due triggers (sleeping → pending), then wake the highest-priority
//! pending session the concurrency budget allows: compose its prompt,
//! record the wake, spawn the agent, and supervise its exit.

use ken_adapters::{AgentAdapter, AgentExit, AgentSpawnConfig};
use ken_core::{evaluate, Clock, Event, Session, SessionId, SessionStatus};
use ken_kenning::{Composer, DepResult};
use ken_storage::Store;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How to launch agent processes for this project.
#[derive(Debug, Clone)]
pub struct AgentLaunch {
    pub command: String,
    pub args: Vec<String>,
    pub project_root: PathBuf,
    pub logs_dir: PathBuf,
    pub socket_path: PathBuf,
}

/// Result of one scheduler iteration.
pub struct TickOutcome {
    /// Sessions whose triggers fired this tick
    pub fired: Vec<SessionId>,
    /// Session woken this tick, if the budget allowed one
    pub spawned: Option<SessionId>,
    /// Supervision task for the spawned agent; `process` awaits it,
    /// the daemon lets it run detached
    pub supervisor: Option<JoinHandle<()>>,
}

/// Drives the evaluator and the wake pipeline.
pub struct Scheduler<A: AgentAdapter, C: Clock> {
    store: Store,
    composer: Composer,
    adapter: A,
    clock: C,
    max_active: usize,
    launch: AgentLaunch,
}

impl<A: AgentAdapter, C: Clock> Scheduler<A, C> {
    pub fn new(
        store: Store,
        adapter: A,
        clock: C,
        max_active: usize,
        launch: AgentLaunch,
    ) -> Self {
        let composer = Composer::new(launch.project_root.clone());
        Self {
            store,
            composer,
            adapter,
            clock,
            max_active,
            launch,
        }
    }

    /// One scheduler iteration.
    pub async fn tick(&self) -> TickOutcome {
        let fired = self.fire_triggers();
        let (spawned, supervisor) = match self.wake_next().await {
            Some((id, supervisor)) => (Some(id), Some(supervisor)),
            None => (None, None),
        };
        TickOutcome {
            fired,
            spawned,
            supervisor,
        }
    }

    /// Evaluate every sleeping session's trigger; transition the fired
    /// ones to pending, one transaction each.
    pub fn fire_triggers(&self) -> Vec<SessionId> {
        let now = self.clock.now();
        let due: Vec<SessionId> = self.store.read(|state| {
            let status_of = |id: &SessionId| state.status_of(id);
            let mut due: Vec<SessionId> = state
                .with_status(SessionStatus::Sleeping)
                .into_iter()
                .filter(|session| {
                    session
                        .trigger
                        .as_ref()
                        .is_some_and(|t| evaluate(t, now, &status_of))
                })
                .map(|session| session.id.clone())
                .collect();
            due.sort();
            due
        });

        let mut fired = Vec::new();
        for id in due {
            let outcome = self.store.transaction(|tx| {
                tx.stage(Event::TriggerSatisfied {
                    id: id.clone(),
                    at: now,
                })
            });
            match outcome {
                Ok(()) => {
                    info!(session = %id, "trigger satisfied");
                    fired.push(id);
                }
                Err(e) => warn!(session = %id, error = %e, "failed to fire trigger"),
            }
        }
        fired
    }

    /// Wake the highest-priority pending session, if the budget permits.
    async fn wake_next(&self) -> Option<(SessionId, JoinHandle<()>)> {
        let now = self.clock.now();

        let (session, deps) = self.store.read(|state| {
            if state.in_flight() >= self.max_active {
                return None;
            }
            let candidate = next_pending(state)?;
            let deps = dependency_results(state, candidate);
            Some((candidate.clone(), deps))
        })?;

        let mode = session.wake_mode();
        let composed = self.composer.compose(&session, &deps);

        let woken = self.store.transaction(|tx| {
            tx.stage(Event::Wake {
                id: session.id.clone(),
                mode,
                at: now,
            })?;
            for warning in &composed.warnings {
                tx.stage(Event::Warning {
                    id: Some(session.id.clone()),
                    message: warning.clone(),
                    at: now,
                })?;
            }
            Ok(())
        });
        if let Err(e) = woken {
            warn!(session = %session.id, error = %e, "failed to mark session waking");
            return None;
        }

        let config = AgentSpawnConfig {
            session_id: session.id.clone(),
            prompt: composed.prompt,
            command: self.launch.command.clone(),
            args: self.launch.args.clone(),
            env: vec![
                (
                    "KEN_SESSION_ID".to_string(),
                    session.id.as_str().to_string(),
                ),
                (
                    "KEN_KEN_PATH".to_string(),
                    session.ken_path.as_str().to_string(),
                ),
                (
                    "KEN_SOCKET".to_string(),
                    self.launch.socket_path.display().to_string(),
                ),
            ],
            cwd: self.launch.project_root.clone(),
            log_path: self
                .launch
                .logs_dir
                .join(format!("{}.log", session.id.as_str())),
        };

        match self.adapter.spawn(config).await {
            Ok(spawned) => {
                let recorded = self.store.transaction(|tx| {
                    tx.stage(Event::AgentSpawned {
                        id: session.id.clone(),
                        pid: spawned.pid,
                        mode,
                        at: self.clock.now(),
                    })
                });
                if let Err(e) = recorded {
                    warn!(session = %session.id, error = %e, "failed to record agent spawn");
                }
                info!(session = %session.id, pid = ?spawned.pid, %mode, "agent spawned");

                let supervisor = tokio::spawn(supervise(
                    self.store.clone(),
                    self.clock.clone(),
                    session.id.clone(),
                    spawned.exit,
                ));
                Some((session.id, supervisor))
            }
            Err(e) => {
                warn!(session = %session.id, error = %e, "agent spawn failed");
                let failed = self.store.transaction(|tx| {
                    tx.stage(Event::Failed {
                        id: session.id.clone(),
                        reason: format!("failed to spawn agent: {e}"),
                        at: self.clock.now(),
                    })
                });
                if let Err(e) = failed {
                    warn!(session = %session.id, error = %e, "failed to record spawn failure");
                }
                None
            }
        }
    }
}

/// Wake priority: deeper in the tree first, then oldest `updated_at`,
/// then lexicographic id. Depth-first biases leaf completion so parents
/// can wake sooner.
fn next_pending(state: &ken_storage::MaterializedState) -> Option<&Session> {
    state
        .with_status(SessionStatus::Pending)
        .into_iter()
        .min_by(|a, b| {
            state
                .depth(&b.id)
                .cmp(&state.depth(&a.id))
                .then(a.updated_at.cmp(&b.updated_at))
                .then(a.id.cmp(&b.id))
        })
}

/// Results of the dependencies captured when this session's trigger
/// fired, for the Dependency-Results prompt section.
fn dependency_results(state: &ken_storage::MaterializedState, session: &Session) -> Vec<DepResult> {
    session
        .wake_deps
        .iter()
        .filter_map(|dep_id| {
            let dep = state.session(dep_id)?;
            Some(DepResult {
                id: dep.id.clone(),
                ken_path: dep.ken_path.as_str().to_string(),
                status: dep.status,
                result: dep.result.clone(),
            })
        })
        .collect()
}

/// Watch one agent to its exit; an exit while the session is still
/// waking or active means no terminal request arrived, which is a crash.
async fn supervise<C: Clock>(
    store: Store,
    clock: C,
    id: SessionId,
    exit: tokio::sync::oneshot::Receiver<AgentExit>,
) {
    let exit = exit.await.unwrap_or(AgentExit { code: None });

    let crashed = store.read(|state| {
        matches!(
            state.status_of(&id),
            Some(SessionStatus::Active | SessionStatus::Waking)
        )
    });
    if !crashed {
        return;
    }

    let reason = format!(
        "agent exited unexpectedly ({}) without a terminal request",
        exit.describe()
    );
    warn!(session = %id, %reason, "marking crashed session failed");
    let outcome = store.transaction(|tx| {
        tx.stage(Event::Failed {
            id: id.clone(),
            reason: reason.clone(),
            at: clock.now(),
        })
    });
    if let Err(e) = outcome {
        warn!(session = %id, error = %e, "failed to record agent crash");
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
