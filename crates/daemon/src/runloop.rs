// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine run loop shared by `ken process` and `ken daemon`.
//!
//! One process hosts the single-threaded scheduler loop plus the socket
//! listener; agents run in parallel as subprocesses. The loop suspends
//! on three things only: a store change, the tick interval, and (in
//! once mode) the spawned agent's exit.

use crate::lifecycle::{self, LifecycleError};
use crate::listener::{ListenCtx, Listener};
use crate::paths::ProjectPaths;
use ken_adapters::ProcessAgentAdapter;
use ken_core::{SessionId, SystemClock, UuidIdGen};
use ken_engine::{recover_on_startup, AgentLaunch, EngineConfig, RecoveryReport, RequestHandler, Scheduler};
use ken_storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};

/// One iteration, or loop until a shutdown signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Forever,
}

/// What a run did, for CLI reporting.
#[derive(Debug, Default)]
pub struct RunReport {
    pub recovery: RecoveryReport,
    pub fired: Vec<SessionId>,
    pub spawned: Vec<SessionId>,
}

/// Run the engine in the given project.
pub async fn run(paths: &ProjectPaths, mode: RunMode) -> Result<RunReport, LifecycleError> {
    let config = EngineConfig::load(&paths.config())?;
    let lock = lifecycle::acquire_lock(paths)?;
    let store = Store::open(&paths.store())?;
    let clock = SystemClock;
    let idgen = UuidIdGen;

    let recovery = recover_on_startup(&store, &clock)?;

    let socket = lifecycle::bind_socket(paths)?;
    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx {
        handler: RequestHandler::new(store.clone(), clock.clone(), idgen.clone()),
        store: store.clone(),
        clock: clock.clone(),
        idgen: idgen.clone(),
        shutdown: Arc::clone(&shutdown),
    });
    let listener_task = tokio::spawn(Listener::new(socket, Arc::clone(&ctx)).run());

    let scheduler = Scheduler::new(
        store.clone(),
        ProcessAgentAdapter::new(),
        clock,
        config.max_active,
        AgentLaunch {
            command: config.agent.command.clone(),
            args: config.agent.args.clone(),
            project_root: paths.root().to_path_buf(),
            logs_dir: paths.logs_dir(),
            socket_path: paths.socket(),
        },
    );

    let mut report = RunReport {
        recovery,
        ..RunReport::default()
    };

    match mode {
        RunMode::Once => {
            let outcome = scheduler.tick().await;
            report.fired.extend(outcome.fired);
            report.spawned.extend(outcome.spawned.clone());
            if let Some(supervisor) = outcome.supervisor {
                // "To completion": serve requests until this agent exits
                // and its exit has been reconciled.
                if supervisor.await.is_err() {
                    warn!("agent supervisor task failed");
                }
            }
        }
        RunMode::Forever => {
            let tick_interval = Duration::from_millis(config.tick_interval_ms.max(10));
            let changed = store.change_notify();
            info!("engine loop running");
            loop {
                let outcome = scheduler.tick().await;
                report.fired.extend(outcome.fired);
                report.spawned.extend(outcome.spawned);
                // Supervisors run detached; crashes are reconciled as
                // the exits arrive.

                tokio::select! {
                    _ = shutdown.notified() => {
                        info!("shutdown requested over the socket");
                        break;
                    }
                    signal = tokio::signal::ctrl_c() => {
                        if let Err(e) = signal {
                            warn!(error = %e, "ctrl-c handler failed");
                        }
                        info!("interrupt received, shutting down");
                        break;
                    }
                    _ = changed.notified() => {}
                    _ = tokio::time::sleep(tick_interval) => {}
                }
            }
        }
    }

    listener_task.abort();
    if let Err(e) = store.save_snapshot() {
        warn!(error = %e, "failed to save shutdown snapshot");
    }
    lifecycle::remove_runtime_files(paths);
    drop(lock);

    Ok(report)
}
