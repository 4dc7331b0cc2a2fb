// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine lifecycle: the single-writer lock, socket binding, logging,
//! and clean shutdown.

use crate::paths::ProjectPaths;
use fs2::FileExt;
use ken_engine::ConfigError;
use ken_storage::StoreError;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::warn;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("not a ken project (run `ken init` first): {0}")]
    NotInitialised(PathBuf),
    #[error("another engine holds the lock (is a daemon running?)")]
    LockHeld,
    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusive write lock on a project's engine state.
///
/// Held for the lifetime of any process that opens the store for
/// writing; dropping it releases the flock.
pub struct EngineLock {
    // NOTE(lifetime): held to maintain the exclusive flock
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl EngineLock {
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Take the project's exclusive engine lock and record our pid in it.
pub fn acquire_lock(paths: &ProjectPaths) -> Result<EngineLock, LifecycleError> {
    if !paths.is_initialised() {
        return Err(LifecycleError::NotInitialised(paths.root().to_path_buf()));
    }

    // Open without truncating so a failed lock attempt cannot wipe the
    // running engine's pid.
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(paths.lock())?;
    file.try_lock_exclusive()
        .map_err(|_| LifecycleError::LockHeld)?;

    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;

    Ok(EngineLock {
        file,
        path: paths.lock(),
    })
}

/// Bind the request socket, clearing any stale socket file left by a
/// crashed engine (the lock proves no live engine owns it).
pub fn bind_socket(paths: &ProjectPaths) -> Result<UnixListener, LifecycleError> {
    let socket_path = paths.socket();
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    UnixListener::bind(&socket_path).map_err(|e| LifecycleError::BindFailed(socket_path, e))
}

/// Remove the socket and pid files on clean shutdown.
pub fn remove_runtime_files(paths: &ProjectPaths) {
    for path in [paths.socket(), paths.lock()] {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove runtime file");
            }
        }
    }
}

/// Route tracing to the daemon log file. Returns the appender guard;
/// dropping it flushes buffered log lines.
pub fn init_tracing(paths: &ProjectPaths) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_path = paths.daemon_log();
    let directory = log_path.parent()?;
    let file_name = log_path.file_name()?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("KEN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .finish();

    // A second engine invocation in-process keeps the first subscriber.
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
