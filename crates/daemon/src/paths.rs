// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout of a ken project.
//!
//! The engine owns `.ken/` exclusively; `kens/` is read-only input and
//! `reflections/` is not engine-owned at all.

use ken_engine::EngineConfig;
use ken_storage::StorePaths;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from `ken init`
#[derive(Debug, Error)]
pub enum InitError {
    #[error("already initialised: {0} exists")]
    AlreadyInitialised(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolves every engine-owned path under one project root.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Walk up from `start` looking for a directory containing `.ken/`.
    pub fn discover(start: &Path) -> Option<Self> {
        let mut cursor = Some(start);
        while let Some(dir) = cursor {
            if dir.join(".ken").is_dir() {
                return Some(Self::new(dir));
            }
            cursor = dir.parent();
        }
        None
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ken_dir(&self) -> PathBuf {
        self.root.join(".ken")
    }

    pub fn config(&self) -> PathBuf {
        self.ken_dir().join("config.toml")
    }

    pub fn store(&self) -> StorePaths {
        StorePaths::under(&self.ken_dir().join("store"))
    }

    pub fn socket(&self) -> PathBuf {
        self.ken_dir().join("daemon.sock")
    }

    pub fn lock(&self) -> PathBuf {
        self.ken_dir().join("daemon.pid")
    }

    pub fn daemon_log(&self) -> PathBuf {
        self.ken_dir().join("daemon.log")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.ken_dir().join("logs")
    }

    pub fn kens_dir(&self) -> PathBuf {
        self.root.join("kens")
    }

    pub fn is_initialised(&self) -> bool {
        self.ken_dir().is_dir()
    }

    /// Create `.ken/` with a starter config and empty store directories.
    pub fn init(&self) -> Result<(), InitError> {
        let ken_dir = self.ken_dir();
        if ken_dir.exists() {
            return Err(InitError::AlreadyInitialised(ken_dir));
        }
        std::fs::create_dir_all(ken_dir.join("store"))?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::write(self.config(), EngineConfig::default_toml())?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
