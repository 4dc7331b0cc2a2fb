// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed exit codes: 0 success, 1 user error, 2 store error,
//! 3 not-found, 4 invalid-state.

use ken_storage::StoreError;

/// An error carrying its process exit code.
#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self {
            code: 2,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: 3,
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self {
            code: 4,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<StoreError> for ExitError {
    fn from(e: StoreError) -> Self {
        let message = e.to_string();
        match e {
            StoreError::NotFound(_) => ExitError::not_found(message),
            StoreError::Conflict(_)
            | StoreError::UnknownReference(_)
            | StoreError::InvalidTransition { .. }
            | StoreError::WrongStatus { .. }
            | StoreError::SelfReference(_) => ExitError::invalid_state(message),
            StoreError::ReadOnly | StoreError::Wal(_) | StoreError::Snapshot(_) => {
                ExitError::store(message)
            }
        }
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
