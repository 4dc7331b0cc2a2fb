// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage for ken sessions: commit-batch WAL, snapshots, and the
//! transactional store.

mod snapshot;
mod state;
mod store;
mod wal;

pub use snapshot::{Snapshot, SnapshotError};
pub use state::{MaterializedState, StoredEvent};
pub use store::{Store, StoreError, StorePaths, Txn};
pub use wal::{Wal, WalCommit, WalError};
