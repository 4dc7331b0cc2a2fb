// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ken-engine: the dependency-driven scheduler over persistent sessions.
//!
//! Request handling, trigger firing, wake priority, agent supervision,
//! recovery, and the read-only observer views all live here; durability
//! is delegated to ken-storage and process mechanics to ken-adapters.

pub mod config;
pub mod handler;
pub mod observer;
pub mod ops;
pub mod recovery;
pub mod scheduler;

pub use config::{AgentConfig, ConfigError, DiagnoseConfig, EngineConfig};
pub use handler::RequestHandler;
pub use observer::{Blocker, EventLine, Issue, SessionDetail, StatusSummary, TreeNode};
pub use recovery::{recover_on_startup, RecoveryReport};
pub use scheduler::{AgentLaunch, Scheduler, TickOutcome};
