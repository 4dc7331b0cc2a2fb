// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ken-core: domain types for the ken session engine

pub mod clock;
pub mod event;
pub mod id;
pub mod request;
pub mod session;
pub mod time_fmt;
pub mod trigger;

pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{Event, RecoverSource};
pub use id::{IdGen, SequentialIdGen, SessionId, ShortId, UuidIdGen};
pub use request::{AgentRequest, AgentResponse, ChildSpec, RequestParseError};
pub use session::{DoneWhen, KenPath, KenPathError, Session, SessionStatus, WakeMode};
pub use time_fmt::format_age;
pub use trigger::{evaluate, Trigger, TriggerError, TriggerSpec, CHILDREN_SENTINEL};
