// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin Queue Daemon (adminqd)
//!
//! Background process that owns the scheduler loop and answers control
//! requests over a unix socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod jobs;
pub mod lifecycle;
pub mod protocol;
pub mod runner;
pub mod server;

pub use lifecycle::{Config, DaemonState, LifecycleError};
pub use protocol::{ProtocolError, Request, Response};
