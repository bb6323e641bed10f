// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! adminq-storage: file-backed persistence for the request queue and job
//! run history. Everything is a JSON snapshot replaced atomically via
//! write-to-temp-then-rename.

pub mod job_log;
pub mod request_store;

pub use job_log::JobLog;
pub use request_store::JsonStore;
