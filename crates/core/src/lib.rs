// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! adminq-core: deferred request queue and job scheduling engine
//!
//! This crate provides:
//! - A closed set of administrative operation codes and their conflict rules
//! - Admission-controlled queuing of deferred requests
//! - A job graph with frequency, lock, and dependency constraints
//! - A scheduler that dispatches due requests and eligible jobs

pub mod clock;
pub mod conflict;
pub mod graph;
pub mod operation;
pub mod queue;
pub mod request;
pub mod scheduler;
pub mod store;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use conflict::{ConflictTable, UnknownOperationError};
pub use graph::{GraphError, Job, JobGraph, JobStatus};
pub use operation::{Op, ParseOpError};
pub use queue::{QueueError, RequestQueue};
pub use request::{batch_run_at, EntityId, Request, RequestId, BATCH_HOUR};
pub use scheduler::{
    CompletedJob, HandlerError, JobError, JobReport, JobRunner, JobSpec, JobSummary,
    RequestHandler, RunningJob, Scheduler, SchedulerError, SchedulerState, StatusReport,
    TickOutcome,
};
pub use store::{MemoryStore, NewRequest, RequestFilter, RequestStore, StoreError};
