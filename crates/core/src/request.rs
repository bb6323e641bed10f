// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred request data model.

use crate::operation::Op;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a pending request, allocated by the store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an entity (account, group, address) in the surrounding
/// identity-management system. Opaque to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single deferred administrative operation.
///
/// Created by `RequestQueue::add`; only `run_at` is ever updated in place
/// (by `delay`). Deleted on explicit cancellation or after dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    /// Entity that asked for the operation.
    pub requester_id: EntityId,
    /// Not eligible to run before this time.
    pub run_at: DateTime<Utc>,
    pub operation: Op,
    /// Entity the operation acts on. `None` means no specific target
    /// (give-away requests match by destination instead).
    pub target_id: Option<EntityId>,
    /// Secondary party, e.g. the new owning group.
    pub destination_id: Option<EntityId>,
    /// Opaque operation-specific payload.
    pub state_data: Option<String>,
}

/// The hour of the daily batch slot for deferred bulk operations.
pub const BATCH_HOUR: i64 = 22;

/// Compute the next batch slot: today at 22:00, or tomorrow at 22:00 when
/// `now` is already past 22:00. Never yields a time in the past.
pub fn batch_run_at(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    if now - midnight > Duration::hours(BATCH_HOUR) {
        midnight + Duration::hours(24 + BATCH_HOUR)
    } else {
        midnight + Duration::hours(BATCH_HOUR)
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
