// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request admission and scheduling policy on top of a [`RequestStore`].
//!
//! The queue owns the conflict rules: a request is admitted only when no
//! pending request on the same target carries a conflicting operation.
//! Requests without a target never conflict.

use crate::clock::Clock;
use crate::conflict::{ConflictTable, UnknownOperationError};
use crate::operation::Op;
use crate::request::{EntityId, Request, RequestId};
use crate::store::{NewRequest, RequestFilter, RequestStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("conflicting request of type {0} already queued for target")]
    Conflicting(Op),

    #[error("no such request {0}")]
    NotFound(RequestId),

    #[error(transparent)]
    Table(#[from] UnknownOperationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Deferred-request queue. Admission decisions are serialized so that two
/// concurrent adds for the same target cannot both slip past the conflict
/// check.
pub struct RequestQueue<C: Clock> {
    store: Arc<dyn RequestStore>,
    conflicts: ConflictTable,
    clock: C,
    admission: Mutex<()>,
}

impl<C: Clock> RequestQueue<C> {
    pub fn new(store: Arc<dyn RequestStore>, conflicts: ConflictTable, clock: C) -> Self {
        Self {
            store,
            conflicts,
            clock,
            admission: Mutex::new(()),
        }
    }

    /// Admit a request. Returns `Conflicting` when a pending request on the
    /// same target has an operation in the conflict set of `new.operation`.
    pub fn add(&self, new: NewRequest) -> Result<RequestId, QueueError> {
        let conflicting = self.conflicts.conflicts_of(new.operation)?;

        let _admit = self.admission.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(target) = new.target_id {
            let pending = self.store.query(&RequestFilter::by_target(target), None)?;
            if let Some(clash) = pending
                .iter()
                .find(|r| conflicting.contains(&r.operation))
            {
                debug!(
                    operation = %new.operation,
                    target = %target,
                    clashes_with = %clash.operation,
                    "request rejected by conflict rule"
                );
                return Err(QueueError::Conflicting(clash.operation));
            }
        }

        let operation = new.operation;
        let id = self.store.insert(new)?;
        info!(request = %id, operation = %operation, "request queued");
        Ok(id)
    }

    /// Push a request's run time forward by `minutes` from `max(now, run_at)`.
    pub fn delay(&self, id: RequestId, minutes: i64) -> Result<DateTime<Utc>, QueueError> {
        let rows = self.store.query(&RequestFilter::by_id(id), None)?;
        let request = rows.first().ok_or(QueueError::NotFound(id))?;

        let base = self.clock.now().max(request.run_at);
        let next = base + Duration::minutes(minutes);
        self.store.update_run_at(id, next)?;
        debug!(request = %id, run_at = %next, "request delayed");
        Ok(next)
    }

    /// Remove all requests matching the filter; returns the number removed.
    pub fn remove(&self, filter: &RequestFilter) -> Result<usize, QueueError> {
        let removed = self.store.delete(filter)?;
        if removed > 0 {
            info!(removed, "requests removed");
        }
        Ok(removed)
    }

    /// Requests with `run_at <= now`, ordered by `(run_at, id)` so that ties
    /// dispatch in admission order.
    pub fn due_requests(&self) -> Result<Vec<Request>, QueueError> {
        let mut due = self
            .store
            .query(&RequestFilter::default(), Some(self.clock.now()))?;
        due.sort_by_key(|r| (r.run_at, r.id));
        Ok(due)
    }

    /// All pending requests matching the filter, ordered by `(run_at, id)`.
    pub fn requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, QueueError> {
        let mut rows = self.store.query(filter, None)?;
        rows.sort_by_key(|r| (r.run_at, r.id));
        Ok(rows)
    }

    /// Pending requests for one target, any operation.
    pub fn requests_for_target(&self, target: EntityId) -> Result<Vec<Request>, QueueError> {
        self.requests(&RequestFilter::by_target(target))
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
