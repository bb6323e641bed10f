// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable request storage.
//!
//! The store does CRUD only; admission control lives in
//! [`crate::queue::RequestQueue`]. Implementations must be safe for
//! concurrent readers; writers go through interior mutability.

use crate::operation::Op;
use crate::request::{EntityId, Request, RequestId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such request {0}")]
    NotFound(RequestId),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

/// Fields of a request as supplied by the caller; the store allocates the id.
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub requester_id: EntityId,
    pub run_at: DateTime<Utc>,
    pub operation: Op,
    pub target_id: Option<EntityId>,
    pub destination_id: Option<EntityId>,
    pub state_data: Option<String>,
}

/// Filter for delete/query; all set fields must match (AND).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RequestFilter {
    pub id: Option<RequestId>,
    pub requester_id: Option<EntityId>,
    pub target_id: Option<EntityId>,
    pub operation: Option<Op>,
    pub destination_id: Option<EntityId>,
}

impl RequestFilter {
    pub fn by_id(id: RequestId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn by_target(target: EntityId) -> Self {
        Self {
            target_id: Some(target),
            ..Self::default()
        }
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.id.is_none_or(|id| request.id == id)
            && self.requester_id.is_none_or(|r| request.requester_id == r)
            && self.target_id.is_none_or(|t| request.target_id == Some(t))
            && self.operation.is_none_or(|op| request.operation == op)
            && self
                .destination_id
                .is_none_or(|d| request.destination_id == Some(d))
    }
}

/// Durable CRUD for pending requests. No business rules.
pub trait RequestStore: Send + Sync {
    /// Insert a request and return its freshly allocated id. Ids are
    /// monotonic. Does not check conflicts.
    fn insert(&self, new: NewRequest) -> Result<RequestId, StoreError>;

    /// Update a request's run time. `NotFound` if the id does not exist.
    fn update_run_at(&self, id: RequestId, run_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Delete all rows matching the filter; returns the number deleted.
    /// Matching zero rows is not an error.
    fn delete(&self, filter: &RequestFilter) -> Result<usize, StoreError>;

    /// Query rows matching the filter. When `due_before` is set, restrict to
    /// `run_at <= due_before`. Order is unspecified; callers sort.
    fn query(
        &self,
        filter: &RequestFilter,
        due_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Request>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: u64,
    requests: BTreeMap<RequestId, Request>,
}

/// In-memory store, used by tests and as the model for file-backed stores.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RequestStore for MemoryStore {
    fn insert(&self, new: NewRequest) -> Result<RequestId, StoreError> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = RequestId(inner.next_id);
        inner.requests.insert(
            id,
            Request {
                id,
                requester_id: new.requester_id,
                run_at: new.run_at,
                operation: new.operation,
                target_id: new.target_id,
                destination_id: new.destination_id,
                state_data: new.state_data,
            },
        );
        Ok(id)
    }

    fn update_run_at(&self, id: RequestId, run_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let request = inner.requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        request.run_at = run_at;
        Ok(())
    }

    fn delete(&self, filter: &RequestFilter) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        let before = inner.requests.len();
        inner.requests.retain(|_, r| !filter.matches(r));
        Ok(before - inner.requests.len())
    }

    fn query(
        &self,
        filter: &RequestFilter,
        due_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<Request>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .filter(|r| due_before.is_none_or(|as_of| r.run_at <= as_of))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
