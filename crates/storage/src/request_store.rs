// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed [`RequestStore`].
//!
//! The whole queue lives in one `requests.json` snapshot. Every mutation
//! rewrites the file through a temp file and an atomic rename, so a crash
//! never leaves a half-written snapshot behind.

use adminq_core::store::{NewRequest, RequestFilter, RequestStore, StoreError};
use adminq_core::{Request, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    requests: Vec<Request>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    requests: BTreeMap<RequestId, Request>,
}

impl Inner {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            next_id: self.next_id,
            requests: self.requests.values().cloned().collect(),
        }
    }
}

/// Durable request store backed by a single JSON file.
pub struct JsonStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonStore {
    /// Open the store, loading any snapshot already on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let inner = if path.exists() {
            let json = fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&json)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
            debug!(path = %path.display(), pending = snapshot.requests.len(), "loaded request snapshot");
            Inner {
                next_id: snapshot.next_id,
                requests: snapshot
                    .requests
                    .into_iter()
                    .map(|r| (r.id, r))
                    .collect(),
            }
        } else {
            Inner::default()
        };
        Ok(Self {
            path,
            inner: Mutex::new(inner),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, inner: &Inner) -> Result<(), StoreError> {
        write_json_atomic(&self.path, &inner.snapshot())
    }
}

/// Serialize `value` and replace `path` atomically (rename is atomic on
/// POSIX).
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let temp_path = path.with_extension("json.tmp");
    {
        use std::io::Write;
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

impl RequestStore for JsonStore {
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
        self.persist(&inner)?;
        Ok(id)
    }

    fn update_run_at(&self, id: RequestId, run_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let request = inner.requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        request.run_at = run_at;
        self.persist(&inner)?;
        Ok(())
    }

    fn delete(&self, filter: &RequestFilter) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        let before = inner.requests.len();
        inner.requests.retain(|_, r| !filter.matches(r));
        let removed = before - inner.requests.len();
        if removed > 0 {
            self.persist(&inner)?;
        }
        Ok(removed)
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
#[path = "request_store_tests.rs"]
mod tests;
