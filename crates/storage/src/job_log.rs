// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted job run history.
//!
//! Maps each job name to its last completed run, so frequency limits hold
//! across daemon restarts. Loaded at startup to seed the job graph, updated
//! after every completion.

use adminq_core::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

use crate::request_store::write_json_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogFile {
    last_runs: BTreeMap<String, DateTime<Utc>>,
}

/// Last-run times per job, mirrored to `job_log.json`.
pub struct JobLog {
    path: PathBuf,
    inner: Mutex<LogFile>,
}

impl JobLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let inner = if path.exists() {
            let json = fs::read_to_string(&path)?;
            let log: LogFile = serde_json::from_str(&json)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
            debug!(path = %path.display(), jobs = log.last_runs.len(), "loaded job log");
            log
        } else {
            LogFile::default()
        };
        Ok(Self {
            path,
            inner: Mutex::new(inner),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogFile> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a completed run and persist.
    pub fn record(&self, name: &str, finished_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.last_runs.insert(name.to_string(), finished_at);
        write_json_atomic(&self.path, &*inner)
    }

    pub fn last_run(&self, name: &str) -> Option<DateTime<Utc>> {
        self.lock().last_runs.get(name).copied()
    }

    /// All recorded runs, for seeding the job graph at startup.
    pub fn entries(&self) -> Vec<(String, DateTime<Utc>)> {
        self.lock()
            .last_runs
            .iter()
            .map(|(name, at)| (name.clone(), *at))
            .collect()
    }
}

#[cfg(test)]
#[path = "job_log_tests.rs"]
mod tests;
