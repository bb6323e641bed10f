// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definitions and eligibility rules.
//!
//! A [`JobGraph`] holds the registered jobs and answers whether a job may
//! run at a given instant: due by frequency, not already running, and not
//! blocked by a held lock. Dependency expansion turns one job name into the
//! full pre/post chain with cycle detection.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("job {0} is already registered")]
    DuplicateJob(String),

    #[error("unknown job {0}")]
    UnknownJob(String),

    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },
}

/// Outcome of the most recent completed run, kept for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Ok,
    Failed,
}

/// A named unit of schedulable work.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub pre: Vec<String>,
    pub post: Vec<String>,
    pub max_freq: Option<Duration>,
    pub locks: BTreeSet<String>,
    pub command: Option<Vec<String>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub running: bool,
    pub last_status: Option<JobStatus>,
    pub last_duration: Option<Duration>,
}

impl Job {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pre: Vec::new(),
            post: Vec::new(),
            max_freq: None,
            locks: BTreeSet::new(),
            command: None,
            last_run_at: None,
            running: false,
            last_status: None,
            last_duration: None,
        }
    }

    pub fn pre(mut self, names: &[&str]) -> Self {
        self.pre = names.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn post(mut self, names: &[&str]) -> Self {
        self.post = names.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn max_freq(mut self, freq: Duration) -> Self {
        self.max_freq = Some(freq);
        self
    }

    pub fn lock(mut self, name: impl Into<String>) -> Self {
        self.locks.insert(name.into());
        self
    }

    pub fn command(mut self, argv: &[&str]) -> Self {
        self.command = Some(argv.iter().map(|s| (*s).to_string()).collect());
        self
    }

    pub fn last_run_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_run_at = Some(at);
        self
    }
}

/// Registered jobs plus the eligibility and expansion rules over them.
#[derive(Debug, Default)]
pub struct JobGraph {
    jobs: BTreeMap<String, Job>,
    // registration order, used for deterministic dispatch
    order: Vec<String>,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job: Job) -> Result<(), GraphError> {
        if self.jobs.contains_key(&job.name) {
            return Err(GraphError::DuplicateJob(job.name));
        }
        self.order.push(job.name.clone());
        self.jobs.insert(job.name.clone(), job);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Job, GraphError> {
        self.jobs
            .get(name)
            .ok_or_else(|| GraphError::UnknownJob(name.to_string()))
    }

    /// Jobs in registration order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.order.iter().filter_map(|name| self.jobs.get(name))
    }

    /// Job names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// True iff the job has never run, has no frequency bound, or enough
    /// time has passed since the last run.
    pub fn is_due(&self, name: &str, now: DateTime<Utc>) -> Result<bool, GraphError> {
        let job = self.get(name)?;
        Ok(match (job.last_run_at, job.max_freq) {
            (None, _) | (_, None) => true,
            (Some(last), Some(freq)) => now - last >= freq,
        })
    }

    /// Due, not currently running, and no lock held by another job.
    pub fn can_run_now(
        &self,
        name: &str,
        now: DateTime<Utc>,
        running_locks: &BTreeSet<String>,
    ) -> Result<bool, GraphError> {
        let job = self.get(name)?;
        Ok(self.is_due(name, now)?
            && !job.running
            && job.locks.is_disjoint(running_locks))
    }

    /// Expand a job into its dependency-ordered run sequence.
    ///
    /// With `honor_deps` the result is `pre* name post*`, each pre/post
    /// recursively expanded the same way. A name reappearing on the current
    /// expansion path is a cycle.
    pub fn expand_with_dependencies(
        &self,
        name: &str,
        honor_deps: bool,
    ) -> Result<Vec<String>, GraphError> {
        if !honor_deps {
            self.get(name)?;
            return Ok(vec![name.to_string()]);
        }
        let mut order = Vec::new();
        let mut path = Vec::new();
        self.expand_into(name, &mut path, &mut order)?;
        Ok(order)
    }

    fn expand_into(
        &self,
        name: &str,
        path: &mut Vec<String>,
        order: &mut Vec<String>,
    ) -> Result<(), GraphError> {
        if path.iter().any(|seen| seen == name) {
            let mut cycle = path.clone();
            cycle.push(name.to_string());
            return Err(GraphError::DependencyCycle { path: cycle });
        }
        let job = self.get(name)?;
        path.push(name.to_string());
        for pre in &job.pre {
            self.expand_into(pre, path, order)?;
        }
        if !order.iter().any(|n| n == name) {
            order.push(name.to_string());
        }
        for post in &job.post {
            self.expand_into(post, path, order)?;
        }
        path.pop();
        Ok(())
    }

    /// Startup check: every pre/post reference resolves and every job
    /// expands without a cycle.
    pub fn validate(&self) -> Result<(), GraphError> {
        for name in self.jobs.keys() {
            self.expand_with_dependencies(name, true)?;
        }
        Ok(())
    }

    /// Set `last_run_at` from persisted history, e.g. at daemon startup.
    pub fn seed_last_run(
        &mut self,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<(), GraphError> {
        let job = self
            .jobs
            .get_mut(name)
            .ok_or_else(|| GraphError::UnknownJob(name.to_string()))?;
        job.last_run_at = Some(at);
        Ok(())
    }

    pub fn job_started(&mut self, name: &str) -> Result<(), GraphError> {
        let job = self
            .jobs
            .get_mut(name)
            .ok_or_else(|| GraphError::UnknownJob(name.to_string()))?;
        job.running = true;
        Ok(())
    }

    /// Record completion. `last_run_at` advances whether the run succeeded
    /// or failed, so a broken job still counts against its frequency limit
    /// instead of hot-looping.
    pub fn job_finished(
        &mut self,
        name: &str,
        now: DateTime<Utc>,
        status: JobStatus,
        duration: Duration,
    ) -> Result<(), GraphError> {
        let job = self
            .jobs
            .get_mut(name)
            .ok_or_else(|| GraphError::UnknownJob(name.to_string()))?;
        job.running = false;
        job.last_run_at = Some(now);
        job.last_status = Some(status);
        job.last_duration = Some(duration);
        Ok(())
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
