// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch loop tying the request queue and the job graph together.
//!
//! One scheduler instance is owned by the daemon's main routine and shared
//! with protocol handlers behind a single mutex, so every check-then-act
//! (lock checks, forced runs, request admission into dispatch) happens under
//! the same serialization point. Execution itself runs on spawned tasks that
//! report back over a completion channel; `tick` never blocks on a job.

use crate::clock::Clock;
use crate::graph::{GraphError, Job, JobGraph, JobStatus};
use crate::queue::{QueueError, RequestQueue};
use crate::request::{Request, RequestId};
use crate::store::RequestFilter;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job {0} is already running or queued for a forced run")]
    Busy(String),

    #[error("job {job} needs lock {lock}, held by a running job")]
    LockHeld { job: String, lock: String },

    #[error("scheduler is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to start job: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("job failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
#[error("request handler failed: {0}")]
pub struct HandlerError(pub String);

/// Snapshot handed to a [`JobRunner`]; the runner never touches the graph.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub command: Option<Vec<String>>,
}

/// Executes one job to completion.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, spec: JobSpec) -> Result<(), JobError>;
}

/// Performs the side effects of one due request.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: Request) -> Result<(), HandlerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Ticking,
    Dispatching,
    ShuttingDown,
}

/// What a spawned task reports back when it finishes.
#[derive(Debug)]
pub enum Completion {
    Job {
        name: String,
        status: JobStatus,
        finished_at: DateTime<Utc>,
        duration: Duration,
    },
    Request {
        id: RequestId,
        result: Result<(), HandlerError>,
    },
}

/// A job completion surfaced by `tick`, for the caller to persist.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub name: String,
    pub status: JobStatus,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
}

/// What one `tick` did.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub completed: Vec<CompletedJob>,
    pub dispatched_jobs: Vec<String>,
    pub dispatched_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningJob {
    pub name: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub name: String,
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_ok: Option<bool>,
    pub last_duration_secs: Option<i64>,
}

/// Snapshot backing the STATUS command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: SchedulerState,
    pub paused: bool,
    pub running: Vec<RunningJob>,
    pub forced_queue: Vec<String>,
    pub jobs: Vec<JobSummary>,
    pub pending_requests: usize,
}

/// Snapshot backing the SHOWJOB command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub name: String,
    pub pre: Vec<String>,
    pub post: Vec<String>,
    pub max_freq_secs: Option<i64>,
    pub locks: Vec<String>,
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_ok: Option<bool>,
    pub last_duration_secs: Option<i64>,
}

pub struct Scheduler<C: Clock> {
    graph: JobGraph,
    queue: RequestQueue<C>,
    clock: C,
    runner: Arc<dyn JobRunner>,
    handler: Arc<dyn RequestHandler>,
    state: SchedulerState,
    paused: bool,
    running_locks: BTreeSet<String>,
    running_jobs: BTreeMap<String, DateTime<Utc>>,
    forced: VecDeque<String>,
    // name of the forced job currently in flight; forced runs are strictly
    // one at a time
    forced_inflight: Option<String>,
    inflight: usize,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<C: Clock + 'static> Scheduler<C> {
    pub fn new(
        graph: JobGraph,
        queue: RequestQueue<C>,
        clock: C,
        runner: Arc<dyn JobRunner>,
        handler: Arc<dyn RequestHandler>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            graph,
            queue,
            clock,
            runner,
            handler,
            state: SchedulerState::Idle,
            paused: false,
            running_locks: BTreeSet::new(),
            running_jobs: BTreeMap::new(),
            forced: VecDeque::new(),
            forced_inflight: None,
            inflight: 0,
            completions_tx,
            completions_rx,
        }
    }

    pub fn queue(&self) -> &RequestQueue<C> {
        &self.queue
    }

    pub fn graph(&self) -> &JobGraph {
        &self.graph
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Spawned jobs and request handlers that have not reported back yet.
    pub fn inflight(&self) -> usize {
        self.inflight
    }

    pub fn pause(&mut self) {
        self.paused = true;
        info!("scheduler paused");
    }

    pub fn resume(&mut self) {
        self.paused = false;
        info!("scheduler resumed");
    }

    /// Stop dispatching. In-flight work keeps running; the caller drains it
    /// with [`Scheduler::wait_for_inflight`] before exiting.
    pub fn shutdown(&mut self) {
        self.state = SchedulerState::ShuttingDown;
        info!("scheduler shutting down");
    }

    /// Queue an operator-forced run of `name` (plus its dependency chain
    /// when `honor_deps`). The whole chain is accepted or rejected as a
    /// unit: any member already running, already queued for a forced run,
    /// or blocked on a held lock rejects the request. Frequency limits are
    /// not consulted for forced runs.
    pub fn run_job(
        &mut self,
        name: &str,
        honor_deps: bool,
    ) -> Result<Vec<String>, SchedulerError> {
        if self.state == SchedulerState::ShuttingDown {
            return Err(SchedulerError::ShuttingDown);
        }
        let chain = self.graph.expand_with_dependencies(name, honor_deps)?;
        for job_name in &chain {
            let job = self.graph.get(job_name)?;
            if job.running || self.forced.contains(job_name) {
                return Err(SchedulerError::Busy(job_name.clone()));
            }
            if let Some(lock) = job.locks.intersection(&self.running_locks).next() {
                return Err(SchedulerError::LockHeld {
                    job: job_name.clone(),
                    lock: lock.clone(),
                });
            }
        }
        info!(job = name, ?chain, "forced run queued");
        self.forced.extend(chain.iter().cloned());
        Ok(chain)
    }

    /// One pass of the dispatch loop: drain completions, then start
    /// whatever is due. Never blocks on job execution.
    pub fn tick(&mut self) -> Result<TickOutcome, SchedulerError> {
        let mut outcome = TickOutcome {
            completed: self.drain_completions(),
            ..TickOutcome::default()
        };

        if self.state == SchedulerState::ShuttingDown || self.paused {
            return Ok(outcome);
        }
        self.state = SchedulerState::Ticking;

        self.dispatch_forced(&mut outcome)?;
        self.dispatch_requests(&mut outcome)?;
        self.dispatch_due_jobs(&mut outcome)?;

        self.state = SchedulerState::Idle;
        Ok(outcome)
    }

    fn dispatch_forced(&mut self, outcome: &mut TickOutcome) -> Result<(), SchedulerError> {
        if self.forced_inflight.is_some() {
            return Ok(());
        }
        let Some(name) = self.forced.front().cloned() else {
            return Ok(());
        };
        let job = self.graph.get(&name)?;
        // forced runs skip the frequency check but still wait for locks
        if job.running || !job.locks.is_disjoint(&self.running_locks) {
            return Ok(());
        }
        self.forced.pop_front();
        self.forced_inflight = Some(name.clone());
        self.state = SchedulerState::Dispatching;
        self.dispatch_job(&name)?;
        outcome.dispatched_jobs.push(name);
        Ok(())
    }

    fn dispatch_requests(&mut self, outcome: &mut TickOutcome) -> Result<(), SchedulerError> {
        for request in self.queue.due_requests()? {
            self.state = SchedulerState::Dispatching;
            // at-most-once: the row is gone before the handler runs, so a
            // crash mid-execution loses the request rather than repeating it
            self.queue.remove(&RequestFilter::by_id(request.id))?;
            info!(
                request = %request.id,
                operation = %request.operation,
                "dispatching request"
            );
            let handler = Arc::clone(&self.handler);
            let tx = self.completions_tx.clone();
            self.inflight += 1;
            tokio::spawn(async move {
                let id = request.id;
                let result = handler.handle(request).await;
                let _ = tx.send(Completion::Request { id, result });
            });
            outcome.dispatched_requests += 1;
        }
        Ok(())
    }

    fn dispatch_due_jobs(&mut self, outcome: &mut TickOutcome) -> Result<(), SchedulerError> {
        let now = self.clock.now();
        for name in self.graph.names() {
            if !self.graph.can_run_now(&name, now, &self.running_locks)? {
                continue;
            }
            if self.forced.contains(&name) || self.forced_inflight.as_deref() == Some(&name) {
                continue;
            }
            self.state = SchedulerState::Dispatching;
            self.dispatch_job(&name)?;
            outcome.dispatched_jobs.push(name);
        }
        Ok(())
    }

    fn dispatch_job(&mut self, name: &str) -> Result<(), SchedulerError> {
        let started_at = self.clock.now();
        self.graph.job_started(name)?;
        let job = self.graph.get(name)?;
        self.running_locks.extend(job.locks.iter().cloned());
        self.running_jobs.insert(name.to_string(), started_at);
        info!(job = name, "dispatching job");

        let spec = JobSpec {
            name: name.to_string(),
            command: job.command.clone(),
        };
        let runner = Arc::clone(&self.runner);
        let clock = self.clock.clone();
        let tx = self.completions_tx.clone();
        self.inflight += 1;
        tokio::spawn(async move {
            let name = spec.name.clone();
            let status = match runner.run(spec).await {
                Ok(()) => JobStatus::Ok,
                Err(err) => {
                    error!(job = %name, %err, "job failed");
                    JobStatus::Failed
                }
            };
            let finished_at = clock.now();
            let _ = tx.send(Completion::Job {
                name,
                status,
                finished_at,
                duration: finished_at - started_at,
            });
        });
        Ok(())
    }

    fn drain_completions(&mut self) -> Vec<CompletedJob> {
        let mut completed = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            if let Some(job) = self.process_completion(completion) {
                completed.push(job);
            }
        }
        completed
    }

    fn process_completion(&mut self, completion: Completion) -> Option<CompletedJob> {
        self.inflight = self.inflight.saturating_sub(1);
        match completion {
            Completion::Job {
                name,
                status,
                finished_at,
                duration,
            } => {
                if self.forced_inflight.as_deref() == Some(&name) {
                    self.forced_inflight = None;
                }
                self.running_jobs.remove(&name);
                if let Ok(job) = self.graph.get(&name) {
                    for lock in job.locks.clone() {
                        self.running_locks.remove(&lock);
                    }
                }
                if let Err(err) = self.graph.job_finished(&name, finished_at, status, duration)
                {
                    warn!(job = %name, %err, "completion for unknown job");
                    return None;
                }
                debug!(job = %name, ?status, "job finished");
                Some(CompletedJob {
                    name,
                    status,
                    finished_at,
                    duration,
                })
            }
            Completion::Request { id, result } => {
                if let Err(err) = result {
                    warn!(request = %id, %err, "request handler failed");
                }
                None
            }
        }
    }

    /// Block until every spawned job and request handler has reported back.
    /// Used on shutdown so no execution is abandoned mid-write.
    pub async fn wait_for_inflight(&mut self) -> Vec<CompletedJob> {
        let mut completed = Vec::new();
        while self.inflight > 0 {
            match self.completions_rx.recv().await {
                Some(completion) => {
                    if let Some(job) = self.process_completion(completion) {
                        completed.push(job);
                    }
                }
                None => break,
            }
        }
        completed
    }

    pub fn status_report(&self) -> Result<StatusReport, SchedulerError> {
        let pending = self.queue.requests(&RequestFilter::default())?.len();
        Ok(StatusReport {
            state: self.state,
            paused: self.paused,
            running: self
                .running_jobs
                .iter()
                .map(|(name, started_at)| RunningJob {
                    name: name.clone(),
                    started_at: *started_at,
                })
                .collect(),
            forced_queue: self.forced.iter().cloned().collect(),
            jobs: self.graph.jobs().map(summarize).collect(),
            pending_requests: pending,
        })
    }

    pub fn job_report(&self, name: &str) -> Result<JobReport, SchedulerError> {
        let job = self.graph.get(name)?;
        Ok(JobReport {
            name: job.name.clone(),
            pre: job.pre.clone(),
            post: job.post.clone(),
            max_freq_secs: job.max_freq.map(|d| d.num_seconds()),
            locks: job.locks.iter().cloned().collect(),
            running: job.running,
            last_run_at: job.last_run_at,
            last_ok: job.last_status.map(|s| s == JobStatus::Ok),
            last_duration_secs: job.last_duration.map(|d| d.num_seconds()),
        })
    }
}

fn summarize(job: &Job) -> JobSummary {
    JobSummary {
        name: job.name.clone(),
        running: job.running,
        last_run_at: job.last_run_at,
        last_ok: job.last_status.map(|s| s == JobStatus::Ok),
        last_duration_secs: job.last_duration.map(|d| d.num_seconds()),
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
