// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, recovery, shutdown.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use adminq_core::{ConflictTable, RequestQueue, RequestStore, Scheduler, SystemClock};
use adminq_storage::{JobLog, JsonStore};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::jobs::{load_jobs, JobsError};
use crate::runner::{CommandJobRunner, LogRequestHandler};

pub type DaemonScheduler = Scheduler<SystemClock>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// State directory (requests, job log, lock, daemon log)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to job definitions
    pub jobs_path: PathBuf,
    /// Path to the persisted request queue
    pub requests_path: PathBuf,
    /// Path to the persisted job run history
    pub job_log_path: PathBuf,
}

impl Config {
    /// Build paths from the environment. `ADMINQ_STATE_DIR` and
    /// `ADMINQ_SOCKET` override the defaults, which tests rely on.
    pub fn from_env() -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        let socket_path = match std::env::var("ADMINQ_SOCKET") {
            Ok(path) => PathBuf::from(path),
            // /tmp keeps the path short (macOS SUN_LEN = 104)
            Err(_) => PathBuf::from("/tmp/adminq").join("adminqd.sock"),
        };
        Ok(Self {
            socket_path,
            lock_path: state_dir.join("adminqd.pid"),
            log_path: state_dir.join("adminqd.log"),
            jobs_path: state_dir.join("jobs.toml"),
            requests_path: state_dir.join("requests.json"),
            job_log_path: state_dir.join("job_log.json"),
            state_dir,
        })
    }
}

fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("ADMINQ_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("adminq"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/adminq"))
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Scheduler shared between the tick loop and protocol handlers
    pub scheduler: Arc<Mutex<DaemonScheduler>>,
    /// Persisted run history, updated after each completion
    pub job_log: Arc<JobLog>,
    /// When daemon started
    pub start_time: Instant,
    /// Shutdown requested flag
    pub shutdown_requested: bool,
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("jobs config error: {0}")]
    Jobs(#[from] JobsError),

    #[error("storage error: {0}")]
    Store(#[from] adminq_core::StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config) {
        Ok(state) => Ok(state),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Acquire lock file FIRST - prevents races
    let lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // Load and validate jobs BEFORE binding the socket (fail fast)
    let mut graph = load_jobs(&config.jobs_path)?;

    // Recover persisted state
    let store = Arc::new(JsonStore::open(&config.requests_path)?);
    let job_log = Arc::new(JobLog::open(&config.job_log_path)?);
    for (name, last_run) in job_log.entries() {
        if graph.seed_last_run(&name, last_run).is_err() {
            warn!(job = %name, "run history for a job no longer configured");
        }
    }

    let pending = store
        .query(&adminq_core::RequestFilter::default(), None)
        .map_err(LifecycleError::Store)?
        .len();
    info!(
        jobs = graph.names().len(),
        pending_requests = pending,
        "state recovered"
    );

    let queue = RequestQueue::new(store, ConflictTable::default(), SystemClock);
    let scheduler = Scheduler::new(
        graph,
        queue,
        SystemClock,
        Arc::new(CommandJobRunner::new()),
        Arc::new(LogRequestHandler),
    );

    // Remove stale socket and bind LAST, after all validation passes
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(socket = %config.socket_path.display(), "daemon started");

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        scheduler: Arc::new(Mutex::new(scheduler)),
        job_log,
        start_time: Instant::now(),
        shutdown_requested: false,
    })
}

fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

impl DaemonState {
    pub fn lock_scheduler(&self) -> std::sync::MutexGuard<'_, DaemonScheduler> {
        self.scheduler.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One timer-driven pass: tick the scheduler and persist completions.
    pub fn tick(&mut self) {
        let outcome = {
            let mut scheduler = self.lock_scheduler();
            scheduler.tick()
        };
        match outcome {
            Ok(outcome) => {
                for job in &outcome.completed {
                    if let Err(e) = self.job_log.record(&job.name, job.finished_at) {
                        warn!(job = %job.name, error = %e, "failed to persist job completion");
                    }
                }
            }
            Err(e) => warn!(error = %e, "tick failed"),
        }
    }

    /// Shutdown gracefully: stop dispatching, wait for in-flight work,
    /// persist final completions, remove socket and PID files.
    pub async fn shutdown(&mut self) {
        info!("shutting down");
        self.lock_scheduler().shutdown();

        // Drain in-flight work without holding the scheduler lock across
        // an await, so this future stays Send.
        loop {
            let remaining = {
                let mut scheduler = self.lock_scheduler();
                match scheduler.tick() {
                    Ok(outcome) => {
                        for job in &outcome.completed {
                            if let Err(e) = self.job_log.record(&job.name, job.finished_at) {
                                warn!(job = %job.name, error = %e, "failed to persist job completion");
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "completion drain failed"),
                }
                scheduler.inflight()
            };
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("failed to remove socket file: {}", e);
            }
        }
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("failed to remove PID file: {}", e);
            }
        }
        // lock released when self.lock_file drops

        info!("shutdown complete");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
