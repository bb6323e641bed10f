// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete execution for jobs and requests.

use adminq_core::scheduler::{HandlerError, JobError, JobRunner, JobSpec, RequestHandler};
use adminq_core::Request;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs a job's configured argv as a child process. A job without a command
/// is a grouping-only node and succeeds immediately.
#[derive(Debug, Default)]
pub struct CommandJobRunner;

impl CommandJobRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobRunner for CommandJobRunner {
    async fn run(&self, spec: JobSpec) -> Result<(), JobError> {
        let Some(argv) = spec.command.as_deref() else {
            debug!(job = %spec.name, "no command configured, nothing to run");
            return Ok(());
        };
        let Some((program, args)) = argv.split_first() else {
            return Err(JobError::Failed("empty command".to_string()));
        };

        debug!(job = %spec.name, command = ?argv, "spawning job process");
        let status = Command::new(program).args(args).status().await?;
        if !status.success() {
            return Err(JobError::Failed(format!("exited with {status}")));
        }
        Ok(())
    }
}

/// Records each dispatched request in the log. The daemon has no backend
/// of its own; real side effects belong to the system embedding the queue,
/// which supplies its own [`RequestHandler`].
#[derive(Debug, Default)]
pub struct LogRequestHandler;

#[async_trait]
impl RequestHandler for LogRequestHandler {
    async fn handle(&self, request: Request) -> Result<(), HandlerError> {
        info!(
            request = %request.id,
            operation = %request.operation,
            target = ?request.target_id,
            destination = ?request.destination_id,
            "processing request"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
