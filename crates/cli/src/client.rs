// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::PathBuf;
use std::time::Duration;

use adminq_core::store::RequestFilter;
use adminq_core::{EntityId, Op, Request as QueuedRequest, RequestId};
use adminq_daemon::protocol::{self, ProtocolError};
use adminq_daemon::{Request, Response};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("ADMINQ_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running (no socket at {0})")]
    DaemonNotRunning(PathBuf),

    #[error("connection timeout when talking to the job runner")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve the control socket path the same way the daemon does.
pub fn socket_path() -> PathBuf {
    match std::env::var("ADMINQ_SOCKET") {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from("/tmp/adminq").join("adminqd.sock"),
    }
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    /// Connect to a running daemon (no auto-start). `timeout` overrides
    /// the env-configured IPC timeout.
    pub fn connect(timeout: Option<Duration>) -> Result<Self, ClientError> {
        let socket_path = socket_path();
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(socket_path));
        }
        Ok(Self {
            socket_path,
            timeout: timeout.unwrap_or_else(timeout_ipc),
        })
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(&request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ClientError::Timeout)??;

        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ClientError::Timeout)??;

        let response: Response = protocol::decode(&response_bytes)?;
        Ok(response)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, self.timeout, self.timeout)
            .await
    }

    /// Check that the daemon answers at all
    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(Request::Ping).await? {
            Response::Pong => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Fetch the formatted daemon status
    pub async fn status(&self) -> Result<String, ClientError> {
        self.expect_text(Request::Status).await
    }

    /// Fetch the formatted report for one job
    pub async fn show_job(&self, name: &str) -> Result<String, ClientError> {
        self.expect_text(Request::ShowJob {
            name: name.to_string(),
        })
        .await
    }

    /// Force a job run, optionally with its dependency chain
    pub async fn run_job(&self, name: &str, with_deps: bool) -> Result<String, ClientError> {
        self.expect_text(Request::RunJob {
            name: name.to_string(),
            with_deps,
        })
        .await
    }

    /// Queue a request; `run_at = None` places it in the nightly batch slot
    pub async fn queue_add(
        &self,
        requester_id: EntityId,
        operation: Op,
        target_id: Option<EntityId>,
        destination_id: Option<EntityId>,
        run_at: Option<DateTime<Utc>>,
        state_data: Option<String>,
    ) -> Result<RequestId, ClientError> {
        match self
            .send(Request::QueueAdd {
                requester_id,
                operation,
                target_id,
                destination_id,
                run_at,
                state_data,
            })
            .await?
        {
            Response::Added { id } => Ok(id),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// List queued requests matching a filter
    pub async fn queue_list(&self, filter: RequestFilter) -> Result<Vec<QueuedRequest>, ClientError> {
        match self.send(Request::QueueList { filter }).await? {
            Response::Requests { requests } => Ok(requests),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Push a queued request back by some minutes
    pub async fn queue_delay(&self, id: RequestId, minutes: i64) -> Result<String, ClientError> {
        self.expect_text(Request::QueueDelay { id, minutes }).await
    }

    /// Remove queued requests matching a filter
    pub async fn queue_remove(&self, filter: RequestFilter) -> Result<String, ClientError> {
        self.expect_text(Request::QueueRemove { filter }).await
    }

    /// Pause dispatch without stopping the daemon
    pub async fn pause(&self) -> Result<(), ClientError> {
        self.expect_ok(Request::Pause).await
    }

    /// Resume dispatch
    pub async fn resume(&self) -> Result<(), ClientError> {
        self.expect_ok(Request::Resume).await
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    async fn expect_text(&self, request: Request) -> Result<String, ClientError> {
        match self.send(request).await? {
            Response::Text { body } => Ok(body),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    async fn expect_ok(&self, request: Request) -> Result<(), ClientError> {
        match self.send(request).await? {
            Response::Ok => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
