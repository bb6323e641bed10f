// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use adminq_core::scheduler::{JobReport, StatusReport};
use adminq_core::store::NewRequest;
use adminq_core::{batch_run_at, Clock, SystemClock};
use tokio::net::UnixStream;
use tracing::{debug, error};

use crate::lifecycle::DaemonState;
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT};

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("request timeout")]
    Timeout,
}

/// Handle a single client connection
pub async fn handle_connection(
    daemon: &mut DaemonState,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("received request: {:?}", request);

    let response = handle_request(daemon, request);

    debug!("sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request under the scheduler mutex, so RUNJOB goes
/// through the exact admission check the tick loop uses.
fn handle_request(daemon: &mut DaemonState, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Status => {
            let scheduler = daemon.lock_scheduler();
            match scheduler.status_report() {
                Ok(report) => Response::Text {
                    body: format_status(&report, daemon.start_time.elapsed().as_secs()),
                },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::ShowJob { name } => {
            let scheduler = daemon.lock_scheduler();
            match scheduler.job_report(&name) {
                Ok(report) => Response::Text {
                    body: format_job(&report),
                },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::RunJob { name, with_deps } => {
            let mut scheduler = daemon.lock_scheduler();
            match scheduler.run_job(&name, with_deps) {
                Ok(chain) => Response::Text {
                    body: format!("queued forced run: {}", chain.join(", ")),
                },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::QueueAdd {
            requester_id,
            operation,
            target_id,
            destination_id,
            run_at,
            state_data,
        } => {
            let run_at = run_at.unwrap_or_else(|| batch_run_at(SystemClock.now()));
            let scheduler = daemon.lock_scheduler();
            match scheduler.queue().add(NewRequest {
                requester_id,
                run_at,
                operation,
                target_id,
                destination_id,
                state_data,
            }) {
                Ok(id) => Response::Added { id },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::QueueList { filter } => {
            let scheduler = daemon.lock_scheduler();
            match scheduler.queue().requests(&filter) {
                Ok(requests) => Response::Requests { requests },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::QueueDelay { id, minutes } => {
            let scheduler = daemon.lock_scheduler();
            match scheduler.queue().delay(id, minutes) {
                Ok(next) => Response::Text {
                    body: format!("request {id} delayed until {next}"),
                },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::QueueRemove { filter } => {
            let scheduler = daemon.lock_scheduler();
            match scheduler.queue().remove(&filter) {
                Ok(removed) => Response::Text {
                    body: format!("removed {removed} request(s)"),
                },
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::Pause => {
            daemon.lock_scheduler().pause();
            Response::Ok
        }

        Request::Resume => {
            daemon.lock_scheduler().resume();
            Response::Ok
        }

        Request::Shutdown => {
            daemon.shutdown_requested = true;
            Response::ShuttingDown
        }
    }
}

fn format_status(report: &StatusReport, uptime_secs: u64) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "uptime: {uptime_secs}s");
    let _ = writeln!(
        out,
        "state: {:?}{}",
        report.state,
        if report.paused { " (paused)" } else { "" }
    );
    let _ = writeln!(out, "pending requests: {}", report.pending_requests);

    if !report.running.is_empty() {
        let _ = writeln!(out, "running:");
        for job in &report.running {
            let _ = writeln!(out, "  {} (since {})", job.name, job.started_at);
        }
    }
    if !report.forced_queue.is_empty() {
        let _ = writeln!(out, "forced queue: {}", report.forced_queue.join(", "));
    }

    let _ = writeln!(out, "jobs:");
    for job in &report.jobs {
        let last = match job.last_run_at {
            Some(at) => at.to_string(),
            None => "never".to_string(),
        };
        let status = match job.last_ok {
            Some(true) => "ok",
            Some(false) => "FAILED",
            None => "-",
        };
        let _ = writeln!(out, "  {:<24} last run {last}  status {status}", job.name);
    }
    out
}

fn format_job(report: &JobReport) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "job: {}", report.name);
    if !report.pre.is_empty() {
        let _ = writeln!(out, "pre: {}", report.pre.join(", "));
    }
    if !report.post.is_empty() {
        let _ = writeln!(out, "post: {}", report.post.join(", "));
    }
    if let Some(secs) = report.max_freq_secs {
        let _ = writeln!(out, "max_freq: {secs}s");
    }
    if !report.locks.is_empty() {
        let _ = writeln!(out, "locks: {}", report.locks.join(", "));
    }
    let _ = writeln!(out, "running: {}", report.running);
    match report.last_run_at {
        Some(at) => {
            let _ = writeln!(out, "last run: {at}");
            if let Some(ok) = report.last_ok {
                let _ = writeln!(out, "last status: {}", if ok { "ok" } else { "FAILED" });
            }
            if let Some(secs) = report.last_duration_secs {
                let _ = writeln!(out, "last duration: {secs}s");
            }
        }
        None => {
            let _ = writeln!(out, "last run: never");
        }
    }
    out
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
