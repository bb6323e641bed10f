//! Daemon lifecycle specs over the control socket.

use crate::prelude::*;
use adminq_daemon::protocol::{Request, Response};

const JOBS: &str = r#"
[jobs.backup]
command = ["true"]
max_freq = "1h"
"#;

#[tokio::test]
async fn ping_answers_over_the_socket() {
    let daemon = TestDaemon::start(JOBS);
    assert!(matches!(daemon.send(&Request::Ping).await, Response::Pong));
    daemon.stop().await;
}

#[tokio::test]
async fn status_shows_registered_jobs() {
    let daemon = TestDaemon::start(JOBS);
    let body = daemon.send_text(&Request::Status).await;
    assert!(body.contains("backup"));
    assert!(body.contains("pending requests: 0"));
    daemon.stop().await;
}

#[tokio::test]
async fn shutdown_removes_socket_and_pid() {
    let daemon = TestDaemon::start(JOBS);
    let socket = daemon.socket_path.clone();
    let pid = daemon.config.lock_path.clone();
    assert!(socket.exists());
    assert!(pid.exists());

    daemon.stop().await;
    assert!(!socket.exists());
    assert!(!pid.exists());
}

#[tokio::test]
async fn pause_halts_dispatch_until_resume() {
    let daemon = TestDaemon::start(JOBS);
    assert!(matches!(daemon.send(&Request::Pause).await, Response::Ok));

    let body = daemon.send_text(&Request::Status).await;
    assert!(body.contains("(paused)"));

    assert!(matches!(daemon.send(&Request::Resume).await, Response::Ok));
    let body = daemon.send_text(&Request::Status).await;
    assert!(!body.contains("(paused)"));
    daemon.stop().await;
}
