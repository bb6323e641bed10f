//! Forced job runs end to end: wire request, process execution,
//! run history.

use crate::prelude::*;
use adminq_daemon::protocol::{Request, Response};

#[tokio::test]
async fn forced_run_executes_the_command() {
    let scratch = tempfile::TempDir::new().unwrap();
    let marker = scratch.path().join("ran");
    let jobs = format!(
        "[jobs.touch-marker]\ncommand = [\"touch\", \"{}\"]\nmax_freq = \"1h\"\n",
        marker.display()
    );
    let daemon = TestDaemon::start(&jobs);

    let body = daemon
        .send_text(&Request::RunJob {
            name: "touch-marker".into(),
            with_deps: false,
        })
        .await;
    assert!(body.contains("touch-marker"));

    eventually(|| async { marker.exists() }, "job command to run").await;
    daemon.stop().await;
}

#[tokio::test]
async fn run_recorded_in_job_history() {
    let jobs = "[jobs.backup]\ncommand = [\"true\"]\nmax_freq = \"1h\"\n";
    let daemon = TestDaemon::start(jobs);

    daemon
        .send_text(&Request::RunJob {
            name: "backup".into(),
            with_deps: false,
        })
        .await;

    eventually(
        || async {
            let body = daemon
                .send_text(&Request::ShowJob {
                    name: "backup".into(),
                })
                .await;
            body.contains("last status: ok")
        },
        "run to land in history",
    )
    .await;
    daemon.stop().await;
}

#[tokio::test]
async fn dependency_chain_runs_in_order() {
    let jobs = r#"
[jobs.backup]
command = ["true"]
max_freq = "1h"

[jobs.report]
pre = ["backup"]
command = ["true"]
max_freq = "1h"
"#;
    let daemon = TestDaemon::start(jobs);

    let body = daemon
        .send_text(&Request::RunJob {
            name: "report".into(),
            with_deps: true,
        })
        .await;
    assert!(body.contains("backup, report"));
    daemon.stop().await;
}

#[tokio::test]
async fn unknown_job_is_rejected() {
    let daemon = TestDaemon::start("");
    let response = daemon
        .send(&Request::RunJob {
            name: "nope".into(),
            with_deps: false,
        })
        .await;
    assert!(matches!(response, Response::Error { .. }));
    daemon.stop().await;
}
