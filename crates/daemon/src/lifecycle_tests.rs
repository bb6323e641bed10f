// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> Config {
    let state_dir = dir.path().to_path_buf();
    Config {
        socket_path: state_dir.join("adminqd.sock"),
        lock_path: state_dir.join("adminqd.pid"),
        log_path: state_dir.join("adminqd.log"),
        jobs_path: state_dir.join("jobs.toml"),
        requests_path: state_dir.join("requests.json"),
        job_log_path: state_dir.join("job_log.json"),
        state_dir,
    }
}

#[tokio::test]
async fn startup_binds_socket_and_writes_pid() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let daemon = startup(&config).unwrap();
    assert!(config.socket_path.exists());

    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    drop(daemon);
}

#[tokio::test]
async fn second_startup_fails_while_lock_held() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let _daemon = startup(&config).unwrap();
    let second = config.clone();
    assert!(matches!(
        startup(&second),
        Err(LifecycleError::LockFailed(_))
    ));
}

#[tokio::test]
async fn invalid_jobs_file_is_startup_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::write(
        &config.jobs_path,
        "[jobs.a]\npre = [\"b\"]\n[jobs.b]\npre = [\"a\"]\n",
    )
    .unwrap();

    assert!(matches!(startup(&config), Err(LifecycleError::Jobs(_))));
    // failed startup must not leave a socket or stale lock behind
    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
}

#[tokio::test]
async fn shutdown_removes_socket_and_pid() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let mut daemon = startup(&config).unwrap();
    daemon.shutdown().await;

    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
}

#[tokio::test]
async fn job_history_seeds_the_graph() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    std::fs::write(&config.jobs_path, "[jobs.backup]\nmax_freq = \"1h\"\n").unwrap();

    let last_run = chrono::Utc::now() - chrono::Duration::minutes(5);
    {
        let log = JobLog::open(&config.job_log_path).unwrap();
        log.record("backup", last_run).unwrap();
    }

    let daemon = startup(&config).unwrap();
    let scheduler = daemon.lock_scheduler();
    let report = scheduler.job_report("backup").unwrap();
    assert_eq!(report.last_run_at, Some(last_run));
}
