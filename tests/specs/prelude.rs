//! Shared harness for wire-level specs: a real daemon state served over
//! a unix socket in a scratch directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use adminq_daemon::lifecycle::{self, Config};
use adminq_daemon::protocol::{self, Request, Response};
use adminq_daemon::server;
use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;

/// Lay out daemon paths inside a scratch directory.
pub fn config_in(dir: &Path) -> Config {
    let state_dir = dir.to_path_buf();
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

pub struct TestDaemon {
    pub socket_path: PathBuf,
    pub config: Config,
    handle: JoinHandle<()>,
    // keeps the scratch directory alive for the daemon's lifetime
    _dir: Option<TempDir>,
}

impl TestDaemon {
    /// Start a daemon with the given jobs.toml content in a fresh
    /// scratch directory, serving its socket until shutdown.
    pub fn start(jobs_toml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        std::fs::write(&config.jobs_path, jobs_toml).unwrap();
        let mut daemon = Self::start_with_config(config);
        daemon._dir = Some(dir);
        daemon
    }

    /// Start against an existing state directory; the caller keeps the
    /// directory alive.
    pub fn start_with_config(config: Config) -> Self {
        let mut daemon = lifecycle::startup(&config).unwrap();
        let socket_path = config.socket_path.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = daemon.listener.accept() => {
                        if let Ok((stream, _)) = result {
                            let _ = server::handle_connection(&mut daemon, stream).await;
                        }
                    }
                    _ = tokio::time::sleep(Duration::from_millis(20)) => {
                        daemon.tick();
                    }
                }
                if daemon.shutdown_requested {
                    daemon.shutdown().await;
                    break;
                }
            }
        });

        Self {
            socket_path,
            config,
            handle,
            _dir: None,
        }
    }

    /// One request/response exchange over the socket.
    pub async fn send(&self, request: &Request) -> Response {
        let stream = UnixStream::connect(&self.socket_path).await.unwrap();
        let (mut reader, mut writer) = stream.into_split();
        let data = protocol::encode(request).unwrap();
        protocol::write_message(&mut writer, &data).await.unwrap();
        let bytes = protocol::read_message(&mut reader).await.unwrap();
        protocol::decode(&bytes).unwrap()
    }

    /// Send the request and expect a Text response.
    pub async fn send_text(&self, request: &Request) -> String {
        match self.send(request).await {
            Response::Text { body } => body,
            other => panic!("expected text, got {other:?}"),
        }
    }

    /// Request shutdown and wait for the serve loop to finish.
    pub async fn stop(self) {
        match self.send(&Request::Shutdown).await {
            Response::ShuttingDown => {}
            other => panic!("expected shutting-down, got {other:?}"),
        }
        self.handle.await.unwrap();
    }
}

/// Poll `check` until it passes or a deadline expires.
pub async fn eventually<F, Fut>(check: F, what: &str)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}
