//! Worker process launcher
//!
//! Starts the worker binary once per pool slot and stops the pool with
//! SIGTERM, falling back to a hard kill after a grace period.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use shared::{process_debug, process_error, process_warn, HealthCheckConfig, ProcessIdentity, WorkerId};

use crate::error::{PrimaryError, PrimaryResult};
use crate::traits::{LaunchedWorker, WorkerLauncher};

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

pub struct RealWorkerLauncher {
    worker_bin: PathBuf,
    log_level: String,
    config: HealthCheckConfig,
    grace_period: Duration,
    children: Mutex<BTreeMap<WorkerId, Child>>,
}

impl RealWorkerLauncher {
    pub fn new(worker_bin: impl Into<PathBuf>) -> Self {
        Self {
            worker_bin: worker_bin.into(),
            log_level: "info".to_string(),
            config: HealthCheckConfig::default(),
            grace_period: DEFAULT_GRACE_PERIOD,
            children: Mutex::new(BTreeMap::new()),
        }
    }

    /// Log level passed down to workers (fluent API)
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    /// Health-check tunables passed down to workers (fluent API)
    pub fn with_config(mut self, config: HealthCheckConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub async fn running(&self) -> usize {
        self.children.lock().await.len()
    }

    /// Command line for one worker, without spawning it
    pub fn command_for(&self, worker_id: WorkerId, pool_size: u32, primary_addr: SocketAddr) -> Command {
        let mut cmd = Command::new(&self.worker_bin);
        cmd.arg("--worker-id")
            .arg(worker_id.0.to_string())
            .arg("--primary-addr")
            .arg(primary_addr.to_string())
            .arg("--pool-size")
            .arg(pool_size.to_string())
            .arg("--log-level")
            .arg(&self.log_level)
            .arg("--request-timeout-ms")
            .arg(self.config.request_timeout.as_millis().to_string())
            .arg("--sample-interval-ms")
            .arg(self.config.sample_interval.as_millis().to_string());

        if let Some(report) = self.config.report_interval {
            cmd.arg("--report-interval-secs").arg(report.as_secs().to_string());
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    async fn stop_child(worker_id: WorkerId, mut child: Child, grace_period: Duration) {
        let identity = ProcessIdentity::current();

        if let Some(pid) = child.id() {
            request_termination(pid);
            match tokio::time::timeout(grace_period, child.wait()).await {
                Ok(Ok(status)) => {
                    process_debug!(identity, "🛑 Worker {} exited with {}", worker_id, status);
                    return;
                }
                Ok(Err(e)) => {
                    process_warn!(identity, "⚠️ Waiting for worker {} failed: {}", worker_id, e);
                }
                Err(_) => {
                    process_warn!(
                        identity,
                        "🔨 Worker {} ignored SIGTERM for {:?}, killing",
                        worker_id,
                        grace_period
                    );
                }
            }
        }

        if let Err(e) = child.kill().await {
            process_debug!(identity, "Kill of worker {} failed: {}", worker_id, e);
        }
    }
}

#[cfg(unix)]
fn request_termination(pid: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => {
            process_warn!(ProcessIdentity::current(), "⚠️ SIGTERM to pid {} failed: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
fn request_termination(_pid: u32) {}

#[async_trait]
impl WorkerLauncher for RealWorkerLauncher {
    async fn spawn_workers(&self, count: u32, primary_addr: SocketAddr) -> PrimaryResult<Vec<LaunchedWorker>> {
        let identity = ProcessIdentity::current();
        let mut launched = Vec::new();
        let mut children = self.children.lock().await;

        for id in 1..=count {
            let worker_id = WorkerId(id);
            match self.command_for(worker_id, count, primary_addr).spawn() {
                Ok(child) => {
                    let process_id = child.id().unwrap_or(0);
                    process_debug!(
                        identity,
                        "🏭 Spawned worker {} (pid {}) connecting to {}",
                        worker_id,
                        process_id,
                        primary_addr
                    );
                    children.insert(worker_id, child);
                    launched.push(LaunchedWorker {
                        worker_id,
                        process_id,
                    });
                }
                Err(e) => {
                    process_error!(identity, "⚠️ Failed to spawn worker {}: {}", worker_id, e);
                }
            }
        }

        if launched.is_empty() && count > 0 {
            return Err(PrimaryError::WorkerSpawnFailed {
                worker_id: WorkerId(1),
            });
        }

        Ok(launched)
    }

    async fn reap_exited(&self) -> PrimaryResult<Vec<WorkerId>> {
        let mut children = self.children.lock().await;
        let mut exited = Vec::new();

        for (worker_id, child) in children.iter_mut() {
            match child.try_wait() {
                Ok(None) => {}
                Ok(Some(status)) => {
                    process_warn!(ProcessIdentity::current(), "💀 Worker {} exited with {}", worker_id, status);
                    exited.push(*worker_id);
                }
                Err(e) => {
                    return Err(PrimaryError::process(format!(
                        "Failed to poll worker {worker_id}: {e}"
                    )));
                }
            }
        }

        for worker_id in &exited {
            children.remove(worker_id);
        }
        Ok(exited)
    }

    async fn stop_all(&self) -> PrimaryResult<()> {
        let children = std::mem::take(&mut *self.children.lock().await);
        let count = children.len();

        let stops: Vec<_> = children
            .into_iter()
            .map(|(worker_id, child)| tokio::spawn(Self::stop_child(worker_id, child, self.grace_period)))
            .collect();
        for stop in stops {
            stop.await
                .map_err(|e| PrimaryError::process(format!("Stop task failed: {e}")))?;
        }

        process_debug!(ProcessIdentity::current(), "🛑 Stopped {} workers", count);
        Ok(())
    }
}
