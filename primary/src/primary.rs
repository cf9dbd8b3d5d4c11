//! The primary process
//!
//! Owns the transport, the live worker registry and both halves of the
//! health-check protocol, and drives the pool lifecycle: accept workers,
//! launch them, reap exits, report, shut down.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Duration, Instant, Interval};

use shared::{
    logging, process_debug, process_info, process_warn, Bus, EventLoopMonitor, HealthCheck,
    HealthCheckConfig, MetricSources, MetricsRequester, PendingRequests, PrimaryTransport,
    ProcessIdentity, Shutdown, Target,
};

use crate::core::{LiveWorkers, PrimaryCoordinator};
use crate::error::{PrimaryError, PrimaryResult};
use crate::services::WorkerListener;
use crate::traits::{WorkerLauncher, WorkerRegistry};

const REAP_INTERVAL: Duration = Duration::from_secs(1);

pub struct Primary<L>
where
    L: WorkerLauncher + 'static,
{
    identity: ProcessIdentity,
    config: HealthCheckConfig,

    transport: Arc<PrimaryTransport>,
    bus: Bus,
    registry: LiveWorkers,
    health: HealthCheck,

    /// Injected services
    launcher: L,

    listen_addr: Option<SocketAddr>,
    background: Vec<JoinHandle<()>>,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<String>,
    shutdown_rx: mpsc::Receiver<String>,
}

impl<L> Primary<L>
where
    L: WorkerLauncher + 'static,
{
    /// Wire transport, registry, coordinator and requester together.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(identity: ProcessIdentity, config: HealthCheckConfig, launcher: L) -> Self {
        let transport = Arc::new(PrimaryTransport::new(identity));
        let bus = Bus::new(transport.clone());
        let registry = LiveWorkers::new();

        let (monitor, monitor_task) = EventLoopMonitor::spawn(config.sample_interval);
        let sources = MetricSources::standard(&monitor);

        let coordinator = PrimaryCoordinator::new(bus.clone(), Arc::new(registry.clone()), sources.clone());
        coordinator.install();

        let requester = MetricsRequester::new(
            bus.clone(),
            sources,
            PendingRequests::new(),
            Arc::new(registry.clone()),
            config.request_timeout,
        );
        requester.install();

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Self {
            identity,
            config,
            transport,
            bus,
            registry,
            health: HealthCheck::new(Arc::new(requester)),
            launcher,
            listen_addr: None,
            background: vec![monitor_task],
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Start accepting worker connections on `bind_addr`
    pub async fn initialize(&mut self, bind_addr: SocketAddr) -> PrimaryResult<SocketAddr> {
        let listener = WorkerListener::new(self.transport.clone(), self.registry.clone());
        let (addr, task) = listener.bind(bind_addr).await?;
        self.listen_addr = Some(addr);
        self.background.push(task);
        Ok(addr)
    }

    /// Launch `count` workers pointed at the bound address
    pub async fn spawn_workers(&self, count: u32) -> PrimaryResult<usize> {
        let addr = self
            .listen_addr
            .ok_or_else(|| PrimaryError::config("listen address not bound; call initialize first"))?;

        let launched = self.launcher.spawn_workers(count, addr).await?;
        if launched.len() < count as usize {
            process_warn!(self.identity, "⚠️ Only {}/{} workers launched", launched.len(), count);
        }
        process_info!(self.identity, "🚀 Launched {} workers", launched.len());
        Ok(launched.len())
    }

    pub fn identity(&self) -> ProcessIdentity {
        self.identity
    }

    pub fn health(&self) -> &HealthCheck {
        &self.health
    }

    pub fn registry(&self) -> &LiveWorkers {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<PrimaryTransport> {
        &self.transport
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Get shutdown sender for external shutdown requests; the message is
    /// the reason forwarded to workers
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<String> {
        self.shutdown_tx.clone()
    }

    /// Main loop until a shutdown request arrives
    pub async fn run(&mut self) -> PrimaryResult<()> {
        let mut reap_interval = interval(REAP_INTERVAL);
        let mut report_interval = self
            .config
            .report_interval
            .map(|period| interval_at(Instant::now() + period, period));

        let mut report: Option<JoinHandle<()>> = None;

        let reason = loop {
            tokio::select! {
                reason = self.shutdown_rx.recv() => {
                    break reason.unwrap_or_else(|| "shutdown channel closed".to_string());
                }
                _ = reap_interval.tick() => {
                    self.reap().await;
                }
                _ = next_tick(&mut report_interval) => {
                    spawn_report(&mut report, &self.health, self.identity);
                }
            }
        };

        if let Some(task) = report {
            task.abort();
        }
        self.shutdown(&reason).await
    }

    async fn reap(&self) {
        match self.launcher.reap_exited().await {
            Ok(exited) if !exited.is_empty() => {
                process_warn!(
                    self.identity,
                    "💀 Workers {:?} exited; {} still connected",
                    exited,
                    self.registry.len()
                );
            }
            Ok(_) => {}
            Err(e) => logging::log_error(&self.identity, "Reaping workers", &e),
        }
    }

    /// Tell workers to stop, then make sure their processes are gone
    pub async fn shutdown(&mut self, reason: &str) -> PrimaryResult<()> {
        process_debug!(self.identity, "🛑 Starting graceful shutdown...");

        let workers = self.registry.workers();
        if !workers.is_empty() {
            self.bus.emit(
                Target::Workers(&workers),
                &Shutdown {
                    reason: reason.to_string(),
                },
            )?;
        }

        self.launcher.stop_all().await?;

        for task in self.background.drain(..) {
            task.abort();
        }

        logging::log_shutdown(&self.identity, reason);
        Ok(())
    }
}

/// Start a report in the background unless the previous one is still waiting on peers
fn spawn_report(report: &mut Option<JoinHandle<()>>, health: &HealthCheck, identity: ProcessIdentity) {
    if report.as_ref().is_some_and(|task| !task.is_finished()) {
        process_debug!(identity, "⏭️ Previous report still running, skipping this tick");
        return;
    }
    let health = health.clone();
    *report = Some(tokio::spawn(async move {
        health.log_report(&identity).await;
    }));
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
