//! The worker process
//!
//! Wires the responder and requester halves of the health-check protocol onto
//! a transport connected to the primary, then runs until the primary asks it
//! to stop or goes away.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval};

use shared::{
    logging, process_debug, Bus, EventLoopMonitor, FixedPoolSize, HealthCheck, HealthCheckConfig,
    MetricSources, MetricsRequester, PendingRequests, ProcessIdentity, Shutdown, Source, Transport,
};

use crate::core::WorkerCoordinator;

pub struct Worker {
    identity: ProcessIdentity,
    config: HealthCheckConfig,
    bus: Bus,
    health: HealthCheck,
    background: Vec<JoinHandle<()>>,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<String>,
    shutdown_rx: mpsc::Receiver<String>,
}

impl Worker {
    /// `pool_size` is the number of workers in the pool, this one included.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: HealthCheckConfig,
        pool_size: usize,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let identity = transport.identity();
        let bus = Bus::new(transport);

        let (monitor, monitor_task) = EventLoopMonitor::spawn(config.sample_interval);
        let sources = MetricSources::standard(&monitor);

        WorkerCoordinator::new(bus.clone(), sources.clone()).install();

        let requester = MetricsRequester::new(
            bus.clone(),
            sources,
            PendingRequests::new(),
            Arc::new(FixedPoolSize(pool_size)),
            config.request_timeout,
        );
        requester.install();

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let on_shutdown = shutdown_tx.clone();
        bus.on(Source::Inbound, move |event: Shutdown| {
            // A full channel already holds a pending shutdown
            let _ = on_shutdown.try_send(event.reason);
        });

        Self {
            identity,
            config,
            bus,
            health: HealthCheck::new(Arc::new(requester)),
            background: vec![monitor_task],
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn identity(&self) -> ProcessIdentity {
        self.identity
    }

    pub fn health(&self) -> &HealthCheck {
        &self.health
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Get shutdown sender for external shutdown requests
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<String> {
        self.shutdown_tx.clone()
    }

    /// Run until asked to stop or until `disconnected` resolves.
    ///
    /// Returns the reason the worker stopped.
    pub async fn run<D>(&mut self, disconnected: D) -> String
    where
        D: Future<Output = ()>,
    {
        tokio::pin!(disconnected);
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
                _ = &mut disconnected => {
                    break "primary connection closed".to_string();
                }
                _ = next_tick(&mut report_interval) => {
                    spawn_report(&mut report, &self.health, self.identity);
                }
            }
        };

        process_debug!(self.identity, "🛑 Stopping background tasks");
        for task in self.background.drain(..).chain(report) {
            task.abort();
        }
        logging::log_shutdown(&self.identity, &reason);
        reason
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

#[cfg(test)]
mod tests {
    use super::*;
    use shared::transport::memory::connect;
    use shared::{MetricSnapshot, PrimaryTransport, Target, WorkerId};
    use std::time::Duration;
    use tokio::time::timeout;

    fn attached_worker(pool_size: usize) -> (Bus, shared::transport::memory::MemoryWorker, Worker) {
        let primary = Arc::new(PrimaryTransport::new(ProcessIdentity::primary(1)));
        let link = connect(&primary, ProcessIdentity::worker(WorkerId(1), 11));
        let worker = Worker::new(HealthCheckConfig::default(), pool_size, link.transport.clone());
        (Bus::new(primary), link, worker)
    }

    #[tokio::test]
    async fn test_shutdown_event_stops_run() {
        let (primary, link, mut worker) = attached_worker(1);

        primary
            .emit(
                Target::Workers(std::slice::from_ref(&link.handle)),
                &Shutdown {
                    reason: "pool stopping".into(),
                },
            )
            .unwrap();

        let reason = timeout(Duration::from_secs(1), worker.run(std::future::pending()))
            .await
            .unwrap();
        assert_eq!(reason, "pool stopping");
    }

    #[tokio::test]
    async fn test_disconnect_stops_run() {
        let (_primary, _link, mut worker) = attached_worker(1);

        let reason = timeout(Duration::from_secs(1), worker.run(async {}))
            .await
            .unwrap();
        assert_eq!(reason, "primary connection closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_report_does_not_delay_shutdown() {
        let primary = Arc::new(PrimaryTransport::new(ProcessIdentity::primary(1)));
        let link = connect(&primary, ProcessIdentity::worker(WorkerId(1), 11));
        let config = HealthCheckConfig {
            report_interval: Some(Duration::from_millis(100)),
            ..HealthCheckConfig::default()
        };
        // Nobody on the primary side answers, so every report waits out the timeout
        let mut worker = Worker::new(config.clone(), 3, link.transport.clone());

        let shutdown = worker.get_shutdown_sender();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            let _ = shutdown.send("stop".to_string()).await;
        });

        let started = Instant::now();
        let reason = worker.run(std::future::pending()).await;
        assert_eq!(reason, "stop");
        assert!(started.elapsed() < config.request_timeout);
    }

    #[tokio::test]
    async fn test_zero_pool_answers_locally() {
        let (_primary, _link, worker) = attached_worker(0);

        let lag = worker.health().event_loop_lag().await.unwrap();
        assert_eq!(lag.len(), 1);
        assert!(matches!(lag.get(&11), Some(MetricSnapshot::Lag(_))));
    }
}
