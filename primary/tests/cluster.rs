//! Pool-wide health checks across a primary and in-process workers
//!
//! Workers are attached through in-memory links instead of TCP so the whole
//! pool runs inside one runtime with paused time.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::time::Instant;

use primary::traits::MockWorkerLauncher;
use primary::Primary;
use shared::transport::memory::{connect, MemoryWorker};
use shared::{HealthCheckConfig, MetricSnapshot, ProcessIdentity, ProcessMetrics, WorkerId};
use worker::Worker;

const PRIMARY_PID: u32 = 100;
const TIMEOUT: Duration = Duration::from_millis(3000);

struct Cluster {
    primary: Primary<MockWorkerLauncher>,
    links: BTreeMap<WorkerId, MemoryWorker>,
    workers: Vec<Worker>,
}

impl Cluster {
    fn new(size: u32, launcher: MockWorkerLauncher) -> Self {
        let config = HealthCheckConfig::default();
        let primary = Primary::new(ProcessIdentity::primary(PRIMARY_PID), config.clone(), launcher);

        let mut links = BTreeMap::new();
        let mut workers = Vec::new();
        for id in 1..=size {
            let link = connect(primary.transport(), ProcessIdentity::worker(WorkerId(id), worker_pid(id)));
            primary.registry().insert(link.handle.clone());
            workers.push(Worker::new(config.clone(), size as usize, link.transport.clone()));
            links.insert(WorkerId(id), link);
        }

        Self {
            primary,
            links,
            workers,
        }
    }

    fn worker(&self, id: u32) -> &Worker {
        &self.workers[(id - 1) as usize]
    }

    /// Take worker `id` out of the pool the way a crashed process leaves it
    fn kill(&mut self, id: u32) {
        self.primary.registry().remove(WorkerId(id), worker_pid(id));
        if let Some(link) = self.links.remove(&WorkerId(id)) {
            link.kill();
        }
    }
}

fn worker_pid(id: u32) -> u32 {
    1000 + id
}

fn pids(metrics: &ProcessMetrics) -> BTreeSet<u32> {
    metrics.keys().copied().collect()
}

#[tokio::test(start_paused = true)]
async fn test_worker_request_reaches_every_process() {
    let cluster = Cluster::new(3, MockWorkerLauncher::new());
    let started = Instant::now();

    let lag = cluster.worker(2).health().event_loop_lag().await.unwrap();

    assert!(started.elapsed() < TIMEOUT);
    assert_eq!(
        pids(&lag),
        BTreeSet::from([PRIMARY_PID, worker_pid(1), worker_pid(2), worker_pid(3)])
    );
    assert!(lag.values().all(|snapshot| matches!(snapshot, MetricSnapshot::Lag(_))));
}

#[tokio::test(start_paused = true)]
async fn test_dead_worker_yields_partial_result_after_timeout() {
    let mut cluster = Cluster::new(3, MockWorkerLauncher::new());
    cluster.kill(3);
    let started = Instant::now();

    let utilization = cluster.worker(2).health().event_loop_utilization().await.unwrap();

    assert!(started.elapsed() >= TIMEOUT);
    assert_eq!(
        pids(&utilization),
        BTreeSet::from([PRIMARY_PID, worker_pid(1), worker_pid(2)])
    );
}

#[tokio::test(start_paused = true)]
async fn test_killing_several_workers_removes_exactly_those() {
    let mut cluster = Cluster::new(4, MockWorkerLauncher::new());
    cluster.kill(2);
    cluster.kill(4);

    let lag = cluster.primary.health().event_loop_lag().await.unwrap();
    assert_eq!(
        pids(&lag),
        BTreeSet::from([PRIMARY_PID, worker_pid(1), worker_pid(3)])
    );

    // Worker 3 still expects a pool of four, so it waits out the timeout
    let started = Instant::now();
    let lag = cluster.worker(3).health().event_loop_lag().await.unwrap();
    assert!(started.elapsed() >= TIMEOUT);
    assert_eq!(
        pids(&lag),
        BTreeSet::from([PRIMARY_PID, worker_pid(1), worker_pid(3)])
    );
}

#[tokio::test(start_paused = true)]
async fn test_primary_request_collects_all_workers() {
    let cluster = Cluster::new(3, MockWorkerLauncher::new());
    let started = Instant::now();

    let utilization = cluster.primary.health().event_loop_utilization().await.unwrap();

    assert!(started.elapsed() < TIMEOUT);
    assert_eq!(
        pids(&utilization),
        BTreeSet::from([PRIMARY_PID, worker_pid(1), worker_pid(2), worker_pid(3)])
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_from_different_workers_stay_separate() {
    let cluster = Cluster::new(3, MockWorkerLauncher::new());

    let (from_one, from_three, from_primary) = tokio::join!(
        cluster.worker(1).health().event_loop_lag(),
        cluster.worker(3).health().event_loop_utilization(),
        cluster.primary.health().event_loop_lag(),
    );

    let everyone = BTreeSet::from([PRIMARY_PID, worker_pid(1), worker_pid(2), worker_pid(3)]);
    let from_one = from_one.unwrap();
    let from_three = from_three.unwrap();
    let from_primary = from_primary.unwrap();
    assert_eq!(pids(&from_one), everyone);
    assert_eq!(pids(&from_three), everyone);
    assert_eq!(pids(&from_primary), everyone);
    assert!(from_three
        .values()
        .all(|snapshot| matches!(snapshot, MetricSnapshot::Utilization(_))));
}

#[tokio::test(start_paused = true)]
async fn test_request_after_worker_leaves_only_waits_for_remaining_pool() {
    let mut cluster = Cluster::new(2, MockWorkerLauncher::new());
    cluster.kill(2);
    let started = Instant::now();

    // The primary sizes its pool from the live registry
    let lag = cluster.primary.health().event_loop_lag().await.unwrap();

    assert!(started.elapsed() < TIMEOUT);
    assert_eq!(pids(&lag), BTreeSet::from([PRIMARY_PID, worker_pid(1)]));
}

#[tokio::test]
async fn test_primary_shutdown_stops_every_worker() {
    let mut launcher = MockWorkerLauncher::new();
    launcher.expect_stop_all().times(1).returning(|| Ok(()));
    let Cluster {
        mut primary,
        links,
        workers,
    } = Cluster::new(2, launcher);

    let runs: Vec<_> = workers
        .into_iter()
        .map(|mut worker| tokio::spawn(async move { worker.run(std::future::pending()).await }))
        .collect();

    primary.shutdown("pool stopping").await.unwrap();

    for run in runs {
        let reason = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, "pool stopping");
    }
    drop(links);
}

#[cfg(target_os = "linux")]
#[tokio::test(start_paused = true)]
async fn test_memory_usage_scenario() {
    let mut cluster = Cluster::new(3, MockWorkerLauncher::new());

    let memory = cluster.worker(2).health().memory_usage().await.unwrap();
    assert_eq!(memory.len(), 4);
    assert!(memory
        .values()
        .all(|snapshot| matches!(snapshot, MetricSnapshot::Memory(usage) if usage.rss_bytes > 0)));

    cluster.kill(3);
    let started = Instant::now();
    let memory = cluster.worker(2).health().memory_usage().await.unwrap();
    assert!(started.elapsed() >= TIMEOUT);
    assert_eq!(memory.len(), 3);
    assert!(!memory.contains_key(&worker_pid(3)));
}
