//! Pool-wide health checks
//!
//! [`HealthCheck`] is what the rest of an application calls. It is backed by a
//! [`MetricsRequester`]; the primary-side relay and the worker-side responder
//! live in the `primary` and `worker` crates.

pub mod pending;
pub mod requester;

use std::sync::Arc;

use crate::errors::SharedResult;
use crate::messages::{MetricName, ProcessMetrics};
use crate::process_info;
use crate::types::ProcessIdentity;

pub use pending::{PendingGuard, PendingRequests};
pub use requester::MetricsRequester;

/// How many workers a requester should hear from
pub trait PoolSize: Send + Sync {
    fn expected_workers(&self) -> usize;
}

/// Pool size known up front, as a worker learns it from its launch arguments
#[derive(Debug, Clone, Copy)]
pub struct FixedPoolSize(pub usize);

impl PoolSize for FixedPoolSize {
    fn expected_workers(&self) -> usize {
        self.0
    }
}

/// One zero-argument operation per metric
#[derive(Clone)]
pub struct HealthCheck {
    requester: Arc<MetricsRequester>,
}

impl HealthCheck {
    pub fn new(requester: Arc<MetricsRequester>) -> Self {
        Self { requester }
    }

    pub async fn memory_usage(&self) -> SharedResult<ProcessMetrics> {
        self.requester.request_metric(MetricName::MemoryUsage).await
    }

    pub async fn event_loop_lag(&self) -> SharedResult<ProcessMetrics> {
        self.requester.request_metric(MetricName::EventLoopLag).await
    }

    pub async fn event_loop_utilization(&self) -> SharedResult<ProcessMetrics> {
        self.requester.request_metric(MetricName::EventLoopUtilization).await
    }

    /// Request all three metrics concurrently
    pub async fn collect_all(&self) -> Vec<(MetricName, SharedResult<ProcessMetrics>)> {
        let (memory, lag, utilization) = tokio::join!(
            self.memory_usage(),
            self.event_loop_lag(),
            self.event_loop_utilization()
        );

        vec![
            (MetricName::MemoryUsage, memory),
            (MetricName::EventLoopLag, lag),
            (MetricName::EventLoopUtilization, utilization),
        ]
    }

    /// Collect everything and log one line per process per metric
    pub async fn log_report(&self, identity: &ProcessIdentity) {
        for (metric, result) in self.collect_all().await {
            match result {
                Ok(results) => {
                    let mut pids: Vec<_> = results.keys().copied().collect();
                    pids.sort_unstable();
                    for pid in pids {
                        let rendered = serde_json::to_string(&results[&pid])
                            .unwrap_or_else(|e| format!("<unrenderable: {e}>"));
                        process_info!(identity, "📊 {} pid={} {}", metric, pid, rendered);
                    }
                }
                Err(e) => crate::logging::log_error(identity, &format!("{metric} health check"), &e),
            }
        }
    }
}
