//! Requester side of the metrics scatter-gather
//!
//! Any process can ask the whole pool for a metric. The request goes to the
//! primary (or loops back on the primary itself), and every answer comes back
//! as a `PrimaryMetricsResponse` on this process's inbound channel.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use super::pending::PendingRequests;
use super::PoolSize;
use crate::bus::Bus;
use crate::errors::SharedResult;
use crate::messages::{
    CollectMetrics, HealthCheckEvent, MetricName, MetricRequest, ProcessMetrics,
};
use crate::sources::MetricSources;
use crate::transport::{Source, Target};
use crate::types::RequestId;
use crate::{process_debug, process_warn};

pub struct MetricsRequester {
    bus: Bus,
    sources: MetricSources,
    pending: PendingRequests,
    pool: Arc<dyn PoolSize>,
    timeout: Duration,
}

impl MetricsRequester {
    pub fn new(
        bus: Bus,
        sources: MetricSources,
        pending: PendingRequests,
        pool: Arc<dyn PoolSize>,
        timeout: Duration,
    ) -> Self {
        Self {
            bus,
            sources,
            pending,
            pool,
            timeout,
        }
    }

    /// Route `PrimaryMetricsResponse` events arriving on the inbound channel to
    /// their pending request. Call once per requester.
    pub fn install(&self) {
        let pending = self.pending.clone();
        let identity = self.bus.identity();

        self.bus.on(Source::Inbound, move |event: HealthCheckEvent| match event {
            HealthCheckEvent::PrimaryMetricsResponse(response) => {
                let request_id = response.request_id;
                if !pending.dispatch(response) {
                    process_debug!(identity, "🗑️ No pending request {}, response dropped", request_id);
                }
            }
            HealthCheckEvent::WorkerCollectMetrics(_)
            | HealthCheckEvent::PrimaryCollectMetrics(_)
            | HealthCheckEvent::WorkerMetricsResponse(_) => {}
        });
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    /// Collect `metric` from every process in the pool.
    ///
    /// Fails only when the local source fails, in which case nothing is sent.
    /// Otherwise resolves with this process's own snapshot plus whatever peers
    /// answered before the timeout.
    pub async fn request_metric(&self, metric: MetricName) -> SharedResult<ProcessMetrics> {
        let identity = self.bus.identity();
        let request_id = RequestId::new();

        let own = self.sources.measure(metric)?;
        let mut results = ProcessMetrics::new();
        results.insert(identity.process_id, own);

        let expected = self.pool.expected_workers() + 1;
        if results.len() >= expected {
            return Ok(results);
        }

        let (guard, mut responses) = self.pending.register(request_id);
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        self.bus.emit(
            Target::Default,
            &HealthCheckEvent::WorkerCollectMetrics(CollectMetrics {
                request_id,
                source_worker_id: identity.worker_id,
                metric: MetricRequest { name: metric },
            }),
        )?;
        process_debug!(identity, "📤 Requested {} from pool (request {})", metric, request_id);

        let mut responders = BTreeSet::new();
        loop {
            tokio::select! {
                biased;

                response = responses.recv() => {
                    let Some(response) = response else { break };

                    if !response.answers(request_id, identity.worker_id, metric) {
                        process_debug!(identity, "🗑️ Ignoring mismatched response for request {}", request_id);
                        continue;
                    }

                    responders.insert(response.source_worker_id.0);
                    results.insert(response.source_process_id, response.metric.data);
                    if results.len() >= expected {
                        break;
                    }
                }

                _ = &mut deadline => {
                    process_warn!(
                        identity,
                        "⏱️ {} request {} timed out: received {}/{} responses (answered by workers {:?})",
                        metric,
                        request_id,
                        results.len(),
                        expected,
                        responders
                    );
                    break;
                }
            }
        }

        drop(guard);
        Ok(results)
    }
}
