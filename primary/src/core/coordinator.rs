//! Primary half of the metrics scatter-gather
//!
//! Workers can only reach the primary, so the primary fans every collect
//! request out to the other workers, answers for itself, and relays each
//! worker's answer to the original requester.

use std::sync::Arc;

use shared::{
    process_debug, process_warn, Bus, CollectMetrics, HealthCheckEvent, MetricData,
    MetricSources, MetricsResponse, Source, Target, WorkerHandle, WorkerId,
};

use crate::traits::WorkerRegistry;

pub struct PrimaryCoordinator<R>
where
    R: WorkerRegistry + 'static,
{
    bus: Bus,
    registry: Arc<R>,
    sources: MetricSources,
}

impl<R> PrimaryCoordinator<R>
where
    R: WorkerRegistry + 'static,
{
    pub fn new(bus: Bus, registry: Arc<R>, sources: MetricSources) -> Arc<Self> {
        Arc::new(Self {
            bus,
            registry,
            sources,
        })
    }

    /// Listen on loopback (the primary's own requests) and on every worker
    pub fn install(self: &Arc<Self>) {
        for source in [Source::Inbound, Source::AllWorkers] {
            let coordinator = Arc::clone(self);
            self.bus
                .on(source, move |event: HealthCheckEvent| coordinator.handle(event));
        }
    }

    pub fn handle(&self, event: HealthCheckEvent) {
        match event {
            HealthCheckEvent::WorkerCollectMetrics(request) => self.fan_out(request),
            HealthCheckEvent::WorkerMetricsResponse(response) => self.relay(response),
            // Primary-originated events; looped-back responses belong to the requester
            HealthCheckEvent::PrimaryCollectMetrics(_) | HealthCheckEvent::PrimaryMetricsResponse(_) => {}
        }
    }

    fn fan_out(&self, request: CollectMetrics) {
        let identity = self.bus.identity();
        let requester = request.source_worker_id;
        let workers = self.registry.workers();

        let peers: Vec<WorkerHandle> = workers
            .iter()
            .filter(|worker| worker.id() != requester)
            .cloned()
            .collect();

        process_debug!(
            identity,
            "📡 Fanning out {} request {} from worker {} to {} peers",
            request.metric.name,
            request.request_id,
            requester,
            peers.len()
        );

        // An empty target would loop back to ourselves
        if !peers.is_empty() {
            self.emit(
                Target::Workers(&peers),
                HealthCheckEvent::PrimaryCollectMetrics(request.clone()),
            );
        }

        // A requesting primary already seeded its own snapshot
        if requester.is_primary() {
            return;
        }

        let Some(target) = workers.iter().find(|worker| worker.id() == requester) else {
            process_debug!(identity, "🗑️ Requester worker {} is gone, not answering", requester);
            return;
        };

        match self.sources.measure(request.metric.name) {
            Ok(data) => {
                let response = MetricsResponse {
                    request_id: request.request_id,
                    source_process_id: identity.process_id,
                    source_worker_id: WorkerId::PRIMARY,
                    target_worker_id: requester,
                    metric: MetricData {
                        name: request.metric.name,
                        data,
                    },
                };
                self.emit(
                    Target::Workers(std::slice::from_ref(target)),
                    HealthCheckEvent::PrimaryMetricsResponse(response),
                );
            }
            Err(e) => {
                process_warn!(
                    identity,
                    "⚠️ Could not measure {} for request {}: {}",
                    request.metric.name,
                    request.request_id,
                    e
                );
            }
        }
    }

    fn relay(&self, response: MetricsResponse) {
        let identity = self.bus.identity();
        let target = response.target_worker_id;

        if target.is_primary() {
            self.emit(Target::Default, HealthCheckEvent::PrimaryMetricsResponse(response));
            return;
        }

        match self.registry.workers().into_iter().find(|worker| worker.id() == target) {
            Some(handle) => {
                self.emit(
                    Target::Workers(std::slice::from_ref(&handle)),
                    HealthCheckEvent::PrimaryMetricsResponse(response),
                );
            }
            None => {
                process_debug!(
                    identity,
                    "🗑️ Dropping response for request {}: worker {} is gone",
                    response.request_id,
                    target
                );
            }
        }
    }

    fn emit(&self, target: Target<'_>, event: HealthCheckEvent) {
        if let Err(e) = self.bus.emit(target, &event) {
            process_warn!(self.bus.identity(), "⚠️ Failed to emit {}: {}", event.kind(), e);
        }
    }
}
