//! Worker half of the metrics scatter-gather
//!
//! A worker only ever answers collect requests the primary forwards to it. The
//! answer goes back upward, addressed to the worker that asked.

use std::sync::Arc;

use shared::{
    process_debug, process_warn, Bus, CollectMetrics, HealthCheckEvent, MetricData,
    MetricSources, MetricsResponse, Source, Target,
};

pub struct WorkerCoordinator {
    bus: Bus,
    sources: MetricSources,
}

impl WorkerCoordinator {
    pub fn new(bus: Bus, sources: MetricSources) -> Arc<Self> {
        Arc::new(Self { bus, sources })
    }

    pub fn install(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);
        self.bus
            .on(Source::Inbound, move |event: HealthCheckEvent| coordinator.handle(event));
    }

    pub fn handle(&self, event: HealthCheckEvent) {
        match event {
            HealthCheckEvent::PrimaryCollectMetrics(request) => self.respond(request),
            // Responses belong to the requester; worker-originated events never come down
            HealthCheckEvent::PrimaryMetricsResponse(_)
            | HealthCheckEvent::WorkerCollectMetrics(_)
            | HealthCheckEvent::WorkerMetricsResponse(_) => {}
        }
    }

    fn respond(&self, request: CollectMetrics) {
        let identity = self.bus.identity();

        let data = match self.sources.measure(request.metric.name) {
            Ok(data) => data,
            Err(e) => {
                process_warn!(
                    identity,
                    "⚠️ Could not measure {} for request {}: {}",
                    request.metric.name,
                    request.request_id,
                    e
                );
                return;
            }
        };

        let response = HealthCheckEvent::WorkerMetricsResponse(MetricsResponse {
            request_id: request.request_id,
            source_process_id: identity.process_id,
            source_worker_id: identity.worker_id,
            target_worker_id: request.source_worker_id,
            metric: MetricData {
                name: request.metric.name,
                data,
            },
        });

        process_debug!(
            identity,
            "📤 Answering {} request {} for worker {}",
            request.metric.name,
            request.request_id,
            request.source_worker_id
        );
        if let Err(e) = self.bus.emit(Target::Default, &response) {
            process_warn!(identity, "⚠️ Failed to emit {}: {}", response.kind(), e);
        }
    }
}
