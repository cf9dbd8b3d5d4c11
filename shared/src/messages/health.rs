//! Health-check events for the metrics scatter-gather protocol
//!
//! Every variant travels under [`EventName::HealthCheck`]. The `Worker*`
//! variants flow towards the primary, the `Primary*` variants flow away from it.

use serde::{Deserialize, Serialize};

use super::envelope::{BusEvent, EventName};
use super::metrics::{MetricName, MetricSnapshot};
use crate::types::{RequestId, WorkerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRequest {
    pub name: MetricName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    pub name: MetricName,
    pub data: MetricSnapshot,
}

/// Request for a metric, issued by the requester and fanned out by the primary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectMetrics {
    pub request_id: RequestId,
    /// The original requester; kept unchanged on fan-out
    pub source_worker_id: WorkerId,
    pub metric: MetricRequest,
}

/// One process's answer, addressed to the original requester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub request_id: RequestId,
    pub source_process_id: u32,
    pub source_worker_id: WorkerId,
    pub target_worker_id: WorkerId,
    pub metric: MetricData,
}

impl MetricsResponse {
    /// True when this response answers `request_id` for `metric` and is
    /// addressed to `worker_id`.
    pub fn answers(&self, request_id: RequestId, worker_id: WorkerId, metric: MetricName) -> bool {
        self.request_id == request_id && self.target_worker_id == worker_id && self.metric.name == metric
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HealthCheckEvent {
    /// Requester -> primary
    WorkerCollectMetrics(CollectMetrics),
    /// Primary -> every worker except the requester
    PrimaryCollectMetrics(CollectMetrics),
    /// Responding worker -> primary
    WorkerMetricsResponse(MetricsResponse),
    /// Primary -> requester
    PrimaryMetricsResponse(MetricsResponse),
}

impl HealthCheckEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            HealthCheckEvent::WorkerCollectMetrics(request)
            | HealthCheckEvent::PrimaryCollectMetrics(request) => request.request_id,
            HealthCheckEvent::WorkerMetricsResponse(response)
            | HealthCheckEvent::PrimaryMetricsResponse(response) => response.request_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HealthCheckEvent::WorkerCollectMetrics(_) => "worker:collectMetrics",
            HealthCheckEvent::PrimaryCollectMetrics(_) => "primary:collectMetrics",
            HealthCheckEvent::WorkerMetricsResponse(_) => "worker:metricsResponse",
            HealthCheckEvent::PrimaryMetricsResponse(_) => "primary:metricsResponse",
        }
    }
}

impl BusEvent for HealthCheckEvent {
    const NAME: EventName = EventName::HealthCheck;
}
