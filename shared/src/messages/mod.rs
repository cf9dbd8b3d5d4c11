//! Message types carried on the control-plane bus
//!
//! - `envelope`: the `(event_name, event_params)` unit and the event name registry
//! - `health`: scatter-gather health-check events
//! - `metrics`: metric names and snapshots
//! - `control`: process lifecycle events

pub mod control;
pub mod envelope;
pub mod health;
pub mod metrics;

pub use control::Shutdown;
pub use envelope::{BusEvent, Envelope, EventName};
pub use health::{CollectMetrics, HealthCheckEvent, MetricData, MetricRequest, MetricsResponse};
pub use metrics::{
    EventLoopLag, EventLoopUtilization, MemoryUsage, MetricName, MetricSnapshot, ProcessMetrics,
};
