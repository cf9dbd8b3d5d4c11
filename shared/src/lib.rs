//! Shared control-plane pieces for the primary and worker processes
//!
//! Contains the message envelope, transports, the event bus, metric sources and
//! the requester side of the metrics scatter-gather. Role-specific halves of
//! the protocol live in the `primary` and `worker` crates.

pub mod bus;
pub mod codec;
pub mod config;
pub mod errors;
pub mod healthcheck;
pub mod logging;
pub mod messages;
pub mod sources;
pub mod transport;
pub mod types;

pub use errors::*;
pub use types::*;

pub use bus::Bus;
pub use codec::Frame;
pub use config::HealthCheckConfig;
pub use healthcheck::{FixedPoolSize, HealthCheck, MetricsRequester, PendingRequests, PoolSize};
pub use messages::{
    BusEvent, CollectMetrics, Envelope, EventLoopLag, EventLoopUtilization, EventName,
    HealthCheckEvent, MemoryUsage, MetricData, MetricName, MetricRequest, MetricSnapshot,
    MetricsResponse, ProcessMetrics, Shutdown,
};
pub use sources::{EventLoopMonitor, MetricSources};
pub use transport::{
    PrimaryTransport, Source, Target, Transport, UpstreamTransport, WorkerHandle,
};
