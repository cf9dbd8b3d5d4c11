//! Metric names and the snapshots their sources produce

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Metrics any process in the pool can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricName {
    MemoryUsage,
    EventLoopLag,
    EventLoopUtilization,
}

impl MetricName {
    pub const ALL: [MetricName; 3] = [
        MetricName::MemoryUsage,
        MetricName::EventLoopLag,
        MetricName::EventLoopUtilization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::MemoryUsage => "memory-usage",
            MetricName::EventLoopLag => "event-loop-lag",
            MetricName::EventLoopUtilization => "event-loop-utilization",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process memory figures in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub rss_bytes: u64,
    pub peak_rss_bytes: u64,
    pub virtual_bytes: u64,
}

/// Scheduling delay observed by the event-loop monitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLoopLag {
    pub current_ms: f64,
    pub mean_ms: f64,
    pub max_ms: f64,
    pub samples: u64,
}

/// Estimated share of time the event loop spent busy, in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLoopUtilization {
    pub utilization: f64,
    pub window_ms: u64,
}

/// One process's answer for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricSnapshot {
    Memory(MemoryUsage),
    Lag(EventLoopLag),
    Utilization(EventLoopUtilization),
}

impl MetricSnapshot {
    pub fn metric_name(&self) -> MetricName {
        match self {
            MetricSnapshot::Memory(_) => MetricName::MemoryUsage,
            MetricSnapshot::Lag(_) => MetricName::EventLoopLag,
            MetricSnapshot::Utilization(_) => MetricName::EventLoopUtilization,
        }
    }
}

/// Aggregated answer of a scatter-gather request, keyed by OS process id
pub type ProcessMetrics = HashMap<u32, MetricSnapshot>;
