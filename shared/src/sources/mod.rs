//! Process-local metric sources
//!
//! A source is a synchronous, zero-argument function producing one snapshot.
//! The registry is owned by whoever builds the coordinators, so tests can
//! swap in their own sources.

pub mod memory;
pub mod monitor;

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{SharedError, SharedResult};
use crate::messages::{MetricName, MetricSnapshot};

pub use memory::read_memory_usage;
pub use monitor::EventLoopMonitor;

/// Producer function for one metric
pub type MetricSource = Arc<dyn Fn() -> SharedResult<MetricSnapshot> + Send + Sync>;

/// Maps metric names to their local producer functions
#[derive(Clone, Default)]
pub struct MetricSources {
    sources: HashMap<MetricName, MetricSource>,
}

impl MetricSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory from the OS, lag and utilization from `monitor`
    pub fn standard(monitor: &EventLoopMonitor) -> Self {
        let lag_monitor = monitor.clone();
        let utilization_monitor = monitor.clone();

        Self::new()
            .with_source(MetricName::MemoryUsage, || {
                read_memory_usage().map(MetricSnapshot::Memory)
            })
            .with_source(MetricName::EventLoopLag, move || {
                Ok(MetricSnapshot::Lag(lag_monitor.lag()))
            })
            .with_source(MetricName::EventLoopUtilization, move || {
                Ok(MetricSnapshot::Utilization(utilization_monitor.utilization()))
            })
    }

    /// Register or replace a source (fluent API)
    pub fn with_source<F>(mut self, name: MetricName, source: F) -> Self
    where
        F: Fn() -> SharedResult<MetricSnapshot> + Send + Sync + 'static,
    {
        self.register(name, source);
        self
    }

    pub fn register<F>(&mut self, name: MetricName, source: F)
    where
        F: Fn() -> SharedResult<MetricSnapshot> + Send + Sync + 'static,
    {
        self.sources.insert(name, Arc::new(source));
    }

    /// Run the local source for `name`
    pub fn measure(&self, name: MetricName) -> SharedResult<MetricSnapshot> {
        let source = self
            .sources
            .get(&name)
            .ok_or(SharedError::UnknownMetric { metric: name })?;

        let snapshot = source()?;
        if snapshot.metric_name() != name {
            return Err(SharedError::metric_unavailable(
                name,
                format!("source produced a {} snapshot", snapshot.metric_name()),
            ));
        }
        Ok(snapshot)
    }
}
