//! Resident and virtual memory of the current process

use crate::errors::{SharedError, SharedResult};
use crate::messages::{MemoryUsage, MetricName};

/// Read memory figures for this process from `/proc/self/status`
#[cfg(target_os = "linux")]
pub fn read_memory_usage() -> SharedResult<MemoryUsage> {
    let status = std::fs::read_to_string("/proc/self/status")
        .map_err(|e| SharedError::metric_unavailable(MetricName::MemoryUsage, e.to_string()))?;

    parse_status(&status).ok_or_else(|| {
        SharedError::metric_unavailable(MetricName::MemoryUsage, "VmRSS missing from /proc/self/status")
    })
}

#[cfg(not(target_os = "linux"))]
pub fn read_memory_usage() -> SharedResult<MemoryUsage> {
    Err(SharedError::metric_unavailable(
        MetricName::MemoryUsage,
        "memory figures are only read on Linux",
    ))
}

/// Parse the `Vm*` lines of a proc status file; values are in kB
pub fn parse_status(status: &str) -> Option<MemoryUsage> {
    let field = |name: &str| -> Option<u64> {
        status
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|value| value.parse::<u64>().ok())
            .map(|kb| kb * 1024)
    };

    let rss_bytes = field("VmRSS:")?;
    Some(MemoryUsage {
        rss_bytes,
        peak_rss_bytes: field("VmHWM:").unwrap_or(rss_bytes),
        virtual_bytes: field("VmSize:").unwrap_or(0),
    })
}
