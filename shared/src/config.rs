//! Defaults and tunables for the health-check protocol

use std::time::Duration;

use crate::errors::{SharedError, SharedResult};

/// How long a requester waits for peers before settling for a partial result
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3000;

/// Wake-up period of the event-loop monitor
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckConfig {
    pub request_timeout: Duration,
    pub sample_interval: Duration,
    /// Log an aggregated report on this period; `None` disables it
    pub report_interval: Option<Duration>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            report_interval: None,
        }
    }
}

impl HealthCheckConfig {
    /// Build from CLI values, rejecting zero durations
    pub fn from_args(
        request_timeout_ms: u64,
        sample_interval_ms: u64,
        report_interval_secs: Option<u64>,
    ) -> SharedResult<Self> {
        if request_timeout_ms == 0 {
            return Err(SharedError::InvalidConfig {
                field: "request_timeout_ms".to_string(),
                value: request_timeout_ms.to_string(),
            });
        }
        if sample_interval_ms == 0 {
            return Err(SharedError::InvalidConfig {
                field: "sample_interval_ms".to_string(),
                value: sample_interval_ms.to_string(),
            });
        }

        Ok(Self {
            request_timeout: Duration::from_millis(request_timeout_ms),
            sample_interval: Duration::from_millis(sample_interval_ms),
            report_interval: report_interval_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}
