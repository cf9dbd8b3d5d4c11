//! Shared error types for the cluster control plane

use thiserror::Error;

use crate::messages::MetricName;
use crate::types::WorkerId;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Serialization failed: {message}")]
    SerializationError { message: String },

    #[error("Deserialization failed: {message}")]
    DeserializationError { message: String },

    #[error("Frame of {len} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Message protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Worker {worker_id} is disconnected")]
    WorkerDisconnected { worker_id: WorkerId },

    #[error("Upstream channel to primary is closed")]
    UpstreamClosed,

    #[error("No metric source registered for {metric}")]
    UnknownMetric { metric: MetricName },

    #[error("Metric {metric} unavailable: {reason}")]
    MetricUnavailable { metric: MetricName, reason: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SharedError {
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::SerializationError { message: err.to_string() }
    }

    pub fn deserialization(err: impl std::fmt::Display) -> Self {
        Self::DeserializationError { message: err.to_string() }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolError { message: message.into() }
    }

    pub fn metric_unavailable(metric: MetricName, reason: impl Into<String>) -> Self {
        Self::MetricUnavailable { metric, reason: reason.into() }
    }
}

pub type SharedResult<T> = Result<T, SharedError>;
