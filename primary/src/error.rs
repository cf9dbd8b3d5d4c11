//! Primary-specific error types

use thiserror::Error;
use shared::{SharedError, WorkerId};

#[derive(Error, Debug)]
pub enum PrimaryError {
    #[error("Failed to spawn worker process: {worker_id}")]
    WorkerSpawnFailed { worker_id: WorkerId },

    #[error("Worker process management failed: {message}")]
    ProcessError { message: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("Network communication error: {message}")]
    CommunicationError { message: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PrimaryError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::ConfigurationError { field: field.into() }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::ProcessError { message: message.into() }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError { message: message.into() }
    }
}

pub type PrimaryResult<T> = Result<T, PrimaryError>;
