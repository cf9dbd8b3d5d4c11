//! Worker error types

use thiserror::Error;
use shared::SharedError;

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Worker error types
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Connection to primary failed: {message}")]
    ConnectionError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WorkerError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }
}
