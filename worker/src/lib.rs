//! Worker process of a pool
//!
//! Connects to the primary, answers forwarded health-check requests and can
//! itself collect metrics from the whole pool.

pub mod core;
pub mod error;
pub mod services;
pub mod worker;

pub use core::WorkerCoordinator;
pub use error::{WorkerError, WorkerResult};
pub use services::UpstreamConnection;
pub use worker::Worker;
