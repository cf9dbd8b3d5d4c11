//! Primary process of a worker pool
//!
//! Accepts worker connections, launches worker processes, and plays the relay
//! role in the pool-wide health-check protocol so that any process can collect
//! a metric from every other process.

pub mod core;
pub mod error;
pub mod primary;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use core::{LiveWorkers, PrimaryCoordinator};
pub use error::{PrimaryError, PrimaryResult};
pub use primary::Primary;
pub use traits::{LaunchedWorker, WorkerLauncher, WorkerRegistry};
