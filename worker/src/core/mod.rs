//! Worker-side protocol logic

pub mod coordinator;

pub use coordinator::WorkerCoordinator;
