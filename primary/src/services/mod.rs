//! Service implementations
//!
//! Real implementations of the I/O-facing pieces: the TCP endpoint workers
//! connect to and the launcher that starts and stops worker processes.

pub mod launcher;
pub mod listener;

#[cfg(test)]
mod tests;

pub use launcher::RealWorkerLauncher;
pub use listener::WorkerListener;
