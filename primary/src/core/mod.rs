//! Primary-side protocol logic and state

pub mod coordinator;
pub mod registry;

pub use coordinator::PrimaryCoordinator;
pub use registry::LiveWorkers;
