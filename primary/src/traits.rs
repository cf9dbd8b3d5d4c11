//! Trait seams of the primary, with mockall mocks for testing

use std::net::SocketAddr;

use shared::{WorkerHandle, WorkerId};
use crate::error::PrimaryResult;

/// A worker process started by the launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedWorker {
    pub worker_id: WorkerId,
    pub process_id: u32,
}

/// Source of truth for the live worker set.
///
/// Coordinators read it fresh on every protocol step and never keep the
/// returned handles.
#[mockall::automock]
pub trait WorkerRegistry: Send + Sync {
    fn workers(&self) -> Vec<WorkerHandle>;
}

/// Starting and stopping worker processes
#[mockall::automock]
#[async_trait::async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Start `count` workers with ids `1..=count` that connect back to
    /// `primary_addr`
    async fn spawn_workers(&self, count: u32, primary_addr: SocketAddr) -> PrimaryResult<Vec<LaunchedWorker>>;

    /// Forget workers whose process has exited and return their ids
    async fn reap_exited(&self) -> PrimaryResult<Vec<WorkerId>>;

    /// Stop every worker, gracefully first
    async fn stop_all(&self) -> PrimaryResult<()>;
}
