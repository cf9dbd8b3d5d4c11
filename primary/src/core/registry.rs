//! Live worker registry
//!
//! Connections insert a handle after the worker's hello and remove it when the
//! connection closes.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use shared::{PoolSize, WorkerHandle, WorkerId};

use crate::traits::WorkerRegistry;

#[derive(Clone, Default)]
pub struct LiveWorkers {
    inner: Arc<RwLock<BTreeMap<WorkerId, WorkerHandle>>>,
}

impl LiveWorkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle, returning the one it replaced (a reconnecting worker)
    pub fn insert(&self, handle: WorkerHandle) -> Option<WorkerHandle> {
        let mut workers = self.inner.write().unwrap_or_else(|e| e.into_inner());
        workers.insert(handle.id(), handle)
    }

    /// Remove `worker_id` if it is still the process that registered it.
    ///
    /// A stale connection closing after its worker reconnected must not evict
    /// the new handle.
    pub fn remove(&self, worker_id: WorkerId, process_id: u32) -> bool {
        let mut workers = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match workers.get(&worker_id) {
            Some(handle) if handle.process_id() == process_id => {
                workers.remove(&worker_id);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, worker_id: WorkerId) -> Option<WorkerHandle> {
        let workers = self.inner.read().unwrap_or_else(|e| e.into_inner());
        workers.get(&worker_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkerRegistry for LiveWorkers {
    fn workers(&self) -> Vec<WorkerHandle> {
        let workers = self.inner.read().unwrap_or_else(|e| e.into_inner());
        workers.values().cloned().collect()
    }
}

impl PoolSize for LiveWorkers {
    fn expected_workers(&self) -> usize {
        self.len()
    }
}
