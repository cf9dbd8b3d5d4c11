//! Core identifiers used throughout the cluster

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// Global process identity - set once at startup by the binary
static PROCESS_IDENTITY: OnceLock<ProcessIdentity> = OnceLock::new();

/// Small integer identifying a worker within the pool.
///
/// `0` is reserved for the primary and never handed to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u32);

impl WorkerId {
    /// Reserved id denoting the primary process
    pub const PRIMARY: WorkerId = WorkerId(0);

    pub fn is_primary(&self) -> bool {
        *self == Self::PRIMARY
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a process, fixed for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessRole {
    Primary,
    Worker,
}

/// Who the current process is: role, worker id and OS process id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub role: ProcessRole,
    pub worker_id: WorkerId,
    pub process_id: u32,
}

impl ProcessIdentity {
    pub fn primary(process_id: u32) -> Self {
        Self {
            role: ProcessRole::Primary,
            worker_id: WorkerId::PRIMARY,
            process_id,
        }
    }

    pub fn worker(worker_id: WorkerId, process_id: u32) -> Self {
        Self {
            role: ProcessRole::Worker,
            worker_id,
            process_id,
        }
    }

    /// Initialize the global identity for the primary process
    pub fn init_primary() -> &'static ProcessIdentity {
        PROCESS_IDENTITY.get_or_init(|| Self::primary(std::process::id()))
    }

    /// Initialize the global identity for a worker process
    pub fn init_worker(worker_id: WorkerId) -> &'static ProcessIdentity {
        PROCESS_IDENTITY.get_or_init(|| Self::worker(worker_id, std::process::id()))
    }

    /// Get the global identity, falling back to the primary if no binary
    /// initialized one (library use and tests).
    pub fn current() -> &'static ProcessIdentity {
        PROCESS_IDENTITY.get_or_init(|| Self::primary(std::process::id()))
    }

    pub fn is_primary(&self) -> bool {
        self.role == ProcessRole::Primary
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            ProcessRole::Primary => write!(f, "primary"),
            ProcessRole::Worker => write!(f, "worker_{}", self.worker_id),
        }
    }
}

/// Correlation token for one scatter-gather request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
