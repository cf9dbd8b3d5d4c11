//! Process lifecycle events

use serde::{Deserialize, Serialize};

use super::envelope::{BusEvent, EventName};

/// Broadcast by the primary when the pool is shutting down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shutdown {
    pub reason: String,
}

impl BusEvent for Shutdown {
    const NAME: EventName = EventName::Shutdown;
}
