//! Envelope wrapping every event sent over the bus

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{SharedError, SharedResult};

/// Closed registry of event names sharing the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    HealthCheck,
    Shutdown,
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventName::HealthCheck => write!(f, "health-check"),
            EventName::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// A typed event that can travel on the bus under a fixed name
pub trait BusEvent: Serialize + DeserializeOwned + Send + 'static {
    const NAME: EventName;
}

/// The unit exchanged between processes.
///
/// `event_params` holds the bincode encoding of the event registered under
/// `event_name`; it is only decoded by subscribers of that name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub event_name: EventName,
    pub event_params: Vec<u8>,
}

impl Envelope {
    /// Wrap an event into an envelope
    pub fn wrap<E: BusEvent>(event: &E) -> SharedResult<Self> {
        let event_params = bincode::serialize(event).map_err(SharedError::serialization)?;
        Ok(Self {
            event_name: E::NAME,
            event_params,
        })
    }

    /// Unwrap the event if this envelope carries `E`.
    ///
    /// Returns `None` when the event name does not match.
    pub fn unwrap_event<E: BusEvent>(&self) -> Option<SharedResult<E>> {
        if self.event_name != E::NAME {
            return None;
        }
        Some(bincode::deserialize(&self.event_params).map_err(SharedError::deserialization))
    }
}
