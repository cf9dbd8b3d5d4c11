//! Typed pub/sub on top of a [`Transport`]

use std::sync::Arc;

use crate::errors::SharedResult;
use crate::messages::{BusEvent, Envelope};
use crate::process_debug;
use crate::transport::{Source, Target, Transport};
use crate::types::ProcessIdentity;

/// Event router shared by every feature using the control plane
#[derive(Clone)]
pub struct Bus {
    transport: Arc<dyn Transport>,
}

impl Bus {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn identity(&self) -> ProcessIdentity {
        self.transport.identity()
    }

    /// Wrap `event` under its registered name and hand it to the transport.
    ///
    /// Only serialization can fail here; delivery problems are logged by the
    /// transport.
    pub fn emit<E: BusEvent>(&self, target: Target<'_>, event: &E) -> SharedResult<()> {
        let envelope = Envelope::wrap(event)?;
        self.transport.send(target, envelope);
        Ok(())
    }

    /// Register `handler` for every `E` arriving from `source`.
    ///
    /// Envelopes carrying other event names are skipped; envelopes that fail to
    /// decode are dropped with a debug log.
    pub fn on<E, F>(&self, source: Source, handler: F)
    where
        E: BusEvent,
        F: Fn(E) + Send + Sync + 'static,
    {
        let identity = self.identity();
        self.transport.on_message(
            source,
            Arc::new(move |envelope: &Envelope| match envelope.unwrap_event::<E>() {
                None => {}
                Some(Ok(event)) => handler(event),
                Some(Err(e)) => {
                    process_debug!(identity, "🗑️ Dropping malformed {} envelope: {}", E::NAME, e);
                }
            }),
        );
    }
}
