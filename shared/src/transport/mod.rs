//! Process-level message transport
//!
//! The primary holds one [`WorkerHandle`] per connected worker and can reach
//! itself through a loopback channel. A worker only has its upstream channel to
//! the primary. Both sides are channel-based: the bytes-on-the-wire part lives
//! in the binaries (TCP) or in [`memory`] (in-process pools and tests).

pub mod memory;

use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::errors::{SharedError, SharedResult};
use crate::messages::Envelope;
use crate::types::{ProcessIdentity, WorkerId};
use crate::{process_debug, process_warn};

/// Callback invoked for every envelope arriving on a subscribed channel
pub type EnvelopeHandler = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Set of handlers fed by one inbound channel
#[derive(Default)]
pub struct Subscribers {
    handlers: RwLock<Vec<EnvelopeHandler>>,
}

impl Subscribers {
    pub fn subscribe(&self, handler: EnvelopeHandler) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.push(handler);
    }

    /// Invoke every handler; the lock is released before any handler runs
    pub fn dispatch(&self, envelope: &Envelope) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        for handler in handlers {
            handler(envelope);
        }
    }
}

/// Delivers envelopes read off a channel to all interested subscriber sets
#[derive(Clone)]
pub struct InboundSink {
    targets: Vec<Arc<Subscribers>>,
}

impl InboundSink {
    fn new(targets: Vec<Arc<Subscribers>>) -> Self {
        Self { targets }
    }

    pub fn deliver(&self, envelope: &Envelope) {
        for subscribers in &self.targets {
            subscribers.dispatch(envelope);
        }
    }
}

/// The primary's capability to talk to one live worker
#[derive(Clone)]
pub struct WorkerHandle {
    id: WorkerId,
    process_id: u32,
    outbound: mpsc::UnboundedSender<Envelope>,
    inbound: Arc<Subscribers>,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn send(&self, envelope: Envelope) -> SharedResult<()> {
        self.outbound
            .send(envelope)
            .map_err(|_| SharedError::WorkerDisconnected { worker_id: self.id })
    }

    /// Subscribe to envelopes arriving from this worker only
    pub fn on_message(&self, handler: EnvelopeHandler) {
        self.inbound.subscribe(handler);
    }

    pub fn is_connected(&self) -> bool {
        !self.outbound.is_closed()
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("process_id", &self.process_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Where an envelope goes
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Upward to the primary from a worker; loopback on the primary
    Default,
    /// Specific workers (primary only). An empty slice behaves like `Default`.
    Workers(&'a [WorkerHandle]),
}

/// Which inbound traffic a subscription listens to
#[derive(Debug, Clone)]
pub enum Source {
    /// The process's own inbound channel (from the primary, or loopback)
    Inbound,
    /// Envelopes from these workers (primary only)
    Workers(Vec<WorkerHandle>),
    /// Envelopes from any worker, including ones that connect later (primary only)
    AllWorkers,
}

/// Role-specific delivery of envelopes
pub trait Transport: Send + Sync {
    /// Best-effort, at-most-once delivery. Failures are logged, never raised.
    fn send(&self, target: Target<'_>, envelope: Envelope);

    fn on_message(&self, source: Source, handler: EnvelopeHandler);

    fn identity(&self) -> ProcessIdentity;
}

/// Channel pair backing one worker connection on the primary side
pub struct WorkerLink {
    /// Envelopes the primary wants written to the worker
    pub outbound: mpsc::UnboundedReceiver<Envelope>,
    /// Feed envelopes read from the worker here
    pub inbound: InboundSink,
}

/// Transport used by the primary process
pub struct PrimaryTransport {
    identity: ProcessIdentity,
    own_inbound: Arc<Subscribers>,
    any_worker: Arc<Subscribers>,
    loopback: mpsc::UnboundedSender<Envelope>,
}

impl PrimaryTransport {
    /// Create the transport and start its loopback pump.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(identity: ProcessIdentity) -> Self {
        let own_inbound = Arc::new(Subscribers::default());
        let (loopback, mut loopback_rx) = mpsc::unbounded_channel::<Envelope>();

        let pump_subscribers = own_inbound.clone();
        tokio::spawn(async move {
            while let Some(envelope) = loopback_rx.recv().await {
                pump_subscribers.dispatch(&envelope);
            }
        });

        Self {
            identity,
            own_inbound,
            any_worker: Arc::new(Subscribers::default()),
            loopback,
        }
    }

    /// Create the handle and channel pair for a newly connected worker
    pub fn attach(&self, worker_id: WorkerId, process_id: u32) -> (WorkerHandle, WorkerLink) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let inbound = Arc::new(Subscribers::default());

        let handle = WorkerHandle {
            id: worker_id,
            process_id,
            outbound: outbound_tx,
            inbound: inbound.clone(),
        };
        let link = WorkerLink {
            outbound: outbound_rx,
            inbound: InboundSink::new(vec![inbound, self.any_worker.clone()]),
        };

        process_debug!(self.identity, "🔗 Attached worker {} (pid {})", worker_id, process_id);
        (handle, link)
    }
}

impl Transport for PrimaryTransport {
    fn send(&self, target: Target<'_>, envelope: Envelope) {
        match target {
            Target::Workers(handles) if !handles.is_empty() => {
                for handle in handles {
                    if let Err(e) = handle.send(envelope.clone()) {
                        process_warn!(self.identity, "⚠️ Dropping {} envelope: {}", envelope.event_name, e);
                    }
                }
            }
            Target::Workers(_) | Target::Default => {
                if self.loopback.send(envelope).is_err() {
                    process_warn!(self.identity, "⚠️ Loopback channel closed");
                }
            }
        }
    }

    fn on_message(&self, source: Source, handler: EnvelopeHandler) {
        match source {
            Source::Inbound => self.own_inbound.subscribe(handler),
            Source::Workers(handles) if handles.is_empty() => self.own_inbound.subscribe(handler),
            Source::Workers(handles) => {
                for handle in handles {
                    handle.on_message(handler.clone());
                }
            }
            Source::AllWorkers => self.any_worker.subscribe(handler),
        }
    }

    fn identity(&self) -> ProcessIdentity {
        self.identity
    }
}

/// Channel pair backing a worker's connection to the primary
pub struct UpstreamLink {
    /// Envelopes the worker wants written to the primary
    pub outbound: mpsc::UnboundedReceiver<Envelope>,
    /// Feed envelopes read from the primary here
    pub inbound: InboundSink,
}

/// Transport used by worker processes
pub struct UpstreamTransport {
    identity: ProcessIdentity,
    upstream: mpsc::UnboundedSender<Envelope>,
    inbound: Arc<Subscribers>,
}

impl UpstreamTransport {
    pub fn new(identity: ProcessIdentity) -> (Self, UpstreamLink) {
        let (upstream, outbound) = mpsc::unbounded_channel();
        let inbound = Arc::new(Subscribers::default());

        let transport = Self {
            identity,
            upstream,
            inbound: inbound.clone(),
        };
        let link = UpstreamLink {
            outbound,
            inbound: InboundSink::new(vec![inbound]),
        };
        (transport, link)
    }

    pub fn is_connected(&self) -> bool {
        !self.upstream.is_closed()
    }
}

impl Transport for UpstreamTransport {
    fn send(&self, target: Target<'_>, envelope: Envelope) {
        match target {
            Target::Workers(handles) if !handles.is_empty() => {
                process_warn!(
                    self.identity,
                    "⚠️ Workers cannot address other workers; dropping {} envelope",
                    envelope.event_name
                );
            }
            Target::Workers(_) | Target::Default => {
                if self.upstream.send(envelope).is_err() {
                    process_warn!(self.identity, "⚠️ {}", SharedError::UpstreamClosed);
                }
            }
        }
    }

    fn on_message(&self, source: Source, handler: EnvelopeHandler) {
        match source {
            Source::Inbound => self.inbound.subscribe(handler),
            Source::Workers(_) | Source::AllWorkers => {
                process_warn!(self.identity, "⚠️ Workers hold no worker handles; subscription ignored");
            }
        }
    }

    fn identity(&self) -> ProcessIdentity {
        self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Shutdown;
    use std::time::Duration;
    use tokio::time::timeout;

    fn envelope(reason: &str) -> Envelope {
        Envelope::wrap(&Shutdown { reason: reason.to_string() }).unwrap()
    }

    fn collecting_handler() -> (EnvelopeHandler, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: EnvelopeHandler = Arc::new(move |envelope: &Envelope| {
            let _ = tx.send(envelope.clone());
        });
        (handler, rx)
    }

    #[tokio::test]
    async fn test_primary_default_target_loops_back() {
        let transport = PrimaryTransport::new(ProcessIdentity::primary(1));
        let (handler, mut rx) = collecting_handler();
        transport.on_message(Source::Inbound, handler);

        transport.send(Target::Default, envelope("self"));
        transport.send(Target::Workers(&[]), envelope("empty-target"));

        let first = timeout(Duration::from_millis(100), rx.recv()).await.unwrap().unwrap();
        let second = timeout(Duration::from_millis(100), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first, envelope("self"));
        assert_eq!(second, envelope("empty-target"));
    }

    #[tokio::test]
    async fn test_dead_worker_does_not_block_siblings() {
        let transport = PrimaryTransport::new(ProcessIdentity::primary(1));
        let (dead, dead_link) = transport.attach(WorkerId(1), 11);
        let (alive, mut alive_link) = transport.attach(WorkerId(2), 12);
        drop(dead_link);

        assert!(!dead.is_connected());
        assert!(dead.send(envelope("x")).is_err());

        transport.send(Target::Workers(&[dead, alive]), envelope("fan-out"));
        assert_eq!(alive_link.outbound.recv().await, Some(envelope("fan-out")));
    }

    #[tokio::test]
    async fn test_worker_sources_on_primary() {
        let transport = PrimaryTransport::new(ProcessIdentity::primary(1));
        let (one, one_link) = transport.attach(WorkerId(1), 11);

        let (only_one, mut only_one_rx) = collecting_handler();
        let (everyone, mut everyone_rx) = collecting_handler();
        transport.on_message(Source::Workers(vec![one]), only_one);
        transport.on_message(Source::AllWorkers, everyone);

        // Attached after the AllWorkers subscription
        let (_two, two_link) = transport.attach(WorkerId(2), 12);

        one_link.inbound.deliver(&envelope("from-1"));
        two_link.inbound.deliver(&envelope("from-2"));

        assert_eq!(only_one_rx.try_recv().unwrap(), envelope("from-1"));
        assert!(only_one_rx.try_recv().is_err());
        assert_eq!(everyone_rx.try_recv().unwrap(), envelope("from-1"));
        assert_eq!(everyone_rx.try_recv().unwrap(), envelope("from-2"));
    }

    #[tokio::test]
    async fn test_upstream_sends_to_primary_only() {
        let (transport, mut link) = UpstreamTransport::new(ProcessIdentity::worker(WorkerId(4), 44));

        transport.send(Target::Default, envelope("up"));
        assert_eq!(link.outbound.recv().await, Some(envelope("up")));

        let (handler, mut rx) = collecting_handler();
        transport.on_message(Source::Inbound, handler);
        link.inbound.deliver(&envelope("down"));
        assert_eq!(rx.try_recv().unwrap(), envelope("down"));

        drop(link);
        assert!(!transport.is_connected());
        // Logged and dropped, never panics
        transport.send(Target::Default, envelope("lost"));
    }
}
