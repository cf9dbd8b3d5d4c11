//! In-process links between a primary transport and worker transports
//!
//! Used to run a whole pool inside one runtime; the TCP glue in the binaries
//! does the same pumping over sockets.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::{PrimaryTransport, Transport, UpstreamLink, UpstreamTransport, WorkerHandle, WorkerLink};
use crate::types::ProcessIdentity;

/// A worker attached to a primary through in-memory channels
pub struct MemoryWorker {
    pub handle: WorkerHandle,
    pub transport: Arc<UpstreamTransport>,
    pumps: [JoinHandle<()>; 2],
}

impl MemoryWorker {
    pub fn identity(&self) -> ProcessIdentity {
        self.transport.identity()
    }

    /// Simulate the worker process dying: both directions stop and the
    /// primary's handle reports disconnected once the pumps are torn down.
    pub fn kill(self) {
        for pump in &self.pumps {
            pump.abort();
        }
    }
}

/// Connect a worker identity to `primary` through in-memory channels
pub fn connect(primary: &PrimaryTransport, worker: ProcessIdentity) -> MemoryWorker {
    let (handle, worker_link) = primary.attach(worker.worker_id, worker.process_id);
    let (transport, upstream_link) = UpstreamTransport::new(worker);

    let WorkerLink {
        outbound: mut to_worker,
        inbound: from_worker,
    } = worker_link;
    let UpstreamLink {
        outbound: mut to_primary,
        inbound: from_primary,
    } = upstream_link;

    let down = tokio::spawn(async move {
        while let Some(envelope) = to_worker.recv().await {
            from_primary.deliver(&envelope);
        }
    });

    let up = tokio::spawn(async move {
        while let Some(envelope) = to_primary.recv().await {
            from_worker.deliver(&envelope);
        }
    });

    MemoryWorker {
        handle,
        transport: Arc::new(transport),
        pumps: [down, up],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Envelope, Shutdown};
    use crate::transport::{Source, Target};
    use crate::types::WorkerId;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_envelopes_cross_both_ways_until_killed() {
        let primary = PrimaryTransport::new(ProcessIdentity::primary(1));
        let worker = connect(&primary, ProcessIdentity::worker(WorkerId(1), 2));

        let (up_tx, mut up_rx) = mpsc::unbounded_channel();
        primary.on_message(
            Source::AllWorkers,
            Arc::new(move |envelope: &Envelope| {
                let _ = up_tx.send(envelope.clone());
            }),
        );
        let (down_tx, mut down_rx) = mpsc::unbounded_channel();
        worker.transport.on_message(
            Source::Inbound,
            Arc::new(move |envelope: &Envelope| {
                let _ = down_tx.send(envelope.clone());
            }),
        );

        let envelope = Envelope::wrap(&Shutdown { reason: "x".into() }).unwrap();
        worker.transport.send(Target::Default, envelope.clone());
        primary.send(Target::Workers(std::slice::from_ref(&worker.handle)), envelope.clone());

        assert_eq!(timeout(Duration::from_millis(100), up_rx.recv()).await.unwrap(), Some(envelope.clone()));
        assert_eq!(timeout(Duration::from_millis(100), down_rx.recv()).await.unwrap(), Some(envelope));

        let handle = worker.handle.clone();
        assert!(handle.is_connected());
        worker.kill();
        timeout(Duration::from_millis(100), async {
            while handle.is_connected() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
