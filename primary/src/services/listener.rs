//! TCP endpoint workers connect to
//!
//! Every accepted connection must open with a `Hello` frame. After that the
//! connection is pumped in both directions until either side closes it, at
//! which point the worker leaves the registry.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use shared::codec::{read_frame, write_frame};
use shared::transport::WorkerLink;
use shared::{
    process_debug, process_info, process_warn, Frame, PrimaryTransport, SharedError, Transport,
};

use crate::core::LiveWorkers;
use crate::error::{PrimaryError, PrimaryResult};

pub struct WorkerListener {
    transport: Arc<PrimaryTransport>,
    registry: LiveWorkers,
}

impl WorkerListener {
    pub fn new(transport: Arc<PrimaryTransport>, registry: LiveWorkers) -> Self {
        Self {
            transport,
            registry,
        }
    }

    /// Bind `addr` and start accepting workers in the background.
    ///
    /// Returns the bound address, which differs from `addr` when port 0 was
    /// requested.
    pub async fn bind(&self, addr: SocketAddr) -> PrimaryResult<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| PrimaryError::communication(format!("Failed to bind to {addr}: {e}")))?;
        let local_addr = listener.local_addr()?;

        let transport = self.transport.clone();
        let registry = self.registry.clone();
        let identity = transport.identity();
        process_info!(identity, "👂 Listening for workers on {}", local_addr);

        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let transport = transport.clone();
                        let registry = registry.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, transport, registry).await {
                                process_warn!(identity, "⚠️ Connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        process_warn!(identity, "⚠️ Accept failed: {}", e);
                    }
                }
            }
        });

        Ok((local_addr, task))
    }
}

async fn serve_connection(
    stream: TcpStream,
    transport: Arc<PrimaryTransport>,
    registry: LiveWorkers,
) -> PrimaryResult<()> {
    let identity = transport.identity();
    let (mut reader, mut writer) = stream.into_split();

    let (worker_id, process_id) = match read_frame(&mut reader).await? {
        Some(Frame::Hello {
            worker_id,
            process_id,
        }) if !worker_id.is_primary() => (worker_id, process_id),
        Some(Frame::Hello { .. }) => {
            return Err(SharedError::protocol("worker id 0 is reserved for the primary").into());
        }
        Some(Frame::Event(_)) => {
            return Err(SharedError::protocol("expected hello before events").into());
        }
        None => return Ok(()),
    };

    let (handle, link) = transport.attach(worker_id, process_id);
    let WorkerLink {
        outbound: mut to_worker,
        inbound: from_worker,
    } = link;

    if let Some(replaced) = registry.insert(handle) {
        process_debug!(
            identity,
            "🔁 Worker {} reconnected (pid {} replaces {})",
            worker_id,
            process_id,
            replaced.process_id()
        );
    }
    process_info!(identity, "🤝 Worker {} connected (pid {})", worker_id, process_id);

    let writer_task = tokio::spawn(async move {
        while let Some(envelope) = to_worker.recv().await {
            if let Err(e) = write_frame(&mut writer, &Frame::Event(envelope)).await {
                process_debug!(identity, "🔌 Write to worker {} failed: {}", worker_id, e);
                break;
            }
        }
    });

    let result = loop {
        match read_frame(&mut reader).await {
            Ok(Some(Frame::Event(envelope))) => from_worker.deliver(&envelope),
            Ok(Some(Frame::Hello { .. })) => {
                process_debug!(identity, "🗑️ Ignoring repeated hello from worker {}", worker_id);
            }
            Ok(None) => break Ok(()),
            // The length prefix was consumed, so the stream is still in sync
            Err(SharedError::DeserializationError { message }) => {
                process_debug!(identity, "🗑️ Dropping undecodable frame from worker {}: {}", worker_id, message);
            }
            Err(e) => break Err(e),
        }
    };

    writer_task.abort();
    registry.remove(worker_id, process_id);
    process_info!(identity, "👋 Worker {} disconnected", worker_id);

    result.map_err(Into::into)
}
