//! TCP connection to the primary
//!
//! Opens with a `Hello` frame, then pumps envelopes between the socket and an
//! [`UpstreamTransport`] until either side goes away.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use shared::codec::{read_frame, write_frame};
use shared::transport::UpstreamLink;
use shared::{
    process_debug, process_warn, Frame, ProcessIdentity, SharedError, UpstreamTransport,
};

use crate::error::{WorkerError, WorkerResult};

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_millis(200);

pub struct UpstreamConnection {
    transport: Arc<UpstreamTransport>,
    closed: Option<oneshot::Receiver<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl UpstreamConnection {
    /// Connect to the primary and introduce ourselves
    pub async fn connect(primary_addr: SocketAddr, identity: ProcessIdentity) -> WorkerResult<Self> {
        let mut stream = connect_with_retry(primary_addr, identity).await?;
        write_frame(
            &mut stream,
            &Frame::Hello {
                worker_id: identity.worker_id,
                process_id: identity.process_id,
            },
        )
        .await?;

        let (mut reader, mut writer) = stream.into_split();
        let (transport, link) = UpstreamTransport::new(identity);
        let UpstreamLink {
            outbound: mut to_primary,
            inbound: from_primary,
        } = link;

        let writer_task = tokio::spawn(async move {
            while let Some(envelope) = to_primary.recv().await {
                if let Err(e) = write_frame(&mut writer, &Frame::Event(envelope)).await {
                    process_debug!(identity, "🔌 Write to primary failed: {}", e);
                    break;
                }
            }
        });
        let writer_abort = writer_task.abort_handle();

        let (closed_tx, closed_rx) = oneshot::channel();
        let reader_task = tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(Frame::Event(envelope))) => from_primary.deliver(&envelope),
                    Ok(Some(Frame::Hello { .. })) => {
                        process_debug!(identity, "🗑️ Ignoring hello frame from primary");
                    }
                    Ok(None) => break,
                    Err(SharedError::DeserializationError { message }) => {
                        process_debug!(identity, "🗑️ Dropping undecodable frame from primary: {}", message);
                    }
                    Err(e) => {
                        process_warn!(identity, "⚠️ Reading from primary failed: {}", e);
                        break;
                    }
                }
            }
            writer_abort.abort();
            let _ = closed_tx.send(());
        });

        process_debug!(identity, "🔗 Connected to primary at {}", primary_addr);
        Ok(Self {
            transport: Arc::new(transport),
            closed: Some(closed_rx),
            tasks: vec![writer_task, reader_task],
        })
    }

    pub fn transport(&self) -> Arc<UpstreamTransport> {
        self.transport.clone()
    }

    /// Resolves once the primary side of the connection is gone
    pub async fn closed(&mut self) {
        if let Some(closed) = self.closed.take() {
            let _ = closed.await;
        }
    }
}

impl Drop for UpstreamConnection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn connect_with_retry(addr: SocketAddr, identity: ProcessIdentity) -> WorkerResult<TcpStream> {
    let mut attempt = 1;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                process_debug!(
                    identity,
                    "🔁 Connect attempt {}/{} to {} failed: {}",
                    attempt,
                    CONNECT_ATTEMPTS,
                    addr,
                    e
                );
                tokio::time::sleep(CONNECT_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(WorkerError::connection(format!(
                    "Failed to connect to primary at {addr}: {e}"
                )));
            }
        }
    }
}
