//! Length-prefixed bincode framing for worker <-> primary connections
//!
//! Each frame is a 4-byte big-endian length followed by the bincode encoding
//! of a [`Frame`].

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::{SharedError, SharedResult};
use crate::messages::Envelope;
use crate::types::WorkerId;

/// Upper bound on a single frame
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Everything that travels over a worker connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    /// First frame a worker sends after connecting
    Hello { worker_id: WorkerId, process_id: u32 },
    Event(Envelope),
}

pub fn encode_frame(frame: &Frame) -> SharedResult<Vec<u8>> {
    let data = bincode::serialize(frame).map_err(SharedError::serialization)?;
    if data.len() > MAX_FRAME_BYTES {
        return Err(SharedError::FrameTooLarge {
            len: data.len(),
            limit: MAX_FRAME_BYTES,
        });
    }

    let mut buf = Vec::with_capacity(4 + data.len());
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    buf.extend_from_slice(&data);
    Ok(buf)
}

pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> SharedResult<()>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode_frame(frame)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next frame. `Ok(None)` means the peer closed the connection
/// cleanly between frames.
pub async fn read_frame<R>(reader: &mut R) -> SharedResult<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(SharedError::FrameTooLarge {
            len,
            limit: MAX_FRAME_BYTES,
        });
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;

    bincode::deserialize(&data)
        .map(Some)
        .map_err(SharedError::deserialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{EventName, Shutdown};

    #[tokio::test]
    async fn test_frames_keep_order_on_one_stream() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let hello = Frame::Hello {
            worker_id: WorkerId(2),
            process_id: 777,
        };
        let event = Frame::Event(Envelope::wrap(&Shutdown { reason: "done".into() }).unwrap());

        write_frame(&mut client, &hello).await.unwrap();
        write_frame(&mut client, &event).await.unwrap();
        drop(client);

        assert_eq!(read_frame(&mut server).await.unwrap(), Some(hello));
        match read_frame(&mut server).await.unwrap() {
            Some(Frame::Event(envelope)) => assert_eq!(envelope.event_name, EventName::Shutdown),
            other => panic!("Expected event frame, got {other:?}"),
        }
        assert_eq!(read_frame(&mut server).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);

        let bogus = ((MAX_FRAME_BYTES + 1) as u32).to_be_bytes();
        client.write_all(&bogus).await.unwrap();

        let result = read_frame(&mut server).await;
        assert!(matches!(result, Err(SharedError::FrameTooLarge { .. })));
    }
}
