//! Wire frames.
//!
//! Every frame on a connection is a 4-byte big-endian length followed by a
//! CBOR body:
//!
//! ```text
//! +----------------+---------------------------+
//! | length (u32 BE)| CBOR-encoded Frame        |
//! +----------------+---------------------------+
//! ```
//!
//! A connection opens with exactly one [`Frame::Open`] naming the call. After
//! that each side sends [`Frame::Message`]s and ends its half with either
//! [`Frame::End`] or [`Frame::Abort`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use neuron_core::Status;

use crate::error::TransportError;

/// Size of the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest frame body accepted (4 MiB).
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// The remote call a connection is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Stateless health check.
    Ping,
    /// Handshake, then decrypt and re-encrypt every message.
    Echo,
    /// Handshake, then typed document requests.
    Session,
}

/// A single frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    /// First frame from the client.
    Open(Method),
    /// One message: a raw public key during the handshake, an envelope after.
    Message(Bytes),
    /// Sender finished cleanly.
    End,
    /// Sender terminated the stream with an error.
    Abort(Status),
}

impl Frame {
    /// Encode with the length prefix.
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; LENGTH_PREFIX_LEN];
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| TransportError::Codec(e.to_string()))?;

        let body_len = buf.len() - LENGTH_PREFIX_LEN;
        if body_len > MAX_FRAME_LEN {
            return Err(TransportError::OutboundTooLarge {
                size: body_len,
                max: MAX_FRAME_LEN,
            });
        }

        // body_len <= MAX_FRAME_LEN, fits in u32
        buf[..LENGTH_PREFIX_LEN].copy_from_slice(&(body_len as u32).to_be_bytes());
        Ok(buf)
    }

    /// Decode a frame body (without the length prefix).
    pub fn decode_body(body: &[u8]) -> Result<Self, TransportError> {
        ciborium::from_reader(body).map_err(|e| TransportError::Codec(e.to_string()))
    }
}

/// Read one frame.
///
/// Returns `None` if the stream ends cleanly on a frame boundary.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::Protocol(
                "stream ended inside a length prefix".into(),
            ));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::Protocol("stream ended inside a frame".into())
        } else {
            TransportError::Io(e)
        }
    })?;

    Frame::decode_body(&body).map(Some)
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let buf = frame.encode()?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
