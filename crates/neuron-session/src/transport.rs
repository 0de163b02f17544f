//! Message stream abstraction for sessions.
//!
//! A session only needs an ordered, bidirectional sequence of opaque
//! messages plus a way to end its half. Implementations carry those messages
//! as [`Frame`]s over a byte stream or over in-process channels.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use neuron_core::Status;

use crate::error::TransportError;
use crate::frame::{read_frame, write_frame, Frame};

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// One side of a bidirectional message stream.
#[async_trait]
pub trait MessageStream: Send {
    /// Receive the next message.
    ///
    /// Returns `None` once the peer has finished cleanly. A peer abort
    /// surfaces as [`TransportError::Remote`].
    async fn recv(&mut self) -> Result<Option<Bytes>>;

    /// Send one message.
    async fn send(&mut self, message: Bytes) -> Result<()>;

    /// End this side of the stream, cleanly or with an error status.
    async fn finish(&mut self, outcome: std::result::Result<(), Status>) -> Result<()>;
}

/// Interpret a frame received in the message phase.
fn inbound(frame: Option<Frame>) -> Result<Option<Bytes>> {
    match frame {
        Some(Frame::Message(message)) => Ok(Some(message)),
        Some(Frame::End) | None => Ok(None),
        Some(Frame::Abort(status)) => Err(TransportError::Remote(status)),
        Some(Frame::Open(method)) => Err(TransportError::Protocol(format!(
            "unexpected open frame for {:?}",
            method
        ))),
    }
}

fn closing_frame(outcome: std::result::Result<(), Status>) -> Frame {
    match outcome {
        Ok(()) => Frame::End,
        Err(status) => Frame::Abort(status),
    }
}

/// Length-prefixed frames over any async byte stream (TCP in production).
pub struct FramedStream<IO> {
    io: IO,
    finished: bool,
}

impl<IO> FramedStream<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a byte stream.
    pub fn new(io: IO) -> Self {
        Self {
            io,
            finished: false,
        }
    }

    /// Read one raw frame, including `Open`.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        read_frame(&mut self.io).await
    }

    /// Write one raw frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            return Err(TransportError::Closed);
        }
        write_frame(&mut self.io, frame).await
    }

    /// Unwrap the byte stream.
    pub fn into_inner(self) -> IO {
        self.io
    }
}

#[async_trait]
impl<IO> MessageStream for FramedStream<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<Bytes>> {
        let frame = self.read_frame().await?;
        inbound(frame)
    }

    async fn send(&mut self, message: Bytes) -> Result<()> {
        self.write_frame(&Frame::Message(message)).await
    }

    async fn finish(&mut self, outcome: std::result::Result<(), Status>) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.write_frame(&closing_frame(outcome)).await?;
        self.finished = true;
        self.io.shutdown().await?;
        Ok(())
    }
}

/// In-process message streams for testing.
///
/// Uses channels to simulate a connection between two endpoints.
pub mod memory {
    use super::*;
    use tokio::sync::mpsc;

    /// Messages buffered per direction before `send` waits.
    const CHANNEL_CAPACITY: usize = 64;

    /// One end of an in-memory connection.
    pub struct MemoryStream {
        tx: Option<mpsc::Sender<Frame>>,
        rx: mpsc::Receiver<Frame>,
    }

    /// Create two connected endpoints.
    pub fn pair() -> (MemoryStream, MemoryStream) {
        let (a_tx, a_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            MemoryStream {
                tx: Some(a_tx),
                rx: b_rx,
            },
            MemoryStream {
                tx: Some(b_tx),
                rx: a_rx,
            },
        )
    }

    impl MemoryStream {
        async fn push(&mut self, frame: Frame) -> Result<()> {
            let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
            tx.send(frame).await.map_err(|_| TransportError::Closed)
        }
    }

    #[async_trait]
    impl MessageStream for MemoryStream {
        async fn recv(&mut self) -> Result<Option<Bytes>> {
            inbound(self.rx.recv().await)
        }

        async fn send(&mut self, message: Bytes) -> Result<()> {
            self.push(Frame::Message(message)).await
        }

        async fn finish(&mut self, outcome: std::result::Result<(), Status>) -> Result<()> {
            if self.tx.is_none() {
                return Ok(());
            }
            let result = self.push(closing_frame(outcome)).await;
            self.tx = None;
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::pair;
    use super::*;

    #[tokio::test]
    async fn test_memory_stream_send_recv() {
        let (mut a, mut b) = pair();

        a.send(Bytes::from_static(b"hello")).await.unwrap();
        a.send(Bytes::new()).await.unwrap();
        a.finish(Ok(())).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Some(Bytes::from_static(b"hello")));
        assert_eq!(b.recv().await.unwrap(), Some(Bytes::new()));
        assert_eq!(b.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_abort_surfaces_status() {
        let (mut a, mut b) = pair();
        let status = Status::invalid_argument("bad key");

        a.finish(Err(status.clone())).await.unwrap();

        match b.recv().await {
            Err(TransportError::Remote(received)) => assert_eq!(received, status),
            other => panic!("expected remote abort, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_memory_send_after_finish_fails() {
        let (mut a, _b) = pair();
        a.finish(Ok(())).await.unwrap();
        assert!(matches!(
            a.send(Bytes::from_static(b"late")).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_dropped_peer_reads_as_end() {
        let (a, mut b) = pair();
        drop(a);
        assert_eq!(b.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_framed_stream_round_trip() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let mut client = FramedStream::new(client_io);
        let mut server = FramedStream::new(server_io);

        client.send(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), Some(Bytes::from_static(b"ping")));

        server
            .finish(Err(Status::unimplemented("unknown request type: x")))
            .await
            .unwrap();
        assert!(matches!(
            client.recv().await,
            Err(TransportError::Remote(status)) if status.kind == neuron_core::ErrorKind::Unimplemented
        ));
    }

    #[tokio::test]
    async fn test_open_frame_mid_stream_is_protocol_error() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let mut client = FramedStream::new(client_io);
        let mut server = FramedStream::new(server_io);

        client
            .write_frame(&Frame::Open(crate::frame::Method::Ping))
            .await
            .unwrap();
        assert!(matches!(
            server.recv().await,
            Err(TransportError::Protocol(_))
        ));
    }
}
