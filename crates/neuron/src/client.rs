//! TCP client.
//!
//! Every call runs on its own connection: the client connects, sends the
//! opening frame and then speaks the call's protocol.

use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpStream, ToSocketAddrs};

use neuron_session::{ClientSession, Frame, FramedStream, Method, MessageStream};

use crate::error::{Result, ServiceError};

/// A session running over TCP.
pub type TcpSession = ClientSession<FramedStream<TcpStream>>;

/// Client for a Neuron server.
#[derive(Debug, Clone)]
pub struct NeuronClient {
    addr: SocketAddr,
}

impl NeuronClient {
    /// Resolve the server address.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let addr = lookup_host(addr)
            .await?
            .next()
            .ok_or_else(|| ServiceError::Resolve("no addresses".into()))?;
        Ok(Self { addr })
    }

    /// The resolved server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Health check.
    pub async fn ping(&self) -> Result<()> {
        let mut framed = self.open(Method::Ping).await?;
        match framed.recv().await? {
            None => Ok(()),
            Some(_) => Err(ServiceError::Protocol("ping answered with a message".into())),
        }
    }

    /// Open a typed document session.
    pub async fn open_session(&self) -> Result<TcpSession> {
        let framed = self.open(Method::Session).await?;
        Ok(ClientSession::connect(framed).await?)
    }

    /// Open an echo session.
    pub async fn open_echo(&self) -> Result<TcpSession> {
        let framed = self.open(Method::Echo).await?;
        Ok(ClientSession::connect(framed).await?)
    }

    async fn open(&self, method: Method) -> Result<FramedStream<TcpStream>> {
        let stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;

        let mut framed = FramedStream::new(stream);
        framed.write_frame(&Frame::Open(method)).await?;
        Ok(framed)
    }
}
