//! The service frontier: routes each connection to ping, echo or session.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tracing::debug;

use neuron_core::Status;
use neuron_session::{Dispatcher, Frame, FramedStream, Method, MessageStream, ServerSession};
use neuron_store::DocumentStore;

use crate::error::{Result, ServiceError};

/// The Neuron service over a document store.
pub struct NeuronService<S: ?Sized> {
    dispatcher: Dispatcher<S>,
}

impl<S: ?Sized> Clone for NeuronService<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized + 'static> NeuronService<S> {
    /// Create the service over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            dispatcher: Dispatcher::new(store),
        }
    }

    /// The request dispatcher used by sessions.
    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    /// Health check. Always succeeds with an empty acknowledgement.
    pub fn ping(&self) {}

    /// Serve one connection.
    ///
    /// Reads the opening frame and runs the named call. A connection that
    /// opens with anything else is aborted with `InvalidArgument`.
    pub async fn handle_connection<IO>(
        &self,
        io: IO,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()>
    where
        IO: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut framed = FramedStream::new(io);

        let method = match framed.read_frame().await {
            Ok(Some(Frame::Open(method))) => method,
            Ok(Some(other)) => {
                let err = ServiceError::Protocol(format!(
                    "expected an open frame, got {}",
                    frame_name(&other)
                ));
                abort(&mut framed, &err).await;
                return Err(err);
            }
            Ok(None) => {
                debug!("connection closed before opening a call");
                return Ok(());
            }
            Err(e) => {
                let err = ServiceError::Transport(e);
                abort(&mut framed, &err).await;
                return Err(err);
            }
        };

        debug!(?method, "call opened");
        match method {
            Method::Ping => {
                self.ping();
                framed.finish(Ok(())).await?;
            }
            Method::Echo => {
                let mut session = ServerSession::new(framed);
                session.echo(&mut shutdown).await?;
            }
            Method::Session => {
                let mut session = ServerSession::new(framed);
                session.serve(&self.dispatcher, &mut shutdown).await?;
            }
        }
        Ok(())
    }
}

fn frame_name(frame: &Frame) -> &'static str {
    match frame {
        Frame::Open(_) => "open",
        Frame::Message(_) => "message",
        Frame::End => "end",
        Frame::Abort(_) => "abort",
    }
}

/// Reject a connection that never opened a call.
async fn abort<IO>(framed: &mut FramedStream<IO>, err: &ServiceError)
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    let status = Status::invalid_argument(err.to_string());
    neuron_session::log_status(&status);
    if let Err(e) = framed.finish(Err(status)).await {
        debug!(error = %e, "could not deliver abort");
    }
}
