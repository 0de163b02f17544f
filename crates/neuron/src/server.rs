//! TCP server with graceful drain.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use neuron_session::cancelled;
use neuron_store::DocumentStore;

use crate::error::Result;
use crate::service::NeuronService;

/// Default bound on waiting for live connections at shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts TCP connections and serves each on its own task.
pub struct Server<S: ?Sized> {
    listener: TcpListener,
    service: NeuronService<S>,
    drain_timeout: Duration,
}

impl<S: DocumentStore + ?Sized + 'static> Server<S> {
    /// Bind a listener.
    pub async fn bind(addr: impl ToSocketAddrs, service: NeuronService<S>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            service,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        })
    }

    /// Set how long shutdown waits for live connections.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` is raised, then drain.
    ///
    /// On shutdown the listener is closed first. Live connections see the
    /// same signal and end after the frame they are processing; any still
    /// running when the drain timeout expires are aborted.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let Server {
            listener,
            service,
            drain_timeout,
        } = self;
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        let service = service.clone();
                        let signal = shutdown.clone();
                        connections.spawn(async move {
                            if let Err(e) = service.handle_connection(stream, signal).await {
                                debug!(%peer, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "connection task failed");
                    }
                }
            }
        }

        drop(listener);
        info!(live = connections.len(), "server draining connections");

        let drained = tokio::time::timeout(drain_timeout, async {
            while let Some(joined) = connections.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "connection task failed");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                "drain timed out, aborting remaining connections"
            );
            connections.shutdown().await;
        }

        info!("server stopped");
        Ok(())
    }
}
