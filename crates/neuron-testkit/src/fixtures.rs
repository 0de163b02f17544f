//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use neuron_core::{Clock, Timestamp};
use neuron_session::{
    pair, shutdown_channel, ClientSession, Dispatcher, MemoryStream, ServerSession,
};
use neuron_store::MemoryStore;

/// Fixed starting time for fixtures: 2023-11-14T22:13:20Z.
pub const START_MICROS: i64 = 1_700_000_000_000_000;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `start`.
    pub fn new(start: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            micros: AtomicI64::new(start.as_micros()),
        })
    }

    /// Jump to `now`.
    pub fn set(&self, now: Timestamp) {
        self.micros.store(now.as_micros(), Ordering::SeqCst);
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        let now = self.now().saturating_add(by);
        self.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

/// The server half of an in-memory session.
pub type ServerHandle = JoinHandle<neuron_session::Result<()>>;

/// A manual clock, an in-memory store on that clock, and a shutdown signal
/// for any sessions served from it.
pub struct TestFixture {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TestFixture {
    /// Create a fixture with the clock at [`START_MICROS`].
    pub fn new() -> Self {
        let clock = ManualClock::new(Timestamp::from_micros(START_MICROS));
        let store = Arc::new(MemoryStore::new().with_clock(clock.clone()));
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        Self {
            clock,
            store,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// A dispatcher over the fixture's store.
    pub fn dispatcher(&self) -> Dispatcher<MemoryStore> {
        Dispatcher::new(self.store.clone())
    }

    /// A receiver for the fixture's shutdown signal.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Request shutdown of every session served from this fixture.
    pub fn shutdown(&self) {
        // Receivers are held by the fixture itself, so this cannot fail.
        let _ = self.shutdown_tx.send(true);
    }

    /// Serve a typed session over an in-memory stream and connect a client.
    pub async fn open_session(&self) -> (ClientSession<MemoryStream>, ServerHandle) {
        let (client_end, server_end) = pair();
        let dispatcher = self.dispatcher();
        let mut shutdown = self.shutdown_signal();

        let server = tokio::spawn(async move {
            let mut session = ServerSession::new(server_end);
            let result = session.serve(&dispatcher, &mut shutdown).await;
            result
        });

        let client = match ClientSession::connect(client_end).await {
            Ok(client) => client,
            Err(e) => panic!("in-memory handshake failed: {}", e),
        };
        (client, server)
    }

    /// Serve an echo session over an in-memory stream and connect a client.
    pub async fn open_echo(&self) -> (ClientSession<MemoryStream>, ServerHandle) {
        let (client_end, server_end) = pair();
        let mut shutdown = self.shutdown_signal();

        let server = tokio::spawn(async move {
            let mut session = ServerSession::new(server_end);
            let result = session.echo(&mut shutdown).await;
            result
        });

        let client = match ClientSession::connect(client_end).await {
            Ok(client) => client,
            Err(e) => panic!("in-memory handshake failed: {}", e),
        };
        (client, server)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
