//! Shutdown signalling shared by sessions, the server and the sweeper.

use tokio::sync::watch;

/// Create a shutdown signal: send `true` to request shutdown.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolve once shutdown has been requested.
///
/// A dropped sender counts as a request.
pub async fn cancelled(signal: &mut watch::Receiver<bool>) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            return;
        }
    }
}

/// Whether shutdown has been requested, without waiting.
pub fn is_cancelled(signal: &watch::Receiver<bool>) -> bool {
    *signal.borrow() || signal.has_changed().is_err()
}
