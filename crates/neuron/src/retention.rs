//! Background retention sweeper.
//!
//! Spawns a tokio task that periodically deletes documents older than the
//! configured maximum age. The task stops when its cancellation signal is
//! raised; the owner learns that it stopped through a separate completion
//! handle it can wait on with its own timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use neuron_core::{Clock, Timestamp};
use neuron_session::cancelled;
use neuron_store::{DocumentStore, StoreError};

use crate::error::RetentionError;

/// Sweeper settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Documents older than this are deleted.
    pub max_age: Duration,
    /// Time between sweeps.
    pub interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(30 * 60),
            interval: Duration::from_secs(60),
        }
    }
}

/// What the sweeper did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sweeps attempted.
    pub ticks: u64,
    /// Documents deleted across all sweeps.
    pub deleted: u64,
    /// Sweeps that failed.
    pub failures: u64,
}

/// Delete every document created before `now - max_age`.
///
/// Returns the number of documents removed.
pub async fn sweep_once<S>(store: &S, clock: &dyn Clock, max_age: Duration) -> Result<u64, StoreError>
where
    S: DocumentStore + ?Sized,
{
    let cutoff: Timestamp = clock.now().saturating_sub(max_age);
    let deleted = store.delete_before(cutoff).await?;

    if deleted > 0 {
        info!(deleted, %cutoff, "retention sweep removed expired documents");
    } else {
        debug!(%cutoff, "retention sweep found nothing to remove");
    }
    Ok(deleted)
}

/// Completion handle for a spawned sweeper.
#[derive(Debug)]
pub struct SweeperCompletion {
    done: oneshot::Receiver<SweepReport>,
}

impl SweeperCompletion {
    /// Wait for the sweeper to stop, for at most `timeout`.
    ///
    /// Only cancellation makes the sweeper stop, so raise the cancellation
    /// signal before waiting.
    pub async fn wait(self, timeout: Duration) -> Result<SweepReport, RetentionError> {
        match tokio::time::timeout(timeout, self.done).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(_)) => Err(RetentionError::Lost),
            Err(_) => Err(RetentionError::ShutdownTimeout(timeout)),
        }
    }
}

/// Spawn the sweeper loop.
///
/// Every `config.interval` it runs [`sweep_once`]. A failed sweep is logged
/// and counted; the loop keeps going. Cancellation is observed between
/// sweeps, never in the middle of one.
pub fn spawn_sweeper<S>(
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: RetentionConfig,
    mut cancel: watch::Receiver<bool>,
) -> SweeperCompletion
where
    S: DocumentStore + ?Sized + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        info!(
            interval_secs = config.interval.as_secs(),
            max_age_secs = config.max_age.as_secs(),
            "retention sweeper started"
        );

        let mut ticker = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut report = SweepReport::default();

        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => break,
                _ = ticker.tick() => {}
            }

            report.ticks += 1;
            match sweep_once(store.as_ref(), clock.as_ref(), config.max_age).await {
                Ok(deleted) => report.deleted += deleted,
                Err(e) => {
                    report.failures += 1;
                    error!(error = %e, "retention sweep failed");
                }
            }
        }

        info!(
            ticks = report.ticks,
            deleted = report.deleted,
            failures = report.failures,
            "retention sweeper stopped"
        );
        // Owner may have stopped waiting.
        let _ = done_tx.send(report);
    });

    SweeperCompletion { done: done_rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use neuron_core::Document;
    use neuron_session::shutdown_channel;
    use neuron_store::MemoryStore;
    use neuron_testkit::{ManualClock, START_MICROS};

    const TICK: Duration = Duration::from_millis(10);
    const AGE: Duration = Duration::from_secs(60);

    /// Store whose range-delete fails a fixed number of times, then hangs or
    /// succeeds.
    struct ScriptedStore {
        failures_left: AtomicU64,
        calls: AtomicU64,
        hang: bool,
    }

    impl ScriptedStore {
        fn failing(times: u64) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicU64::new(times),
                calls: AtomicU64::new(0),
                hang: false,
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicU64::new(0),
                calls: AtomicU64::new(0),
                hang: true,
            })
        }
    }

    #[async_trait]
    impl DocumentStore for ScriptedStore {
        async fn insert(&self, _: &str, _: &str, _: &str) -> neuron_store::Result<Document> {
            Err(StoreError::Task("unused".into()))
        }

        async fn get(&self, id: &str) -> neuron_store::Result<Document> {
            Err(StoreError::NotFound(id.into()))
        }

        async fn list_by_owner(&self, _: &str) -> neuron_store::Result<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn delete_before(&self, _: Timestamp) -> neuron_store::Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Task("disk on fire".into()));
            }
            Ok(0)
        }
    }

    fn config() -> RetentionConfig {
        RetentionConfig {
            max_age: AGE,
            interval: TICK,
        }
    }

    async fn wait_for_calls(store: &ScriptedStore, calls: u64) {
        while store.calls.load(Ordering::SeqCst) < calls {
            tokio::time::sleep(TICK).await;
        }
    }

    #[tokio::test]
    async fn test_sweep_once_uses_cutoff() {
        let clock = ManualClock::new(Timestamp::from_micros(START_MICROS));
        let store = MemoryStore::new().with_clock(clock.clone());

        let old = store.insert("owner", "content", "old__").await.unwrap();
        clock.advance(Duration::from_secs(30));
        let young = store.insert("owner", "content", "young").await.unwrap();
        clock.advance(Duration::from_secs(45));

        // now = start + 75s, cutoff = start + 15s
        assert_eq!(sweep_once(&store, clock.as_ref(), AGE).await.unwrap(), 1);
        assert!(store.get(&old.id).await.unwrap_err().is_not_found());
        assert_eq!(store.get(&young.id).await.unwrap(), young);
    }

    #[tokio::test]
    async fn test_sweeper_deletes_and_stops_on_cancel() {
        let clock = ManualClock::new(Timestamp::from_micros(START_MICROS));
        let store = Arc::new(MemoryStore::new().with_clock(clock.clone()));
        store.insert("owner", "content", "old__").await.unwrap();
        clock.advance(AGE * 2);

        let (cancel_tx, cancel_rx) = shutdown_channel();
        let completion = spawn_sweeper(store.clone(), clock.clone(), config(), cancel_rx);

        while !store.is_empty().unwrap() {
            tokio::time::sleep(TICK).await;
        }

        cancel_tx.send(true).unwrap();
        let report = completion.wait(Duration::from_secs(5)).await.unwrap();
        assert!(report.ticks >= 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failures, 0);
    }

    #[tokio::test]
    async fn test_failed_sweeps_do_not_stop_the_loop() {
        let store = ScriptedStore::failing(2);
        let clock = ManualClock::new(Timestamp::from_micros(START_MICROS));

        let (cancel_tx, cancel_rx) = shutdown_channel();
        let completion = spawn_sweeper(store.clone(), clock, config(), cancel_rx);

        wait_for_calls(&store, 3).await;
        cancel_tx.send(true).unwrap();

        let report = completion.wait(Duration::from_secs(5)).await.unwrap();
        assert_eq!(report.failures, 2);
        assert!(report.ticks >= 3);
    }

    #[tokio::test]
    async fn test_stuck_sweep_times_out() {
        let store = ScriptedStore::hanging();
        let clock = ManualClock::new(Timestamp::from_micros(START_MICROS));

        let (cancel_tx, cancel_rx) = shutdown_channel();
        let completion = spawn_sweeper(store.clone(), clock, config(), cancel_rx);

        wait_for_calls(&store, 1).await;
        cancel_tx.send(true).unwrap();

        let err = completion.wait(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, RetentionError::ShutdownTimeout(_)));
    }

    #[tokio::test]
    async fn test_cancel_before_first_tick() {
        let store = Arc::new(MemoryStore::new());
        let (cancel_tx, cancel_rx) = shutdown_channel();
        cancel_tx.send(true).unwrap();

        let completion = spawn_sweeper(
            store,
            Arc::new(neuron_core::SystemClock),
            RetentionConfig::default(),
            cancel_rx,
        );
        let report = completion.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }
}
