//! In-memory implementation of the DocumentStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use neuron_core::{mint_document_id, Clock, Document, SystemClock, Timestamp, LIST_LIMIT};

use crate::error::{Result, StoreError};
use crate::traits::DocumentStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Documents indexed by id.
    documents: HashMap<String, StoredDocument>,

    /// Next insertion sequence number.
    next_seq: u64,
}

struct StoredDocument {
    seq: u64,
    document: Document,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to stamp `created_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of stored documents across all owners.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.documents.len())
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, owner: &str, content: &str, name: &str) -> Result<Document> {
        let document = Document {
            id: mint_document_id(name),
            owner: owner.to_string(),
            content: content.to_string(),
            created_at: self.clock.now(),
        };

        let mut inner = self.write()?;
        if inner.documents.contains_key(&document.id) {
            return Err(StoreError::AlreadyExists(document.id));
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.documents.insert(
            document.id.clone(),
            StoredDocument {
                seq,
                document: document.clone(),
            },
        );

        Ok(document)
    }

    async fn get(&self, id: &str) -> Result<Document> {
        self.read()?
            .documents
            .get(id)
            .map(|stored| stored.document.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Document>> {
        let inner = self.read()?;

        let mut owned: Vec<&StoredDocument> = inner
            .documents
            .values()
            .filter(|stored| stored.document.owner == owner)
            .collect();
        owned.sort_by_key(|stored| Reverse((stored.document.created_at, stored.seq)));

        Ok(owned
            .into_iter()
            .take(LIST_LIMIT)
            .map(|stored| stored.document.clone())
            .collect())
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64> {
        let mut inner = self.write()?;

        let before = inner.documents.len();
        inner
            .documents
            .retain(|_, stored| stored.document.created_at >= cutoff);

        Ok((before - inner.documents.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    use proptest::prelude::*;

    struct TestClock(AtomicI64);

    impl Clock for TestClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_micros(self.0.load(Ordering::SeqCst))
        }
    }

    fn clocked_store(start: i64) -> (MemoryStore, Arc<TestClock>) {
        let clock = Arc::new(TestClock(AtomicI64::new(start)));
        let store = MemoryStore::new().with_clock(clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        assert!(store.is_empty().unwrap());

        let doc = store.insert("user1", "content", "name1").await.unwrap();
        assert!(doc.id.starts_with("name1"));
        assert_eq!(store.len().unwrap(), 1);

        assert_eq!(store.get(&doc.id).await.unwrap(), doc);
        assert!(store.get("missing-id").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_order_and_isolation() {
        let (store, clock) = clocked_store(10);

        let a = store.insert("alice", "content", "first").await.unwrap();
        let b = store.insert("alice", "content", "tied_").await.unwrap();
        clock.0.store(20, Ordering::SeqCst);
        let c = store.insert("alice", "content", "later").await.unwrap();
        store.insert("bobby", "content", "other").await.unwrap();

        let docs = store.list_by_owner("alice").await.unwrap();
        assert_eq!(docs, vec![c, b, a]);
        assert!(store.list_by_owner("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_capped_at_limit() {
        let store = MemoryStore::new();
        for _ in 0..LIST_LIMIT + 1 {
            store.insert("owner", "content", "bulk_").await.unwrap();
        }
        assert_eq!(store.list_by_owner("owner").await.unwrap().len(), LIST_LIMIT);
    }

    #[tokio::test]
    async fn test_delete_before_is_strict() {
        let (store, clock) = clocked_store(100);
        store.insert("owner", "content", "old__").await.unwrap();
        clock.0.store(200, Ordering::SeqCst);
        let kept = store.insert("owner", "content", "kept_").await.unwrap();

        assert_eq!(store.delete_before(Timestamp::from_micros(200)).await.unwrap(), 1);
        assert_eq!(store.list_by_owner("owner").await.unwrap(), vec![kept]);
        assert_eq!(store.delete_before(Timestamp::from_micros(200)).await.unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_list_order_ignores_other_owners(
            inserts in proptest::collection::vec((any::<bool>(), 0i64..50), 0..80),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (store, clock) = clocked_store(0);
                let mut mine = Vec::new();
                for (is_mine, micros) in &inserts {
                    clock.0.store(*micros, Ordering::SeqCst);
                    let owner = if *is_mine { "mine_" } else { "other" };
                    let doc = store.insert(owner, "content", "propt").await.unwrap();
                    if *is_mine {
                        mine.push(doc);
                    }
                }

                // Stable sort keeps insertion order among equal timestamps; reverse it.
                mine.reverse();
                mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                mine.truncate(LIST_LIMIT);

                prop_assert_eq!(store.list_by_owner("mine_").await.unwrap(), mine);
                Ok::<(), TestCaseError>(())
            })?;
        }

        #[test]
        fn prop_delete_before_keeps_exactly_recent(
            times in proptest::collection::vec(0i64..1_000, 0..40),
            cutoff in 0i64..1_000,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (store, clock) = clocked_store(0);
                for t in &times {
                    clock.0.store(*t, Ordering::SeqCst);
                    store.insert("owner", "content", "propt").await.unwrap();
                }

                let expected_deleted = times.iter().filter(|t| **t < cutoff).count() as u64;
                let deleted = store.delete_before(Timestamp::from_micros(cutoff)).await.unwrap();
                prop_assert_eq!(deleted, expected_deleted);

                let remaining = store.list_by_owner("owner").await.unwrap();
                prop_assert!(remaining.iter().all(|d| d.created_at.as_micros() >= cutoff));
                prop_assert!(remaining
                    .windows(2)
                    .all(|w| w[0].created_at >= w[1].created_at));
                Ok(())
            })?;
        }
    }
}
