//! DocumentStore trait: the abstract interface for document persistence.
//!
//! This trait keeps the dispatcher and the retention sweeper
//! storage-agnostic. Implementations include SQLite (primary) and in-memory
//! (for tests).

use async_trait::async_trait;
use neuron_core::{Document, Timestamp};

use crate::error::Result;

/// The DocumentStore trait: async interface for document persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Concurrency
///
/// Implementations must tolerate concurrent insert, point-read, scan and
/// range-delete from many sessions plus the sweeper, with no locking on the
/// caller's side.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document.
    ///
    /// The id is `name` followed by a fresh random suffix and `created_at` is
    /// the store's current time. Returns the stored document.
    async fn insert(&self, owner: &str, content: &str, name: &str) -> Result<Document>;

    /// Get a document by id.
    ///
    /// Fails with [`StoreError::NotFound`](crate::StoreError::NotFound) if absent.
    async fn get(&self, id: &str) -> Result<Document>;

    /// List an owner's documents, newest first, at most
    /// [`LIST_LIMIT`](neuron_core::LIST_LIMIT) of them.
    ///
    /// An owner with no documents yields an empty list.
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Document>>;

    /// Delete every document with `created_at < cutoff`.
    ///
    /// Returns the number of documents removed.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64>;
}
