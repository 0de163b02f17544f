//! # Neuron Store
//!
//! Storage abstraction for the Neuron document vault. Provides a trait-based
//! interface for document persistence with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`DocumentStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use neuron_store::{DocumentStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("neuron.db").unwrap();
//!
//!     let doc = store.insert("alice", "hello world", "notes").await.unwrap();
//!     let same = store.get(&doc.id).await.unwrap();
//!     assert_eq!(doc, same);
//!
//!     let newest_first = store.list_by_owner("alice").await.unwrap();
//!     assert_eq!(newest_first.len(), 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Immutable rows**: documents are inserted and deleted, never updated
//! - **Store-assigned time**: `created_at` comes from the store's [`Clock`](neuron_core::Clock)
//! - **Concurrent callers**: every implementation is safe to share across
//!   sessions and the retention sweeper without caller-side locking

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::DocumentStore;
