//! SQLite implementation of the DocumentStore trait.
//!
//! This is the primary storage backend for the Neuron document vault. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use neuron_core::{mint_document_id, Clock, Document, SystemClock, Timestamp, LIST_LIMIT};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::DocumentStore;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    /// Source of `created_at`.
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Replace the clock used to stamp `created_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

// Helper to convert a row to Document
fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get("id")?,
        owner: row.get("owner")?,
        content: row.get("content")?,
        created_at: Timestamp::from_micros(row.get("created_at")?),
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, owner: &str, content: &str, name: &str) -> Result<Document> {
        let doc = Document {
            id: mint_document_id(name),
            owner: owner.to_string(),
            content: content.to_string(),
            created_at: self.clock.now(),
        };

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO documents (id, owner, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![doc.id, doc.owner, doc.content, doc.created_at.as_micros()],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::AlreadyExists(doc.id.clone())
                } else {
                    StoreError::from(e)
                }
            })?;

            tracing::debug!(id = %doc.id, owner = %doc.owner, "inserted document");
            Ok(doc)
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Document> {
        let id = id.to_string();

        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, owner, content, created_at FROM documents WHERE id = ?1",
                params![id],
                row_to_document,
            )
            .optional()?
            .ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<Document>> {
        let owner = owner.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, owner, content, created_at FROM documents
                 WHERE owner = ?1
                 ORDER BY created_at DESC, seq DESC
                 LIMIT ?2",
            )?;

            let docs = stmt
                .query_map(params![owner, LIST_LIMIT as i64], row_to_document)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(docs)
        })
        .await
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64> {
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM documents WHERE created_at < ?1",
                params![cutoff.as_micros()],
            )?;
            Ok(deleted as u64)
        })
        .await
    }
}
