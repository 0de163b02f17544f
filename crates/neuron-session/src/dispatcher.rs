//! Request dispatch: one decrypted plaintext in, one typed response out.

use std::sync::Arc;

use neuron_core::{decode_request, validate_request, Document, Request, Response, Status};
use neuron_store::{DocumentStore, StoreError};

use crate::error::log_status;
use crate::frame::MAX_FRAME_LEN;

/// Room left in a frame for the envelope, frame and response wrappers.
const FRAME_HEADROOM: usize = 1024;

/// Largest total encoded size of the documents in one `List` response.
pub const MAX_LIST_BYTES: usize = MAX_FRAME_LEN - FRAME_HEADROOM;

/// Turns decrypted request plaintexts into store operations.
///
/// Cheap to clone; every session gets its own handle onto the shared store.
pub struct Dispatcher<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore + ?Sized> Dispatcher<S> {
    /// Create a dispatcher over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Decode, validate and execute one request plaintext.
    ///
    /// `Ok(Response::Error(..))` is a failure scoped to this message; the
    /// stream stays usable. `Err` means the stream must be terminated with
    /// the returned status.
    pub async fn dispatch(&self, plaintext: &[u8]) -> Result<Response, Status> {
        let request = decode_request(plaintext).map_err(|e| {
            let status = e.to_status();
            log_status(&status);
            status
        })?;

        match self.handle(request).await {
            Ok(response) => Ok(response),
            Err(status) if status.kind.is_client_error() => {
                log_status(&status);
                Ok(Response::Error(status))
            }
            // Internal failures are logged with their cause where they arise.
            Err(status) => Err(status),
        }
    }

    /// Validate and execute an already-decoded request.
    pub async fn handle(&self, request: Request) -> Result<Response, Status> {
        validate_request(&request)?;

        match request {
            Request::Add(add) => {
                let doc = self
                    .store
                    .insert(&add.owner, &add.content, &add.name)
                    .await
                    .map_err(store_status)?;
                tracing::debug!(id = %doc.id, owner = %doc.owner, "document added");
                Ok(Response::Document(doc))
            }
            Request::Get(get) => self
                .store
                .get(&get.id)
                .await
                .map(Response::Document)
                .map_err(store_status),
            Request::List(list) => {
                let docs = self
                    .store
                    .list_by_owner(&list.owner)
                    .await
                    .map_err(store_status)?;
                let docs = fit_to_frame(docs)?;
                tracing::debug!(owner = %list.owner, count = docs.len(), "documents listed");
                Ok(Response::Documents(docs))
            }
        }
    }
}

/// Keep the newest documents whose encoded size fits in one frame.
///
/// `docs` is newest first, so trimming drops the oldest entries.
fn fit_to_frame(mut docs: Vec<Document>) -> Result<Vec<Document>, Status> {
    let mut buf = Vec::new();
    let mut total = 0usize;
    let mut keep = docs.len();

    for (i, doc) in docs.iter().enumerate() {
        buf.clear();
        ciborium::into_writer(doc, &mut buf).map_err(|e| {
            tracing::error!(error = %e, "cannot encode listed document");
            Status::internal("encoding failure")
        })?;
        total += buf.len();
        if total > MAX_LIST_BYTES {
            keep = i;
            break;
        }
    }

    if keep < docs.len() {
        tracing::warn!(
            kept = keep,
            dropped = docs.len() - keep,
            "list response trimmed to fit one frame"
        );
        docs.truncate(keep);
    }
    Ok(docs)
}

/// Map a store error to a caller-safe status.
fn store_status(err: StoreError) -> Status {
    match err {
        StoreError::NotFound(_) => Status::not_found("document not found"),
        other => {
            tracing::error!(error = %other, "storage failure");
            Status::internal("storage failure")
        }
    }
}
