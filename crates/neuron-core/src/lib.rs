//! # Neuron Core
//!
//! Pure types for the Neuron document vault: documents, the request and
//! response union carried inside encrypted session envelopes, request
//! validation, and the stable error kinds returned to callers.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Document`] - The persisted entity, immutable after creation
//! - [`Timestamp`] / [`Clock`] - Microsecond wall-clock time, injectable for tests
//! - [`Request`] / [`Response`] - The tagged plaintext union inside an envelope
//! - [`ErrorKind`] / [`Status`] - Error kinds stable across the wire boundary
//!
//! ## Wire Encoding
//!
//! Requests and responses are CBOR maps with a single entry keyed by the
//! operation tag. See [`request`] for the decoding rules.

pub mod document;
pub mod error;
pub mod request;
pub mod validation;

pub use document::{mint_document_id, Clock, Document, SystemClock, Timestamp};
pub use error::{CoreError, ErrorKind, Status};
pub use request::{
    decode_request, AddDocument, DecodeError, GetDocument, ListDocuments, Request, Response,
};
pub use validation::{validate_request, LIST_LIMIT, MIN_FIELD_LEN};
