//! The request/response union carried inside session envelopes.
//!
//! Both directions are CBOR maps with exactly one entry whose key names the
//! variant:
//!
//! ```text
//! {"add":  {"owner": .., "content": .., "name": ..}}
//! {"get":  {"id": ..}}
//! {"list": {"owner": ..}}
//!
//! {"document":  {"id": .., "owner": .., "content": .., "created_at": ..}}
//! {"documents": [ .. ]}
//! {"error":     {"kind": .., "message": ..}}
//! ```
//!
//! Decoding a request distinguishes two failure classes. A plaintext whose
//! operation tag is absent or unknown is `Unimplemented`; a plaintext that is
//! not CBOR, is not a map, or carries a known tag with a malformed body is
//! `InvalidArgument`. Both terminate the session stream.

use ciborium::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;
use crate::error::{CoreError, Status};

const TAG_ADD: &str = "add";
const TAG_GET: &str = "get";
const TAG_LIST: &str = "list";

/// Create a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDocument {
    pub owner: String,
    pub content: String,
    /// Prefix for the minted document id.
    pub name: String,
}

/// Fetch one document by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDocument {
    pub id: String,
}

/// List an owner's documents, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDocuments {
    pub owner: String,
}

/// A typed operation, decoded from a decrypted envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Add(AddDocument),
    Get(GetDocument),
    List(ListDocuments),
}

impl Request {
    /// Shorthand for an `Add` request.
    pub fn add(owner: impl Into<String>, content: impl Into<String>, name: impl Into<String>) -> Self {
        Request::Add(AddDocument {
            owner: owner.into(),
            content: content.into(),
            name: name.into(),
        })
    }

    /// Shorthand for a `Get` request.
    pub fn get(id: impl Into<String>) -> Self {
        Request::Get(GetDocument { id: id.into() })
    }

    /// Shorthand for a `List` request.
    pub fn list(owner: impl Into<String>) -> Self {
        Request::List(ListDocuments {
            owner: owner.into(),
        })
    }

    /// The operation tag, as used on the wire and in logs.
    pub const fn tag(&self) -> &'static str {
        match self {
            Request::Add(_) => TAG_ADD,
            Request::Get(_) => TAG_GET,
            Request::List(_) => TAG_LIST,
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        to_cbor(self)
    }
}

/// The typed result of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Result of `Add` and `Get`.
    Document(Document),
    /// Result of `List`.
    Documents(Vec<Document>),
    /// A failure scoped to this single request; the stream stays open.
    Error(Status),
}

impl Response {
    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        to_cbor(self)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

/// Why a request plaintext could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The operation tag is absent or not one this server knows.
    #[error("unknown request type: {0}")]
    UnknownOperation(String),

    /// The plaintext is not a well-formed request.
    #[error("invalid request: {0}")]
    Malformed(String),
}

impl DecodeError {
    /// Map to the status returned to the caller.
    pub fn to_status(&self) -> Status {
        match self {
            DecodeError::UnknownOperation(_) => Status::unimplemented(self.to_string()),
            DecodeError::Malformed(_) => Status::invalid_argument(self.to_string()),
        }
    }
}

/// Decode a decrypted plaintext into a [`Request`].
pub fn decode_request(plaintext: &[u8]) -> Result<Request, DecodeError> {
    // An empty plaintext carries no operation at all.
    if plaintext.is_empty() {
        return Err(DecodeError::UnknownOperation("<absent>".into()));
    }

    let value: Value = ciborium::from_reader(plaintext)
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let mut entries = match value {
        Value::Map(entries) => entries,
        Value::Null => return Err(DecodeError::UnknownOperation("<absent>".into())),
        _ => return Err(DecodeError::Malformed("request is not a map".into())),
    };

    let (tag, body) = match entries.len() {
        0 => return Err(DecodeError::UnknownOperation("<absent>".into())),
        1 => entries.remove(0),
        n => {
            return Err(DecodeError::Malformed(format!(
                "request has {} operation entries, expected 1",
                n
            )))
        }
    };

    let tag = match tag {
        Value::Text(tag) => tag,
        other => return Err(DecodeError::UnknownOperation(format!("{:?}", other))),
    };

    let malformed = |e: ciborium::value::Error| DecodeError::Malformed(format!("{}: {}", tag, e));
    match tag.as_str() {
        TAG_ADD => body.deserialized().map(Request::Add).map_err(malformed),
        TAG_GET => body.deserialized().map(Request::Get).map_err(malformed),
        TAG_LIST => body.deserialized().map(Request::List).map_err(malformed),
        _ => Err(DecodeError::UnknownOperation(tag.clone())),
    }
}

fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}
