//! Error kinds stable across the service boundary.
//!
//! Lower layers keep their own error enums; before anything leaves the
//! service it is mapped onto one of the four [`ErrorKind`]s below and wrapped
//! in a [`Status`] with a human-readable message.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of a failed call, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed handshake key, malformed request, or a failed validation.
    InvalidArgument,
    /// Lookup by id found nothing.
    NotFound,
    /// Storage, crypto, or transport failure not caused by the caller.
    Internal,
    /// Unrecognized operation tag.
    Unimplemented,
}

impl ErrorKind {
    /// Whether this kind is attributable to the caller's input.
    ///
    /// Client-input kinds are logged at a lower severity than `Internal`.
    pub const fn is_client_error(self) -> bool {
        !matches!(self, ErrorKind::Internal)
    }

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Internal => "internal",
            ErrorKind::Unimplemented => "unimplemented",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call: a stable kind plus a message safe to show the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct Status {
    /// The stable error kind.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
}

impl Status {
    /// Create a status of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unimplemented, message)
    }
}

/// Errors from the pure encoding helpers in this crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let status = Status::not_found("document not found");
        assert_eq!(status.to_string(), "not_found: document not found");
    }

    #[test]
    fn test_client_error_kinds() {
        assert!(ErrorKind::InvalidArgument.is_client_error());
        assert!(ErrorKind::NotFound.is_client_error());
        assert!(ErrorKind::Unimplemented.is_client_error());
        assert!(!ErrorKind::Internal.is_client_error());
    }
}
