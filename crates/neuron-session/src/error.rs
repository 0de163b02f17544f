//! Error types for the session layer.

use neuron_core::{CoreError, DecodeError, ErrorKind, Status};
use neuron_crypto::CryptoError;
use thiserror::Error;

use crate::session::SessionState;

/// Errors raised while moving frames over a stream.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound frame length prefix exceeds the limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A frame we tried to send exceeds the limit.
    #[error("outbound frame too large: {size} bytes (max {max})")]
    OutboundTooLarge { size: usize, max: usize },

    /// Frame body could not be encoded or decoded.
    #[error("frame codec error: {0}")]
    Codec(String),

    /// Peer sent a frame that is not valid at this point.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Peer aborted the stream.
    #[error("stream aborted by peer: {0}")]
    Remote(Status),

    /// Peer is gone.
    #[error("stream closed")]
    Closed,
}

/// Errors that end a session or a single client call.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Handshake could not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Peer public key was rejected.
    #[error("invalid peer key: {0}")]
    InvalidPeerKey(#[source] CryptoError),

    /// Inbound envelope could not be opened.
    #[error("cannot decrypt message: {0}")]
    Decrypt(#[source] CryptoError),

    /// Local crypto failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Request plaintext could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Response encoding or decoding failed.
    #[error(transparent)]
    Encoding(#[from] CoreError),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The peer answered with a failed status.
    #[error(transparent)]
    Status(Status),

    /// Response variant does not match the request.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Operation not allowed in the current state.
    #[error("operation requires {expected:?} state, session is {actual:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    /// Peer finished the stream while a response was pending.
    #[error("stream closed before a response arrived")]
    Closed,
}

impl SessionError {
    /// Map onto the boundary status sent to (or received from) the peer.
    pub fn to_status(&self) -> Status {
        match self {
            SessionError::Handshake(_) | SessionError::InvalidPeerKey(_) => {
                Status::invalid_argument(self.to_string())
            }
            SessionError::Decrypt(_) => Status::invalid_argument(self.to_string()),
            SessionError::Decode(e) => e.to_status(),
            SessionError::Status(status) => status.clone(),
            SessionError::Transport(TransportError::Remote(status)) => status.clone(),
            SessionError::Transport(TransportError::FrameTooLarge { .. }) => {
                Status::invalid_argument(self.to_string())
            }
            SessionError::Crypto(_)
            | SessionError::Encoding(_)
            | SessionError::Transport(_)
            | SessionError::UnexpectedResponse(_)
            | SessionError::InvalidState { .. }
            | SessionError::Closed => Status::internal(self.to_string()),
        }
    }

    /// The boundary kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.to_status().kind
    }
}

/// Log a failed call at the severity its kind deserves.
pub fn log_status(status: &Status) {
    if status.kind.is_client_error() {
        tracing::warn!(kind = %status.kind, message = %status.message, "request failed");
    } else {
        tracing::error!(kind = %status.kind, message = %status.message, "request failed");
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_errors_are_invalid_argument() {
        let err = SessionError::InvalidPeerKey(CryptoError::InvalidPublicKey(3));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            SessionError::Handshake("no key".into()).kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_remote_status_passes_through() {
        let status = Status::unimplemented("unknown request type: frobnicate");
        let err = SessionError::Transport(TransportError::Remote(status.clone()));
        assert_eq!(err.to_status(), status);
    }

    #[test]
    fn test_transport_failure_is_internal() {
        let err = SessionError::from(TransportError::Closed);
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_oversize_blame_follows_direction() {
        let inbound = SessionError::from(TransportError::FrameTooLarge { size: 10, max: 5 });
        assert_eq!(inbound.kind(), ErrorKind::InvalidArgument);

        let outbound = SessionError::from(TransportError::OutboundTooLarge { size: 10, max: 5 });
        assert_eq!(outbound.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_decode_errors_keep_their_kind() {
        let unknown = SessionError::from(DecodeError::UnknownOperation("nope".into()));
        assert_eq!(unknown.kind(), ErrorKind::Unimplemented);

        let malformed = SessionError::from(DecodeError::Malformed("bad".into()));
        assert_eq!(malformed.kind(), ErrorKind::InvalidArgument);
    }
}
