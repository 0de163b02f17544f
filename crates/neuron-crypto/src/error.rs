//! Error types for the crypto provider.

use thiserror::Error;

/// Errors that can occur during key agreement or envelope handling.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Peer public key has the wrong length.
    #[error("invalid public key: expected 32 bytes, got {0}")]
    InvalidPublicKey(usize),

    /// Key agreement produced an all-zero secret (low-order peer point).
    #[error("key agreement is not contributory")]
    NonContributory,

    /// Secret blob is malformed or inconsistent.
    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    /// Envelope is absent, too short, or has an unknown version.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Authentication failed while decrypting.
    #[error("decryption error: {0}")]
    DecryptionError(String),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
