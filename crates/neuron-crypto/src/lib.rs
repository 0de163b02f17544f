//! # Neuron Crypto
//!
//! The crypto provider behind the session protocol: X25519 key agreement and
//! ChaCha20-Poly1305 envelope encryption.
//!
//! ## Interface
//!
//! The session engine consumes four operations:
//!
//! - [`generate_key_pair`] - a fresh secret blob holding private and public halves
//! - [`derive_shared`] - the shared secret from a local blob and a peer public key
//! - [`encrypt`] - seal a plaintext (possibly empty) into an envelope
//! - [`decrypt`] - open an envelope; fails on absent, truncated or tampered input
//!
//! ## Envelope Layout
//!
//! ```text
//! +---------+------------------+-------------------------------+
//! | version | nonce (12 bytes) | ciphertext || tag (16 bytes)  |
//! +---------+------------------+-------------------------------+
//! ```
//!
//! The symmetric key is derived from the X25519 shared secret with
//! `blake3::derive_key`, so the raw Diffie-Hellman output is never used
//! directly as a cipher key.

pub mod envelope;
pub mod error;
pub mod keys;

pub use envelope::{decrypt, encrypt, ENVELOPE_VERSION, MIN_ENVELOPE_LEN, NONCE_LEN, TAG_LEN};
pub use error::{CryptoError, Result};
pub use keys::{
    derive_shared, generate_key_pair, public_key, KeyPair, PublicKey, SecretBlob, SharedSecret,
    PUBLIC_KEY_LEN, SECRET_BLOB_LEN,
};
