//! Envelope sealing under a session's shared secret.
//!
//! Every message after the handshake travels as one envelope. A fresh random
//! nonce is drawn per envelope, so the same plaintext never produces the same
//! bytes twice.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};
use crate::keys::SharedSecret;

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// ChaCha20-Poly1305 nonce length.
pub const NONCE_LEN: usize = 12;

/// Poly1305 tag length.
pub const TAG_LEN: usize = 16;

/// Smallest valid envelope: version, nonce and the tag of an empty plaintext.
pub const MIN_ENVELOPE_LEN: usize = 1 + NONCE_LEN + TAG_LEN;

/// Seal `plaintext` into an envelope.
///
/// An empty plaintext is allowed and opens back to an empty plaintext.
pub fn encrypt(shared: &SharedSecret, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(shared, CryptoError::EncryptionError)?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;

    let mut envelope = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
    envelope.push(ENVELOPE_VERSION);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Open an envelope.
///
/// Fails on absent, empty, truncated or tampered input. Never returns
/// partially decrypted data.
pub fn decrypt(shared: &SharedSecret, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(CryptoError::MalformedEnvelope(format!(
            "expected at least {} bytes, got {}",
            MIN_ENVELOPE_LEN,
            envelope.len()
        )));
    }

    let (version, rest) = envelope.split_at(1);
    if version[0] != ENVELOPE_VERSION {
        return Err(CryptoError::MalformedEnvelope(format!(
            "unsupported envelope version {}",
            version[0]
        )));
    }

    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
    let cipher = cipher_for(shared, CryptoError::DecryptionError)?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| CryptoError::DecryptionError(e.to_string()))
}

fn cipher_for(
    shared: &SharedSecret,
    on_error: fn(String) -> CryptoError,
) -> Result<ChaCha20Poly1305> {
    let mut key = shared.envelope_key();
    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|e| on_error(e.to_string()));
    key.zeroize();
    cipher
}
