//! X25519 key pairs and shared-secret derivation.

use std::fmt;

use rand::RngCore;
use x25519_dalek::{PublicKey as DalekPublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};

/// Length of a raw X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of a serialized secret blob: private scalar followed by public key.
pub const SECRET_BLOB_LEN: usize = 64;

/// Context string for deriving the envelope key from the shared secret.
const ENVELOPE_KEY_CONTEXT: &str = "neuron session v1 envelope key";

/// An X25519 public key (32 bytes), as sent in the first frame of a session.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse peer key material received off the wire.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Short fingerprint for logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(&blake3::hash(&self.0).as_bytes()[..8])
    }

    fn to_dalek(self) -> DalekPublicKey {
        DalekPublicKey::from(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

/// An X25519 key pair, generated fresh for each session.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let secret = StaticSecret::from(bytes);
        bytes.zeroize();
        let public = PublicKey(*DalekPublicKey::from(&secret).as_bytes());
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Serialize into a secret blob (private scalar, then public key).
    pub fn to_secret_blob(&self) -> SecretBlob {
        let mut blob = [0u8; SECRET_BLOB_LEN];
        let mut scalar = self.secret.to_bytes();
        blob[..32].copy_from_slice(&scalar);
        blob[32..].copy_from_slice(self.public.as_bytes());
        scalar.zeroize();
        SecretBlob(blob)
    }

    /// Restore from a secret blob.
    ///
    /// Rejects blobs whose public half does not belong to the private half.
    pub fn from_secret_blob(blob: &SecretBlob) -> Result<Self> {
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&blob.0[..32]);
        let secret = StaticSecret::from(scalar);
        scalar.zeroize();

        let public = PublicKey(*DalekPublicKey::from(&secret).as_bytes());
        if public.as_bytes()[..] != blob.0[32..] {
            return Err(CryptoError::InvalidSecret(
                "public key does not match private key".into(),
            ));
        }
        Ok(Self { secret, public })
    }

    /// Perform key agreement with a peer's public key.
    pub fn diffie_hellman(&self, peer: &PublicKey) -> Result<SharedSecret> {
        let shared = self.secret.diffie_hellman(&peer.to_dalek());
        if !shared.was_contributory() {
            return Err(CryptoError::NonContributory);
        }
        Ok(SharedSecret(*shared.as_bytes()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Opaque serialized key pair: both the private material and its public key.
pub struct SecretBlob([u8; SECRET_BLOB_LEN]);

impl SecretBlob {
    /// Parse from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SECRET_BLOB_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSecret(format!(
                "expected {} bytes, got {}",
                SECRET_BLOB_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_BLOB_LEN] {
        &self.0
    }
}

impl Drop for SecretBlob {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecretBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBlob(..)")
    }
}

/// A shared secret derived from X25519 key agreement.
///
/// Held only for the lifetime of one session; zeroized on drop.
#[derive(Clone)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive the symmetric envelope key.
    pub(crate) fn envelope_key(&self) -> [u8; 32] {
        blake3::derive_key(ENVELOPE_KEY_CONTEXT, &self.0)
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SharedSecret {}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Generate a fresh key pair, returned as a secret blob.
pub fn generate_key_pair() -> Result<SecretBlob> {
    Ok(KeyPair::generate().to_secret_blob())
}

/// The public half of a secret blob.
pub fn public_key(secret: &SecretBlob) -> Result<PublicKey> {
    Ok(KeyPair::from_secret_blob(secret)?.public_key())
}

/// Derive the shared secret from a local secret blob and raw peer key material.
///
/// Fails on peer keys that are not exactly 32 bytes or that yield a
/// non-contributory result.
pub fn derive_shared(secret: &SecretBlob, peer_public: &[u8]) -> Result<SharedSecret> {
    let peer = PublicKey::from_slice(peer_public)?;
    KeyPair::from_secret_blob(secret)?.diffie_hellman(&peer)
}
