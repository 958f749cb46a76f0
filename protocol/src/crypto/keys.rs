//! # Key Management
//!
//! secp256k1 private and public keys. The curve arithmetic comes from the
//! RustCrypto `k256` crate; this module only fixes the protocol's encodings:
//!
//! - private keys are 32-byte big-endian scalars,
//! - public keys always travel in 33-byte SEC1 compressed form,
//! - an account is named by the [`hash160`] of its compressed public key.
//!
//! ## Security considerations
//!
//! - [`PrivateKey`] does not implement `Serialize` and its `Debug` output is
//!   redacted. Exporting a secret has to be an explicit `to_bytes()` call.
//! - Fresh keys come from the thread-local CSPRNG.

use std::fmt;

use k256::ecdsa::{SigningKey, VerifyingKey};
use thiserror::Error;

use super::hash::{hash160, Hash160};

/// Length of a SEC1 compressed public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Length of a raw private scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Errors that can occur during key operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid private key: not a non-zero scalar below the curve order")]
    InvalidPrivateKey,

    #[error("invalid public key: {reason}")]
    InvalidPublicKey { reason: String },

    #[error("invalid hex: {0}")]
    Hex(String),
}

/// A secp256k1 signing key.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generates a fresh key from the thread-local CSPRNG.
    pub fn generate() -> Self {
        Self {
            inner: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Parses a 32-byte scalar. Zero and values at or above the curve order
    /// are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(KeyError::InvalidPrivateKey);
        }
        let inner = SigningKey::from_slice(bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self { inner })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|e| KeyError::Hex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        let mut out = [0u8; PRIVATE_KEY_LEN];
        out.copy_from_slice(&self.inner.to_bytes());
        out
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.inner.verifying_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// A secp256k1 public key in 33-byte compressed SEC1 form.
///
/// Construction always validates that the bytes describe a point on the
/// curve, so holding a `PublicKey` means holding a usable key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    /// Parses a compressed public key. Uncompressed (65-byte) encodings are
    /// rejected: the protocol only ever hashes the compressed form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(KeyError::InvalidPublicKey {
                reason: format!("expected {PUBLIC_KEY_LEN} bytes, got {}", bytes.len()),
            });
        }
        let key = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| KeyError::InvalidPublicKey {
            reason: "not a point on secp256k1".to_string(),
        })?;
        Ok(Self::from_verifying_key(&key))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|e| KeyError::Hex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(true);
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(point.as_bytes());
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// The account identifier for this key.
    pub fn hash160(&self) -> Hash160 {
        hash160(&self.bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_compressed_key() {
        let key = PrivateKey::generate();
        let public = key.public_key();
        assert_eq!(public.as_bytes().len(), PUBLIC_KEY_LEN);
        assert!(matches!(public.as_bytes()[0], 0x02 | 0x03));
    }

    #[test]
    fn test_roundtrip_bytes() {
        let key = PrivateKey::generate();
        let restored = PrivateKey::from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(key.public_key(), restored.public_key());
    }

    #[test]
    fn private_key_one_maps_to_generator() {
        let mut scalar = [0u8; 32];
        scalar[31] = 1;
        let key = PrivateKey::from_bytes(&scalar).unwrap();
        assert_eq!(
            key.public_key().to_hex(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(
            key.public_key().hash160().to_hex(),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn zero_scalar_is_rejected() {
        assert_eq!(
            PrivateKey::from_bytes(&[0u8; 32]).unwrap_err(),
            KeyError::InvalidPrivateKey
        );
        assert!(PrivateKey::from_bytes(&[1u8; 31]).is_err());
    }

    #[test]
    fn public_key_rejects_garbage() {
        assert!(PublicKey::from_bytes(&[0x02; 32]).is_err());
        // Valid prefix, but x = 0xff.. is above the field prime.
        let mut bad = [0xffu8; PUBLIC_KEY_LEN];
        bad[0] = 0x02;
        assert!(PublicKey::from_bytes(&bad).is_err());
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let public = PrivateKey::generate().public_key();
        assert_eq!(PublicKey::from_hex(&public.to_hex()).unwrap(), public);
    }

    #[test]
    fn debug_output_redacts_secret() {
        let key = PrivateKey::generate();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&hex::encode(key.to_bytes())));
    }
}
