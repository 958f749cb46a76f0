//! # Hashing Utilities
//!
//! The protocol uses exactly two digests:
//!
//! - **hash256**: SHA-256 applied twice. This is the "protocol hash": it
//!   names transactions and blocks, builds pre-images, and drives the merkle
//!   accumulator.
//! - **hash160**: RIPEMD-160 of SHA-256. Turns a 33-byte compressed public
//!   key into the 20-byte account identifier that appears on the wire.
//!
//! Both come straight from the RustCrypto `sha2` and `ripemd` crates.

use std::fmt;

use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Single-round SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Sha256::digest(data));
    output
}

/// The protocol hash: `SHA-256(SHA-256(data))`.
///
/// # Example
///
/// ```
/// use keel_protocol::crypto::hash256;
///
/// let id = hash256(b"raw transaction bytes");
/// assert_eq!(id.len(), 32);
/// ```
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// `RIPEMD-160(SHA-256(data))`.
pub fn hash160(data: &[u8]) -> Hash160 {
    let mut output = [0u8; 20];
    output.copy_from_slice(&Ripemd160::digest(sha256(data)));
    Hash160(output)
}

/// A 20-byte account identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Hash160(#[serde(with = "hex::serde")] pub [u8; 20]);

impl Hash160 {
    pub const LEN: usize = 20;

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; 20]> for Hash160 {
    fn from(bytes: [u8; 20]) -> Self {
        Hash160(bytes)
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash160({})", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string, straight from FIPS 180-2.
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash256_is_double_sha256() {
        let data = b"keel";
        assert_eq!(hash256(data), sha256(&sha256(data)));
        assert_ne!(hash256(data), sha256(data));
    }

    #[test]
    fn test_hash256_known_vector() {
        // Double SHA-256 of "hello", a well-known Bitcoin test vector.
        assert_eq!(
            hex::encode(hash256(b"hello")),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn test_hash160_known_vector() {
        // hash160 of the compressed secp256k1 generator point.
        let g = hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
            .unwrap();
        assert_eq!(
            hash160(&g).to_hex(),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn hash160_display_is_hex() {
        let h = Hash160([0xab; 20]);
        assert_eq!(h.to_string(), "ab".repeat(20));
        assert_eq!(format!("{h:?}"), format!("Hash160({})", "ab".repeat(20)));
    }
}
