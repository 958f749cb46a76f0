//! # Cryptographic Primitives for KEEL
//!
//! Everything security-related in the protocol flows through here:
//!
//! - **hash**: `hash256` (double SHA-256) and `hash160` (RIPEMD-160 ∘ SHA-256).
//! - **keys**: secp256k1 private keys and compressed public keys.
//! - **signatures**: recoverable `(r, s, v)` signatures with recovery-id
//!   search.
//!
//! We don't do curve arithmetic ourselves. `k256`, `sha2` and `ripemd` do the
//! math; this module pins down encodings and failure semantics.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{hash160, hash256, sha256, Hash160};
pub use keys::{KeyError, PrivateKey, PublicKey};
pub use signatures::{recover_public_key, sign_hash, SignError, Signature};
