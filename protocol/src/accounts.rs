//! Accounts and multi-signature thresholds.
//!
//! An account is a hash160 plus one to five public keys. How many of those
//! keys must sign is fixed by protocol, not by the account:
//!
//! | keys | required |
//! |------|----------|
//! | 1    | 1        |
//! | 2–3  | 2        |
//! | 4–5  | 3        |
//!
//! Verification recovers the signer of each submitted signature and credits
//! the matching account key. A key may be credited only once; a second
//! signature recovering to an already-credited key fails the whole check
//! rather than being ignored. Recovery failures are just misses.

use thiserror::Error;
use tracing::debug;

use crate::crypto::{recover_public_key, Hash160, PublicKey, Signature};

/// What the protocol needs to know about a sender account. Storage and
/// balances live with the embedding chain.
pub trait ChainAccount {
    /// The account identifier that appears as a transaction's sender.
    fn hash160(&self) -> Hash160;

    /// The account's signing keys, in registration order.
    fn public_keys(&self) -> &[PublicKey];
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Two submitted signatures recovered to the same account key.
    #[error("signature {signature_index} credits public key #{key_index} a second time")]
    DuplicateCredit {
        signature_index: usize,
        key_index: usize,
    },
}

/// A plain in-memory account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    hash160: Hash160,
    public_keys: Vec<PublicKey>,
}

impl Account {
    pub fn new(hash160: Hash160, public_keys: Vec<PublicKey>) -> Self {
        Self {
            hash160,
            public_keys,
        }
    }

    /// A single-key account named after its key.
    pub fn single(public_key: PublicKey) -> Self {
        Self::new(public_key.hash160(), vec![public_key])
    }

    /// A multi-key account named after its first key.
    pub fn multi(public_keys: Vec<PublicKey>) -> Option<Self> {
        let first = public_keys.first()?;
        Some(Self::new(first.hash160(), public_keys))
    }
}

impl ChainAccount for Account {
    fn hash160(&self) -> Hash160 {
        self.hash160
    }

    fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }
}

/// Number of signatures required for an account with `key_count` keys.
pub fn required_signatures(key_count: usize) -> usize {
    match key_count {
        4 | 5 => 3,
        2 | 3 => 2,
        _ => 1,
    }
}

/// Counts the distinct account keys that signed `msg_hash`.
///
/// Callers compare the result against [`required_signatures`].
pub fn verify_signatures(
    account: &dyn ChainAccount,
    msg_hash: &[u8; 32],
    signatures: &[Signature],
) -> Result<usize, SignatureError> {
    let keys = account.public_keys();
    let mut credited = vec![false; keys.len()];
    let mut verified = 0;

    for (signature_index, signature) in signatures.iter().enumerate() {
        let recovered = match recover_public_key(signature, msg_hash, signature.v()) {
            Ok(key) => key,
            Err(error) => {
                debug!(signature_index, %error, "signature recovery failed, treating as no match");
                continue;
            }
        };

        if let Some(key_index) = keys.iter().position(|k| *k == recovered) {
            if credited[key_index] {
                return Err(SignatureError::DuplicateCredit {
                    signature_index,
                    key_index,
                });
            }
            credited[key_index] = true;
            verified += 1;
        } else {
            debug!(signature_index, "recovered key is not an account key");
        }
    }

    Ok(verified)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
