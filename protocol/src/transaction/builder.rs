//! Transaction construction via the builder pattern.
//!
//! Construction is two-phase. [`TransactionBuilder`] accumulates fields
//! through setters that each validate their own input and leave the builder
//! untouched on error. [`TransactionBuilder::seal`] then derives the sender
//! and recipient hash160s from the attached keys, encodes, and runs the
//! result back through the decoder to produce an immutable [`Transaction`].
//!
//! ```rust,no_run
//! use keel_protocol::config::TX_FLAG_TRANSFER;
//! use keel_protocol::crypto::PrivateKey;
//! use keel_protocol::transaction::TransactionBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let alice = PrivateKey::generate();
//! let bob = PrivateKey::generate().public_key();
//! let chain_id = [7u8; 32];
//!
//! let tx = TransactionBuilder::new(TX_FLAG_TRANSFER)
//!     .sender(alice.public_key(), 1)?
//!     .recipient(bob)?
//!     .add_transfer(500, None)?
//!     .sign(&alice, &chain_id)?
//!     .seal()?;
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use thiserror::Error;

use super::prepared::{pre_image, Transaction};
use super::types::{AssetId, Transfers};
use super::wire::{TxDecodeError, TxFieldError, TxFields};
use crate::config::{MAX_ARBITRARY_DATA, MAX_SIGNATURES, TX_VERSION};
use crate::crypto::{sign_hash, Hash160, PrivateKey, PublicKey, SignError, Signature};
use crate::validation::{validate_epoch, validate_memo};

/// Errors raised while building a transaction. A failed setter leaves the
/// builder exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxConstructError {
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error(transparent)]
    Encode(#[from] TxFieldError),

    #[error("signing failed: {0}")]
    Sign(#[from] SignError),

    #[error("sealed bytes failed to decode: {0}")]
    Seal(#[from] TxDecodeError),
}

impl TxConstructError {
    fn field(field: &'static str, reason: impl ToString) -> Self {
        TxConstructError::InvalidField {
            field,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
enum Recipient {
    Key(PublicKey),
    Hash(Hash160),
}

/// Mutable accumulator for transaction fields.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    flag: u16,
    sender: Option<PublicKey>,
    nonce: u32,
    recipient: Option<Recipient>,
    memo: Option<String>,
    transfers: Transfers,
    data: Option<Vec<u8>>,
    signatures: Vec<Signature>,
    fee: u64,
    timestamp: u32,
}

impl TransactionBuilder {
    /// Starts a transaction of the given flag, timestamped now.
    pub fn new(flag: u16) -> Self {
        let now = Utc::now().timestamp().clamp(1, u32::MAX as i64 - 1) as u32;
        Self {
            flag,
            sender: None,
            nonce: 0,
            recipient: None,
            memo: None,
            transfers: Transfers::new(),
            data: None,
            signatures: Vec::new(),
            fee: 0,
            timestamp: now,
        }
    }

    /// Sets the sender key and its nonce. Nonces start at 1.
    pub fn sender(&mut self, key: PublicKey, nonce: u32) -> Result<&mut Self, TxConstructError> {
        if nonce == 0 {
            return Err(TxConstructError::field("nonce", "must be greater than zero"));
        }
        self.sender = Some(key);
        self.nonce = nonce;
        Ok(self)
    }

    pub fn recipient(&mut self, key: PublicKey) -> Result<&mut Self, TxConstructError> {
        self.recipient = Some(Recipient::Key(key));
        Ok(self)
    }

    /// Sets the recipient by account id, for accounts whose key is unknown.
    pub fn recipient_hash160(&mut self, hash: Hash160) -> Result<&mut Self, TxConstructError> {
        self.recipient = Some(Recipient::Hash(hash));
        Ok(self)
    }

    /// Sets the memo. An empty string clears it.
    pub fn memo(&mut self, memo: &str) -> Result<&mut Self, TxConstructError> {
        validate_memo(memo.as_bytes()).map_err(|e| TxConstructError::field("memo", e))?;
        self.memo = (!memo.is_empty()).then(|| memo.to_string());
        Ok(self)
    }

    /// Adds a transfer. `asset == None` moves the native asset. Adding the
    /// same asset twice replaces the earlier amount.
    pub fn add_transfer(
        &mut self,
        amount: u64,
        asset: Option<&str>,
    ) -> Result<&mut Self, TxConstructError> {
        let asset = asset
            .map(AssetId::new)
            .transpose()
            .map_err(|e| TxConstructError::field("transfer asset", e))?;
        self.transfers
            .set(asset, amount)
            .map_err(|e| TxConstructError::field("transfer", e))?;
        Ok(self)
    }

    pub fn data(&mut self, data: Vec<u8>) -> Result<&mut Self, TxConstructError> {
        if data.len() > MAX_ARBITRARY_DATA {
            return Err(TxConstructError::field(
                "data",
                format!("{} bytes exceeds maximum of {MAX_ARBITRARY_DATA}", data.len()),
            ));
        }
        self.data = (!data.is_empty()).then_some(data);
        Ok(self)
    }

    pub fn fee(&mut self, fee: u64) -> Result<&mut Self, TxConstructError> {
        self.fee = fee;
        Ok(self)
    }

    pub fn timestamp(&mut self, timestamp: u64) -> Result<&mut Self, TxConstructError> {
        self.timestamp = validate_epoch(timestamp).map_err(|e| TxConstructError::field("timestamp", e))?;
        Ok(self)
    }

    pub fn add_signature(&mut self, signature: Signature) -> Result<&mut Self, TxConstructError> {
        if self.signatures.len() >= MAX_SIGNATURES {
            return Err(TxConstructError::field(
                "signatures",
                format!("cannot carry more than {MAX_SIGNATURES}"),
            ));
        }
        self.signatures.push(signature);
        Ok(self)
    }

    /// Signs the pre-image for `chain_id` and appends the signature.
    pub fn sign(&mut self, key: &PrivateKey, chain_id: &[u8; 32]) -> Result<&mut Self, TxConstructError> {
        if self.signatures.len() >= MAX_SIGNATURES {
            return Err(TxConstructError::field(
                "signatures",
                format!("cannot carry more than {MAX_SIGNATURES}"),
            ));
        }
        let digest = self.hash_pre_image(chain_id)?;
        let signature = sign_hash(key, &digest)?;
        self.signatures.push(signature);
        Ok(self)
    }

    /// The digest signers sign: `hash256(chain_id ‖ serialize(false))`.
    pub fn hash_pre_image(&self, chain_id: &[u8; 32]) -> Result<[u8; 32], TxConstructError> {
        Ok(pre_image(chain_id, &self.serialize(false)?))
    }

    /// Derives account ids from the attached keys and encodes.
    pub fn serialize(&self, include_signatures: bool) -> Result<Vec<u8>, TxConstructError> {
        Ok(self.fields().encode(include_signatures)?)
    }

    /// Encodes with signatures and decodes the result into an immutable
    /// transaction.
    pub fn seal(&self) -> Result<Transaction, TxConstructError> {
        let bytes = self.serialize(true)?;
        Ok(Transaction::decode(&bytes)?)
    }

    fn fields(&self) -> TxFields {
        TxFields {
            version: TX_VERSION,
            flag: self.flag,
            sender: self.sender.as_ref().map(PublicKey::hash160),
            nonce: self.nonce,
            recipient: self.recipient.as_ref().map(|r| match r {
                Recipient::Key(key) => key.hash160(),
                Recipient::Hash(hash) => *hash,
            }),
            memo: self.memo.clone(),
            transfers: self.transfers.clone(),
            data: self.data.clone(),
            signatures: self.signatures.clone(),
            fee: self.fee,
            timestamp: self.timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
