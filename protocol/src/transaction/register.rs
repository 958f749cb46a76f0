//! Payload of `REGISTER` transactions.
//!
//! A registration carries the new account's keys in the transaction's data
//! field:
//!
//! ```text
//! public key        33 bytes, compressed
//! referrer key      33 bytes; defaults to the sender, zeros without one
//! multisig count    u8 (≤ 5)
//! multisig keys     33 bytes each
//! ```

use thiserror::Error;

use super::builder::{TransactionBuilder, TxConstructError};
use crate::codec::{CodecError, Reader, Writer};
use crate::config::{MAX_ACCOUNT_KEYS, TX_FLAG_REGISTER};
use crate::crypto::keys::PUBLIC_KEY_LEN;
use crate::crypto::{Hash160, KeyError, PublicKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterPayloadError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("registration lists {0} multisig keys, maximum is {}", MAX_ACCOUNT_KEYS)]
    TooManyKeys(usize),
}

/// Keys of an account being registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPayload {
    pub public_key: PublicKey,
    pub referrer: Option<PublicKey>,
    pub multi_sig: Vec<PublicKey>,
}

impl RegisterPayload {
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            referrer: None,
            multi_sig: Vec::new(),
        }
    }

    /// The id of the account being created.
    pub fn account(&self) -> Hash160 {
        self.public_key.hash160()
    }

    /// Every key the new account will sign with: the primary key followed by
    /// any additional multisig keys.
    pub fn account_keys(&self) -> Vec<PublicKey> {
        let mut keys = vec![self.public_key];
        keys.extend(self.multi_sig.iter().filter(|k| **k != self.public_key));
        keys
    }

    pub fn encode(&self) -> Result<Vec<u8>, RegisterPayloadError> {
        if self.multi_sig.len() > MAX_ACCOUNT_KEYS {
            return Err(RegisterPayloadError::TooManyKeys(self.multi_sig.len()));
        }
        let mut w = Writer::with_capacity(PUBLIC_KEY_LEN * (2 + self.multi_sig.len()) + 1);
        w.put_bytes(self.public_key.as_bytes());
        match &self.referrer {
            Some(referrer) => w.put_bytes(referrer.as_bytes()),
            None => w.put_bytes(&[0u8; PUBLIC_KEY_LEN]),
        }
        w.put_u8(self.multi_sig.len() as u8);
        for key in &self.multi_sig {
            w.put_bytes(key.as_bytes());
        }
        Ok(w.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RegisterPayloadError> {
        let mut r = Reader::new(bytes);
        let public_key = PublicKey::from_bytes(r.read_bytes(PUBLIC_KEY_LEN)?)?;
        let referrer_bytes = r.read_bytes(PUBLIC_KEY_LEN)?;
        let referrer = if referrer_bytes.iter().all(|&b| b == 0) {
            None
        } else {
            Some(PublicKey::from_bytes(referrer_bytes)?)
        };
        let count = r.read_u8()? as usize;
        if count > MAX_ACCOUNT_KEYS {
            return Err(RegisterPayloadError::TooManyKeys(count));
        }
        let multi_sig = (0..count)
            .map(|_| Ok(PublicKey::from_bytes(r.read_bytes(PUBLIC_KEY_LEN)?)?))
            .collect::<Result<Vec<_>, RegisterPayloadError>>()?;
        r.ensure_exhausted()?;
        Ok(Self {
            public_key,
            referrer,
            multi_sig,
        })
    }
}

impl TransactionBuilder {
    /// Starts a senderless `REGISTER` transaction carrying `payload`, as used
    /// at genesis. A missing referrer is zero-filled.
    pub fn register(payload: &RegisterPayload) -> Result<Self, TxConstructError> {
        let mut builder = TransactionBuilder::new(TX_FLAG_REGISTER);
        builder.data(encode_payload(payload)?)?;
        Ok(builder)
    }

    /// Starts a `REGISTER` transaction paid for by `sender`. The sender
    /// becomes the referrer unless `payload` names one.
    pub fn register_by(
        payload: &RegisterPayload,
        sender: PublicKey,
        nonce: u32,
    ) -> Result<Self, TxConstructError> {
        let payload = RegisterPayload {
            referrer: payload.referrer.or(Some(sender)),
            ..payload.clone()
        };
        let mut builder = TransactionBuilder::new(TX_FLAG_REGISTER);
        builder.sender(sender, nonce)?.data(encode_payload(&payload)?)?;
        Ok(builder)
    }
}

fn encode_payload(payload: &RegisterPayload) -> Result<Vec<u8>, TxConstructError> {
    payload.encode().map_err(|e| TxConstructError::InvalidField {
        field: "register payload",
        reason: e.to_string(),
    })
}
