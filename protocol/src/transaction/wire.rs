//! The transaction wire format (version 1).
//!
//! ```text
//!  1  version          u8
//!  2  flag             u16
//!  3  sender           u8 presence (0/1) [+ 20 bytes hash160]
//!  4  nonce            u32  (0 without sender, > 0 with one)
//!  5  recipient        u8 presence (0/1) [+ 20 bytes hash160]
//!  6  memo             u8 length + printable ASCII (≤ 16)
//!  7  transfers        u8 count (≤ 10), each:
//!                        amount u64, u8 asset presence [+ 8 bytes asset id]
//!  8  data             u16 length (≤ 60,000) + bytes
//!  9  signatures       u8 count (≤ 5), each: r(32) s(32) v(u8)
//! 10  fee              u64
//! 11  timestamp        u32  (0 < t < 0xFFFFFFFF)
//! ```
//!
//! All integers are little-endian. [`TxFields`] is the one encoder both the
//! builder and decoded transactions go through, and [`TxFields::decode`] is
//! its strict inverse: it fails on the first violated rule and hands back
//! every field read so far.

use thiserror::Error;

use super::types::{AssetId, TransferError, Transfers};
use crate::codec::{CodecError, Reader, UIntWidth, Writer};
use crate::config::{
    MAX_ARBITRARY_DATA, MAX_SIGNATURES, MAX_TRANSACTION_SIZE, MAX_TRANSFERS_PER_TX, TX_VERSION,
};
use crate::crypto::{Hash160, Signature};
use crate::validation::{validate_epoch, validate_memo, ValidationError};

/// Why a transaction field was rejected, on either the encode or decode path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxFieldError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("unsupported transaction version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid presence byte 0x{value:02x} for {field}")]
    PresenceByte { field: &'static str, value: u8 },

    #[error("nonce {nonce} given without a sender")]
    NonceWithoutSender { nonce: u32 },

    #[error("a transaction with a sender requires a nonce greater than zero")]
    MissingNonce,

    #[error("invalid {field}: {source}")]
    Invalid {
        field: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("transfer count {count} exceeds maximum of {}", MAX_TRANSFERS_PER_TX)]
    TooManyTransfers { count: usize },

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("transfers require a recipient")]
    TransferWithoutRecipient,

    #[error("data of {len} bytes exceeds maximum of {}", MAX_ARBITRARY_DATA)]
    DataTooLarge { len: usize },

    #[error("signature count {count} exceeds maximum of {}", MAX_SIGNATURES)]
    TooManySignatures { count: usize },

    #[error("encoded transaction is {size} bytes, maximum is {}", MAX_TRANSACTION_SIZE)]
    TooLarge { size: usize },

    #[error("expected flag 0x{expected:04x}, found 0x{found:04x}")]
    UnexpectedFlag { expected: u16, found: u16 },
}

/// Errors from decoding transaction bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxDecodeError {
    #[error("transaction of {size} bytes exceeds maximum of {}", MAX_TRANSACTION_SIZE)]
    TooLarge { size: usize },

    /// Decoding stopped at the first violation. `partial` holds every field
    /// decoded before it; the rest are defaults.
    #[error("incomplete transaction: {reason}")]
    Incomplete {
        reason: TxFieldError,
        partial: Box<TxFields>,
    },
}

impl TxDecodeError {
    /// The underlying field error, if any.
    pub fn reason(&self) -> Option<&TxFieldError> {
        match self {
            TxDecodeError::Incomplete { reason, .. } => Some(reason),
            TxDecodeError::TooLarge { .. } => None,
        }
    }
}

/// Every field of a transaction, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxFields {
    pub version: u8,
    pub flag: u16,
    pub sender: Option<Hash160>,
    pub nonce: u32,
    pub recipient: Option<Hash160>,
    pub memo: Option<String>,
    pub transfers: Transfers,
    pub data: Option<Vec<u8>>,
    pub signatures: Vec<Signature>,
    pub fee: u64,
    pub timestamp: u32,
}

impl Default for TxFields {
    fn default() -> Self {
        Self {
            version: TX_VERSION,
            flag: 0,
            sender: None,
            nonce: 0,
            recipient: None,
            memo: None,
            transfers: Transfers::new(),
            data: None,
            signatures: Vec::new(),
            fee: 0,
            timestamp: 0,
        }
    }
}

impl TxFields {
    /// Checks the cross-field rules that setters cannot see in isolation.
    pub fn check(&self) -> Result<(), TxFieldError> {
        if self.version != TX_VERSION {
            return Err(TxFieldError::UnsupportedVersion(self.version));
        }
        match (self.sender.is_some(), self.nonce) {
            (false, nonce) if nonce != 0 => return Err(TxFieldError::NonceWithoutSender { nonce }),
            (true, 0) => return Err(TxFieldError::MissingNonce),
            _ => {}
        }
        if let Some(memo) = &self.memo {
            validate_memo(memo.as_bytes()).map_err(|source| TxFieldError::Invalid {
                field: "memo",
                source,
            })?;
        }
        if self.transfers.len() > MAX_TRANSFERS_PER_TX {
            return Err(TxFieldError::TooManyTransfers {
                count: self.transfers.len(),
            });
        }
        if !self.transfers.is_empty() && self.recipient.is_none() {
            return Err(TxFieldError::TransferWithoutRecipient);
        }
        if let Some(data) = &self.data {
            if data.len() > MAX_ARBITRARY_DATA {
                return Err(TxFieldError::DataTooLarge { len: data.len() });
            }
        }
        if self.signatures.len() > MAX_SIGNATURES {
            return Err(TxFieldError::TooManySignatures {
                count: self.signatures.len(),
            });
        }
        validate_epoch(self.timestamp as u64).map_err(|source| TxFieldError::Invalid {
            field: "timestamp",
            source,
        })?;
        Ok(())
    }

    /// Validates and encodes. With `include_signatures == false` the
    /// signature count is written as zero; that form is what gets signed.
    pub fn encode(&self, include_signatures: bool) -> Result<Vec<u8>, TxFieldError> {
        self.check()?;
        let mut w = Writer::with_capacity(256);
        self.write(&mut w, include_signatures)?;
        let bytes = w.finish();
        if bytes.len() > MAX_TRANSACTION_SIZE {
            return Err(TxFieldError::TooLarge { size: bytes.len() });
        }
        Ok(bytes)
    }

    fn write(&self, w: &mut Writer, include_signatures: bool) -> Result<(), TxFieldError> {
        w.put_u8(self.version);
        w.put_u16(self.flag);

        write_optional_hash(w, self.sender.as_ref());
        w.put_u32(self.nonce);
        write_optional_hash(w, self.recipient.as_ref());

        let memo = self.memo.as_deref().unwrap_or("");
        w.put_prefixed(memo.as_bytes(), UIntWidth::U8)?;

        w.put_uint(self.transfers.len() as u64, UIntWidth::U8)?;
        for transfer in self.transfers.iter() {
            w.put_u64(transfer.amount);
            match &transfer.asset {
                Some(asset) => {
                    w.put_u8(1);
                    w.put_bytes(&asset.to_wire());
                }
                None => w.put_u8(0),
            }
        }

        w.put_prefixed(self.data.as_deref().unwrap_or(&[]), UIntWidth::U16)?;

        if include_signatures {
            w.put_uint(self.signatures.len() as u64, UIntWidth::U8)?;
            for signature in &self.signatures {
                signature.write(w);
            }
        } else {
            w.put_u8(0);
        }

        w.put_u64(self.fee);
        w.put_u32(self.timestamp);
        Ok(())
    }

    /// Decodes a complete transaction. Trailing bytes are an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, TxDecodeError> {
        if bytes.len() > MAX_TRANSACTION_SIZE {
            return Err(TxDecodeError::TooLarge { size: bytes.len() });
        }
        let mut fields = TxFields::default();
        match decode_into(&mut fields, bytes) {
            Ok(()) => Ok(fields),
            Err(reason) => Err(TxDecodeError::Incomplete {
                reason,
                partial: Box::new(fields),
            }),
        }
    }
}

fn write_optional_hash(w: &mut Writer, hash: Option<&Hash160>) {
    match hash {
        Some(hash) => {
            w.put_u8(1);
            w.put_bytes(hash.as_bytes());
        }
        None => w.put_u8(0),
    }
}

fn read_presence(r: &mut Reader<'_>, field: &'static str) -> Result<bool, TxFieldError> {
    match r.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(TxFieldError::PresenceByte { field, value }),
    }
}

fn read_optional_hash(r: &mut Reader<'_>, field: &'static str) -> Result<Option<Hash160>, TxFieldError> {
    if read_presence(r, field)? {
        Ok(Some(Hash160(r.read_array()?)))
    } else {
        Ok(None)
    }
}

fn decode_into(f: &mut TxFields, bytes: &[u8]) -> Result<(), TxFieldError> {
    let mut r = Reader::new(bytes);

    // Step 1-2
    f.version = r.read_u8()?;
    if f.version != TX_VERSION {
        return Err(TxFieldError::UnsupportedVersion(f.version));
    }
    f.flag = r.read_u16()?;

    // Step 3-4
    f.sender = read_optional_hash(&mut r, "sender")?;
    f.nonce = r.read_u32()?;
    match (f.sender.is_some(), f.nonce) {
        (false, nonce) if nonce != 0 => return Err(TxFieldError::NonceWithoutSender { nonce }),
        (true, 0) => return Err(TxFieldError::MissingNonce),
        _ => {}
    }

    // Step 5
    f.recipient = read_optional_hash(&mut r, "recipient")?;

    // Step 6
    let memo_len = r.read_u8()? as usize;
    if memo_len > 0 {
        let memo = r.read_bytes(memo_len)?;
        validate_memo(memo).map_err(|source| TxFieldError::Invalid {
            field: "memo",
            source,
        })?;
        f.memo = Some(String::from_utf8_lossy(memo).into_owned());
    }

    // Step 7
    let transfer_count = r.read_u8()? as usize;
    if transfer_count > MAX_TRANSFERS_PER_TX {
        return Err(TxFieldError::TooManyTransfers {
            count: transfer_count,
        });
    }
    if transfer_count > 0 && f.recipient.is_none() {
        return Err(TxFieldError::TransferWithoutRecipient);
    }
    for _ in 0..transfer_count {
        let amount = r.read_u64()?;
        let asset = if read_presence(&mut r, "transfer asset")? {
            let wire = r.read_array()?;
            Some(AssetId::from_wire(&wire).map_err(|source| TxFieldError::Invalid {
                field: "transfer asset",
                source,
            })?)
        } else {
            None
        };
        f.transfers.push_unique(asset, amount)?;
    }

    // Step 8
    let data_len = r.read_u16()? as usize;
    if data_len > MAX_ARBITRARY_DATA {
        return Err(TxFieldError::DataTooLarge { len: data_len });
    }
    if data_len > 0 {
        f.data = Some(r.read_bytes(data_len)?.to_vec());
    }

    // Step 9
    let signature_count = r.read_u8()? as usize;
    if signature_count > MAX_SIGNATURES {
        return Err(TxFieldError::TooManySignatures {
            count: signature_count,
        });
    }
    for _ in 0..signature_count {
        f.signatures.push(Signature::read(&mut r)?);
    }

    // Step 10-11
    f.fee = r.read_u64()?;
    let timestamp = r.read_u32()?;
    f.timestamp = validate_epoch(timestamp as u64).map_err(|source| TxFieldError::Invalid {
        field: "timestamp",
        source,
    })?;

    r.ensure_exhausted()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TxFields {
        let mut transfers = Transfers::new();
        transfers.set(None, 500).unwrap();
        transfers
            .set(Some(AssetId::new("GOLD").unwrap()), 7)
            .unwrap();
        TxFields {
            flag: 0xc8,
            sender: Some(Hash160([1u8; 20])),
            nonce: 3,
            recipient: Some(Hash160([2u8; 20])),
            memo: Some("rent".into()),
            transfers,
            data: Some(vec![9, 9, 9]),
            signatures: vec![Signature::new([4u8; 32], [5u8; 32], 1)],
            fee: 12,
            timestamp: 1_700_000_000,
            ..TxFields::default()
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let fields = sample();
        let bytes = fields.encode(true).unwrap();
        assert_eq!(TxFields::decode(&bytes).unwrap(), fields);
    }

    #[test]
    fn test_minimal_layout() {
        let fields = TxFields {
            flag: 0x0102,
            timestamp: 0x0a0b0c0d,
            ..TxFields::default()
        };
        let bytes = fields.encode(true).unwrap();
        let expected: Vec<u8> = [
            vec![1],              // version
            vec![0x02, 0x01],     // flag
            vec![0],              // no sender
            vec![0, 0, 0, 0],     // nonce
            vec![0],              // no recipient
            vec![0],              // empty memo
            vec![0],              // no transfers
            vec![0, 0],           // no data
            vec![0],              // no signatures
            vec![0; 8],           // fee
            vec![0x0d, 0x0c, 0x0b, 0x0a],
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn unsigned_encoding_zeroes_signature_count() {
        let fields = sample();
        let signed = fields.encode(true).unwrap();
        let unsigned = fields.encode(false).unwrap();
        assert_eq!(signed.len(), unsigned.len() + 65);
        let decoded = TxFields::decode(&unsigned).unwrap();
        assert!(decoded.signatures.is_empty());
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = sample().encode(true).unwrap();
        bytes.push(0);
        let err = TxFields::decode(&bytes).unwrap_err();
        assert_eq!(
            err.reason(),
            Some(&TxFieldError::Codec(CodecError::ExcessBytes { remaining: 1 }))
        );
    }

    #[test]
    fn decode_attaches_partial_fields() {
        let bytes = sample().encode(true).unwrap();
        // Cut inside the transfers section.
        let err = TxFields::decode(&bytes[..60]).unwrap_err();
        match err {
            TxDecodeError::Incomplete { partial, .. } => {
                assert_eq!(partial.flag, 0xc8);
                assert_eq!(partial.sender, Some(Hash160([1u8; 20])));
                assert_eq!(partial.memo.as_deref(), Some("rent"));
                assert_eq!(partial.fee, 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_wrong_version() {
        let mut bytes = sample().encode(true).unwrap();
        bytes[0] = 2;
        assert_eq!(
            TxFields::decode(&bytes).unwrap_err().reason(),
            Some(&TxFieldError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn decode_rejects_nonce_without_sender() {
        let fields = TxFields {
            timestamp: 1,
            ..TxFields::default()
        };
        let mut bytes = fields.encode(true).unwrap();
        // Nonce lives right after version(1) flag(2) presence(1).
        bytes[4] = 1;
        assert_eq!(
            TxFields::decode(&bytes).unwrap_err().reason(),
            Some(&TxFieldError::NonceWithoutSender { nonce: 1 })
        );
    }

    #[test]
    fn decode_rejects_bad_presence_byte() {
        let mut bytes = sample().encode(true).unwrap();
        bytes[3] = 2;
        assert_eq!(
            TxFields::decode(&bytes).unwrap_err().reason(),
            Some(&TxFieldError::PresenceByte {
                field: "sender",
                value: 2
            })
        );
    }

    #[test]
    fn decode_rejects_invalid_timestamp() {
        let mut bytes = sample().encode(true).unwrap();
        let len = bytes.len();
        bytes[len - 4..].copy_from_slice(&[0xff; 4]);
        assert!(matches!(
            TxFields::decode(&bytes).unwrap_err().reason(),
            Some(TxFieldError::Invalid {
                field: "timestamp",
                ..
            })
        ));
    }

    #[test]
    fn decode_rejects_oversized_input() {
        let bytes = vec![0u8; MAX_TRANSACTION_SIZE + 1];
        assert_eq!(
            TxFields::decode(&bytes).unwrap_err(),
            TxDecodeError::TooLarge {
                size: MAX_TRANSACTION_SIZE + 1
            }
        );
    }

    #[test]
    fn encode_requires_recipient_for_transfers() {
        let mut fields = sample();
        fields.recipient = None;
        assert_eq!(fields.encode(true), Err(TxFieldError::TransferWithoutRecipient));
    }

    #[test]
    fn decode_rejects_duplicate_asset() {
        let fields = TxFields {
            recipient: Some(Hash160([2u8; 20])),
            transfers: {
                let mut t = Transfers::new();
                t.set(None, 1).unwrap();
                t.set(Some(AssetId::new("X").unwrap()), 2).unwrap();
                t
            },
            timestamp: 1,
            ..TxFields::default()
        };
        let mut bytes = fields.encode(true).unwrap();
        // Second transfer: make it native as well (presence byte 0 and drop
        // the 8-byte id).
        let second_presence = 1 + 2 + 1 + 4 + 1 + 20 + 1 + 1 + 9 + 8;
        bytes[second_presence] = 0;
        bytes.drain(second_presence + 1..second_presence + 9);
        assert!(matches!(
            TxFields::decode(&bytes).unwrap_err().reason(),
            Some(TxFieldError::Transfer(TransferError::DuplicateAsset(_)))
        ));
    }
}
