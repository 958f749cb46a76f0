//! Field-level validators shared by builders and decoders.
//!
//! Each check exists exactly once so that a builder can never produce bytes
//! the decoder would reject (and vice versa).

use thiserror::Error;

use crate::config::{ASSET_ID_LEN, MAX_TX_MEMO_LEN};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("memo is {len} bytes, maximum is {max}")]
    MemoTooLong { len: usize, max: usize },

    #[error("memo contains a non-printable byte 0x{byte:02x} at offset {offset}")]
    MemoCharset { byte: u8, offset: usize },

    #[error("asset id must be 1 to {max} characters, got {len}")]
    AssetIdLength { len: usize, max: usize },

    #[error("asset id must be ASCII alphanumeric")]
    AssetIdCharset,

    #[error("timestamp {0} is not a valid epoch")]
    Epoch(u64),

    #[error("invalid flag name {0:?}")]
    FlagName(String),
}

/// Memos are short printable-ASCII strings (0x20..=0x7E). Empty is allowed.
pub fn validate_memo(memo: &[u8]) -> Result<(), ValidationError> {
    if memo.len() > MAX_TX_MEMO_LEN {
        return Err(ValidationError::MemoTooLong {
            len: memo.len(),
            max: MAX_TX_MEMO_LEN,
        });
    }
    if let Some(offset) = memo.iter().position(|b| !(0x20..=0x7e).contains(b)) {
        return Err(ValidationError::MemoCharset {
            byte: memo[offset],
            offset,
        });
    }
    Ok(())
}

/// Asset identifiers are 1 to 8 ASCII letters or digits.
pub fn validate_asset_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > ASSET_ID_LEN {
        return Err(ValidationError::AssetIdLength {
            len: id.len(),
            max: ASSET_ID_LEN,
        });
    }
    if !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ValidationError::AssetIdCharset);
    }
    Ok(())
}

/// `true` for timestamps strictly between 0 and `0xFFFFFFFF`.
pub fn is_valid_epoch(timestamp: u64) -> bool {
    timestamp > 0 && timestamp < u32::MAX as u64
}

pub fn validate_epoch(timestamp: u64) -> Result<u32, ValidationError> {
    if !is_valid_epoch(timestamp) {
        return Err(ValidationError::Epoch(timestamp));
    }
    Ok(timestamp as u32)
}

/// Normalizes a transaction flag name: letters, digits and underscores,
/// upper-cased. `"transfer"` becomes `"TRANSFER"`.
pub fn normalize_flag_name(name: &str) -> Result<String, ValidationError> {
    let valid = !name.is_empty()
        && name.len() <= 32
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if !valid {
        return Err(ValidationError::FlagName(name.to_string()));
    }
    Ok(name.to_ascii_uppercase())
}
