//! Value types carried by transactions: asset identifiers and transfers.

use std::fmt;

use thiserror::Error;

use crate::config::{ASSET_ID_LEN, MAX_AMOUNT, MAX_TRANSFERS_PER_TX, SCALE};
use crate::validation::{validate_asset_id, ValidationError};

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// A non-native asset identifier, 1 to 8 ASCII alphanumerics.
///
/// On the wire it always occupies 8 bytes, left-padded with `0x00`. The
/// native asset has no identifier at all; where a fixed-width slot is
/// required (ledger entries) it is written as eight zero bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: &str) -> Result<Self, ValidationError> {
        validate_asset_id(id)?;
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical 8-byte, left-zero-padded encoding.
    pub fn to_wire(&self) -> [u8; ASSET_ID_LEN] {
        let mut out = [0u8; ASSET_ID_LEN];
        let bytes = self.0.as_bytes();
        out[ASSET_ID_LEN - bytes.len()..].copy_from_slice(bytes);
        out
    }

    /// Inverse of [`AssetId::to_wire`]. Leading zero bytes are padding;
    /// anything else must be a valid identifier.
    pub fn from_wire(bytes: &[u8; ASSET_ID_LEN]) -> Result<Self, ValidationError> {
        let start = bytes
            .iter()
            .position(|&b| b != 0)
            .unwrap_or(ASSET_ID_LEN);
        let id = std::str::from_utf8(&bytes[start..]).map_err(|_| ValidationError::AssetIdCharset)?;
        Self::new(id)
    }

    /// Decodes an optional asset slot where all zeros means native.
    pub fn from_wire_optional(bytes: &[u8; ASSET_ID_LEN]) -> Result<Option<Self>, ValidationError> {
        if bytes.iter().all(|&b| b == 0) {
            return Ok(None);
        }
        Self::from_wire(bytes).map(Some)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire encoding of an optional asset: eight zero bytes for native.
pub fn asset_slot(asset: Option<&AssetId>) -> [u8; ASSET_ID_LEN] {
    asset.map(AssetId::to_wire).unwrap_or([0u8; ASSET_ID_LEN])
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("amount {amount} exceeds the protocol maximum {max}")]
    AmountTooLarge { amount: u64, max: u64 },

    #[error("a transaction carries at most {max} transfers")]
    TooMany { max: usize },

    #[error("asset {0} appears more than once")]
    DuplicateAsset(String),
}

/// One (asset, amount) leg of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// `None` for the native asset.
    pub asset: Option<AssetId>,
    pub amount: u64,
}

impl Transfer {
    /// Renders the amount with [`SCALE`] decimal places.
    pub fn display_decimal(&self) -> String {
        let divisor = 10u64.pow(SCALE);
        format!(
            "{}.{:0>width$} {}",
            self.amount / divisor,
            self.amount % divisor,
            self.asset.as_ref().map(AssetId::as_str).unwrap_or("native"),
            width = SCALE as usize
        )
    }
}

/// Ordered set of transfers, at most one per asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transfers(Vec<Transfer>);

impl Transfers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the amount moved for `asset`. Setting an asset that is already
    /// present replaces its amount in place, keeping its position.
    pub fn set(&mut self, asset: Option<AssetId>, amount: u64) -> Result<(), TransferError> {
        check_amount(amount)?;
        if let Some(existing) = self.0.iter_mut().find(|t| t.asset == asset) {
            existing.amount = amount;
            return Ok(());
        }
        if self.0.len() >= MAX_TRANSFERS_PER_TX {
            return Err(TransferError::TooMany {
                max: MAX_TRANSFERS_PER_TX,
            });
        }
        self.0.push(Transfer { asset, amount });
        Ok(())
    }

    /// Appends a transfer, rejecting a repeated asset. Used by decoders,
    /// where a repeat means the bytes are not canonical.
    pub fn push_unique(&mut self, asset: Option<AssetId>, amount: u64) -> Result<(), TransferError> {
        if self.0.iter().any(|t| t.asset == asset) {
            let name = asset.map(|a| a.to_string()).unwrap_or_else(|| "native".into());
            return Err(TransferError::DuplicateAsset(name));
        }
        self.set(asset, amount)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transfer> {
        self.0.iter()
    }

    /// Amount moved for `asset`, if any.
    pub fn amount_of(&self, asset: Option<&AssetId>) -> Option<u64> {
        self.0
            .iter()
            .find(|t| t.asset.as_ref() == asset)
            .map(|t| t.amount)
    }
}

fn check_amount(amount: u64) -> Result<(), TransferError> {
    if amount > MAX_AMOUNT {
        return Err(TransferError::AmountTooLarge {
            amount,
            max: MAX_AMOUNT,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
