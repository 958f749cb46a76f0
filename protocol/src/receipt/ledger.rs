//! Ledger flags, entries and batches.
//!
//! A ledger entry is one credit or debit against one account in one asset.
//! Entries are grouped into batches: the entries a single logical
//! sub-operation produces together (both legs of a transfer, say). The
//! ledger backend applies them; this module only describes and serializes
//! them.
//!
//! Entry wire layout (39 bytes):
//!
//! ```text
//! account hash160   20
//! flag id           u16
//! amount            u64
//! asset id          8, zero-padded, all zero for native
//! applied           u8, 0 or 1
//! ```
//!
//! Batches: `batch_count u8`, then per batch `entry_count u8` and entries.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::codec::{CodecError, Reader, Writer};
use crate::config::{
    ASSET_ID_LEN, LEDGER_FLAG_FEE_COLLECTED, LEDGER_FLAG_FORGE_REWARD,
    LEDGER_FLAG_REGISTER_CREDIT, LEDGER_FLAG_TRANSFER_CREDIT, LEDGER_FLAG_TRANSFER_DEBIT,
    LEDGER_FLAG_TX_FEE, MAX_AMOUNT, MAX_LEDGER_BATCHES, MAX_LEDGER_ENTRIES_PER_BATCH,
};
use crate::crypto::Hash160;
use crate::transaction::types::{asset_slot, AssetId};
use crate::validation::ValidationError;

/// Encoded size of one [`LedgerEntry`].
pub const LEDGER_ENTRY_WIRE_LEN: usize = Hash160::LEN + 2 + 8 + ASSET_ID_LEN + 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger flag 0x{0:04x} cannot be both a fee and a credit")]
    FeeCredit(u16),

    #[error("ledger flag 0x{0:04x} is already registered")]
    DuplicateFlag(u16),

    #[error("unknown ledger flag 0x{0:04x}")]
    UnknownFlag(u16),

    #[error("ledger amount {0} exceeds the protocol maximum")]
    AmountTooLarge(u64),

    #[error("ledger batches must contain at least one entry")]
    EmptyBatch,

    #[error("batch of {0} entries exceeds maximum of {}", MAX_LEDGER_ENTRIES_PER_BATCH)]
    BatchTooLarge(usize),

    #[error("a receipt holds at most {} ledger batches", MAX_LEDGER_BATCHES)]
    TooManyBatches,

    #[error("invalid applied byte 0x{0:02x}")]
    AppliedByte(u8),

    #[error("invalid ledger asset: {0}")]
    Asset(#[from] ValidationError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// The kind of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct LedgerFlag {
    id: u16,
    is_credit: bool,
    is_fee: bool,
}

impl LedgerFlag {
    /// A fee flag is always a debit.
    pub fn new(id: u16, is_credit: bool, is_fee: bool) -> Result<Self, LedgerError> {
        if is_fee && is_credit {
            return Err(LedgerError::FeeCredit(id));
        }
        Ok(Self {
            id,
            is_credit,
            is_fee,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn is_credit(&self) -> bool {
        self.is_credit
    }

    pub fn is_fee(&self) -> bool {
        self.is_fee
    }
}

/// Registry of ledger flags, populated before use and read-only after.
#[derive(Debug, Clone, Default)]
pub struct LedgerFlags {
    flags: BTreeMap<u16, LedgerFlag>,
}

impl LedgerFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// The flags the built-in transaction kinds emit.
    pub fn standard() -> Self {
        let mut flags = Self::new();
        let defs = [
            (LEDGER_FLAG_TX_FEE, false, true),
            (LEDGER_FLAG_FEE_COLLECTED, true, false),
            (LEDGER_FLAG_FORGE_REWARD, true, false),
            (LEDGER_FLAG_REGISTER_CREDIT, true, false),
            (LEDGER_FLAG_TRANSFER_DEBIT, false, false),
            (LEDGER_FLAG_TRANSFER_CREDIT, true, false),
        ];
        for (id, is_credit, is_fee) in defs {
            // Distinct ids and no fee credits, so registration cannot fail.
            if let Ok(flag) = LedgerFlag::new(id, is_credit, is_fee) {
                flags.flags.insert(id, flag);
            }
        }
        flags
    }

    pub fn register(&mut self, flag: LedgerFlag) -> Result<&mut Self, LedgerError> {
        if self.flags.contains_key(&flag.id) {
            return Err(LedgerError::DuplicateFlag(flag.id));
        }
        self.flags.insert(flag.id, flag);
        Ok(self)
    }

    pub fn get(&self, id: u16) -> Result<&LedgerFlag, LedgerError> {
        self.flags.get(&id).ok_or(LedgerError::UnknownFlag(id))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerFlag> {
        self.flags.values()
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One credit or debit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub account: Hash160,
    pub flag: LedgerFlag,
    pub amount: u64,
    /// `None` for the native asset.
    pub asset: Option<AssetId>,
    /// Set by the ledger backend once the entry hit account state.
    pub applied: bool,
}

impl LedgerEntry {
    pub fn new(
        account: Hash160,
        flag: LedgerFlag,
        amount: u64,
        asset: Option<AssetId>,
    ) -> Result<Self, LedgerError> {
        if amount > MAX_AMOUNT {
            return Err(LedgerError::AmountTooLarge(amount));
        }
        Ok(Self {
            account,
            flag,
            amount,
            asset,
            applied: false,
        })
    }

    /// Signed balance change: positive for credits.
    pub fn delta(&self) -> i128 {
        if self.flag.is_credit {
            self.amount as i128
        } else {
            -(self.amount as i128)
        }
    }

    fn write(&self, w: &mut Writer) {
        w.put_bytes(self.account.as_bytes());
        w.put_u16(self.flag.id);
        w.put_u64(self.amount);
        w.put_bytes(&asset_slot(self.asset.as_ref()));
        w.put_u8(u8::from(self.applied));
    }

    fn read(r: &mut Reader<'_>, flags: &LedgerFlags) -> Result<Self, LedgerError> {
        let account = Hash160(r.read_array()?);
        let flag = *flags.get(r.read_u16()?)?;
        let amount = r.read_u64()?;
        let asset = AssetId::from_wire_optional(&r.read_array()?)?;
        let applied = match r.read_u8()? {
            0 => false,
            1 => true,
            other => return Err(LedgerError::AppliedByte(other)),
        };
        let mut entry = Self::new(account, flag, amount, asset)?;
        entry.applied = applied;
        Ok(entry)
    }
}

/// Ordered batches of ledger entries belonging to one receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerEntries {
    batches: Vec<Vec<LedgerEntry>>,
}

impl LedgerEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_batch(&mut self, batch: Vec<LedgerEntry>) -> Result<(), LedgerError> {
        if batch.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        if batch.len() > MAX_LEDGER_ENTRIES_PER_BATCH {
            return Err(LedgerError::BatchTooLarge(batch.len()));
        }
        if self.batches.len() >= MAX_LEDGER_BATCHES {
            return Err(LedgerError::TooManyBatches);
        }
        self.batches.push(batch);
        Ok(())
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn entry_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn batches(&self) -> &[Vec<LedgerEntry>] {
        &self.batches
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.batches.iter().flatten()
    }

    /// Marks every entry as applied to account state.
    pub fn mark_applied(&mut self) {
        for entry in self.batches.iter_mut().flatten() {
            entry.applied = true;
        }
    }

    /// Net balance change across all accounts for one asset.
    pub fn net_delta(&self, asset: Option<&AssetId>) -> i128 {
        self.entries()
            .filter(|e| e.asset.as_ref() == asset)
            .map(LedgerEntry::delta)
            .sum()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(1 + self.entry_count() * (LEDGER_ENTRY_WIRE_LEN + 1));
        // Counts are bounded by add_batch.
        w.put_u8(self.batches.len() as u8);
        for batch in &self.batches {
            w.put_u8(batch.len() as u8);
            for entry in batch {
                entry.write(&mut w);
            }
        }
        w.finish()
    }

    pub(crate) fn read(r: &mut Reader<'_>, flags: &LedgerFlags) -> Result<Self, LedgerError> {
        let mut entries = Self::new();
        let batch_count = r.read_u8()?;
        for _ in 0..batch_count {
            let entry_count = r.read_u8()? as usize;
            let batch = (0..entry_count)
                .map(|_| LedgerEntry::read(r, flags))
                .collect::<Result<Vec<_>, _>>()?;
            entries.add_batch(batch)?;
        }
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
