//! Transaction flags and the registry that maps them to behaviour.
//!
//! A flag id selects what a transaction means: which receipt it produces
//! and how that receipt is decoded back out of a block. The three built-in
//! kinds are closed enum variants; embedding chains add their own through
//! [`TxKind::Custom`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::builder::TransactionBuilder;
use super::prepared::Transaction;
use super::wire::{TxDecodeError, TxFieldError};
use crate::config::{TX_FLAG_FORGE, TX_FLAG_REGISTER, TX_FLAG_TRANSFER};
use crate::receipt::factories::{forge_receipt, register_receipt, transfer_receipt};
use crate::receipt::{LedgerFlags, ReceiptError, TxReceipt};
use crate::validation::{normalize_flag_name, ValidationError};

/// Receipt behaviour for a custom transaction kind.
pub trait TxHandler: Send + Sync {
    /// Builds the pending receipt for an admitted transaction.
    fn generate_receipt(
        &self,
        tx: &Transaction,
        ledger_flags: &LedgerFlags,
        height: u64,
    ) -> Result<TxReceipt, ReceiptError>;

    /// Decodes this kind's receipt from block bytes.
    fn decode_receipt(
        &self,
        tx: &Transaction,
        bytes: &[u8],
        ledger_flags: &LedgerFlags,
        _height: u64,
    ) -> Result<TxReceipt, ReceiptError> {
        TxReceipt::decode(tx, bytes, ledger_flags)
    }
}

#[derive(Clone)]
pub enum TxKind {
    Register,
    Transfer,
    Forge,
    Custom(Arc<dyn TxHandler>),
}

impl fmt::Debug for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxKind::Register => f.write_str("Register"),
            TxKind::Transfer => f.write_str("Transfer"),
            TxKind::Forge => f.write_str("Forge"),
            TxKind::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl TxKind {
    pub fn generate_receipt(
        &self,
        tx: &Transaction,
        ledger_flags: &LedgerFlags,
        height: u64,
    ) -> Result<TxReceipt, ReceiptError> {
        match self {
            TxKind::Register => register_receipt(tx, ledger_flags),
            TxKind::Transfer => transfer_receipt(tx, ledger_flags),
            TxKind::Forge => forge_receipt(tx, ledger_flags),
            TxKind::Custom(handler) => handler.generate_receipt(tx, ledger_flags, height),
        }
    }

    pub fn decode_receipt(
        &self,
        tx: &Transaction,
        bytes: &[u8],
        ledger_flags: &LedgerFlags,
        height: u64,
    ) -> Result<TxReceipt, ReceiptError> {
        match self {
            TxKind::Custom(handler) => handler.decode_receipt(tx, bytes, ledger_flags, height),
            _ => TxReceipt::decode(tx, bytes, ledger_flags),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnknownTxFlag {
    #[error("unknown transaction flag 0x{0:04x}")]
    Id(u16),

    #[error("unknown transaction flag name {0:?}")]
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagRegistryError {
    #[error("transaction flag 0x{0:04x} is already registered")]
    DuplicateId(u16),

    #[error("transaction flag name {0} is already registered")]
    DuplicateName(String),

    #[error(transparent)]
    InvalidName(#[from] ValidationError),
}

/// A registered transaction flag.
#[derive(Debug, Clone)]
pub struct TxFlag {
    id: u16,
    name: String,
    kind: TxKind,
}

impl TxFlag {
    /// `name` is normalised to upper case.
    pub fn new(id: u16, name: &str, kind: TxKind) -> Result<Self, FlagRegistryError> {
        Ok(Self {
            id,
            name: normalize_flag_name(name)?,
            kind,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TxKind {
        &self.kind
    }

    /// A builder preset to this flag.
    pub fn builder(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.id)
    }

    /// Decodes a transaction that must carry this flag.
    pub fn decode(&self, bytes: &[u8]) -> Result<Transaction, TxDecodeError> {
        let tx = Transaction::decode(bytes)?;
        if tx.flag() != self.id {
            return Err(TxDecodeError::Incomplete {
                reason: TxFieldError::UnexpectedFlag {
                    expected: self.id,
                    found: tx.flag(),
                },
                partial: Box::new(tx.fields().clone()),
            });
        }
        Ok(tx)
    }
}

/// Read-only after setup: id → flag, plus a name index.
#[derive(Debug, Clone, Default)]
pub struct TxFlags {
    by_id: BTreeMap<u16, TxFlag>,
    by_name: HashMap<String, u16>,
}

impl TxFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// FORGE, REGISTER and TRANSFER.
    pub fn standard() -> Self {
        let mut flags = Self::new();
        let defs = [
            (TX_FLAG_FORGE, "FORGE", TxKind::Forge),
            (TX_FLAG_REGISTER, "REGISTER", TxKind::Register),
            (TX_FLAG_TRANSFER, "TRANSFER", TxKind::Transfer),
        ];
        for (id, name, kind) in defs {
            if let Ok(flag) = TxFlag::new(id, name, kind) {
                flags.by_name.insert(flag.name.clone(), id);
                flags.by_id.insert(id, flag);
            }
        }
        flags
    }

    pub fn register(&mut self, flag: TxFlag) -> Result<&mut Self, FlagRegistryError> {
        if self.by_id.contains_key(&flag.id) {
            return Err(FlagRegistryError::DuplicateId(flag.id));
        }
        if self.by_name.contains_key(&flag.name) {
            return Err(FlagRegistryError::DuplicateName(flag.name));
        }
        self.by_name.insert(flag.name.clone(), flag.id);
        self.by_id.insert(flag.id, flag);
        Ok(self)
    }

    pub fn get(&self, id: u16) -> Result<&TxFlag, UnknownTxFlag> {
        self.by_id.get(&id).ok_or(UnknownTxFlag::Id(id))
    }

    /// Case-insensitive lookup.
    pub fn get_by_name(&self, name: &str) -> Result<&TxFlag, UnknownTxFlag> {
        let unknown = || UnknownTxFlag::Name(name.to_string());
        let normalized = normalize_flag_name(name).map_err(|_| unknown())?;
        self.by_name
            .get(&normalized)
            .and_then(|id| self.by_id.get(id))
            .ok_or_else(unknown)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TxFlag> {
        self.by_id.values()
    }
}
