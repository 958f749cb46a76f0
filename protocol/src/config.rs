//! # Protocol Configuration & Constants
//!
//! Every limit the wire format enforces lives here. Encoders, decoders and
//! tests all read these constants; if you find a bare `0xFFFF` somewhere
//! else in the crate, it's a bug waiting for a hard fork.
//!
//! The second half of the file is [`ChainConfig`], the small amount of
//! per-chain state (chain id, fork id, genesis flag) that an embedding node
//! loads from JSON and hands to [`crate::chain::ProtocolChain`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Crate-level protocol version string, reported by the CLI.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// The only transaction wire version this crate encodes or accepts.
pub const TX_VERSION: u8 = 1;

/// The only block wire version this crate encodes or accepts.
pub const BLOCK_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Size Limits
// ---------------------------------------------------------------------------

/// Maximum encoded transaction size in bytes. Also the ceiling imposed by
/// the u16 length prefix a block body uses for each transaction.
pub const MAX_TRANSACTION_SIZE: usize = 0xFFFF;

/// Maximum length of the arbitrary `data` field of a transaction.
pub const MAX_ARBITRARY_DATA: usize = 0xEA60; // 60,000

/// Maximum encoded block size, header and body included.
pub const MAX_BLOCK_SIZE: usize = 0x0F4240; // 1,000,000

/// Maximum memo length. Memos are printable ASCII only.
pub const MAX_TX_MEMO_LEN: usize = 16;

/// A transaction moves at most this many (asset, amount) pairs.
pub const MAX_TRANSFERS_PER_TX: usize = 10;

/// Transactions and blocks each carry at most five signatures.
pub const MAX_SIGNATURES: usize = 5;

/// Upper bound on multi-signature key sets.
pub const MAX_ACCOUNT_KEYS: usize = 5;

/// Ledger entries per receipt batch.
pub const MAX_LEDGER_ENTRIES_PER_BATCH: usize = 30;

/// Receipt batches are counted with a single byte.
pub const MAX_LEDGER_BATCHES: usize = 0xFF;

/// Receipt result data is length-prefixed with a single byte.
pub const MAX_RECEIPT_DATA: usize = 0xFF;

/// Largest amount a transfer or ledger entry may carry. Leaves headroom below
/// `i64::MAX` so signed balance arithmetic in ledger backends can't overflow
/// on a single credit.
pub const MAX_AMOUNT: u64 = i64::MAX as u64 - 512;

/// Decimal places used when rendering amounts for humans.
pub const SCALE: u32 = 8;

/// Asset identifiers are 1..=8 ASCII alphanumerics, zero-padded on the wire.
pub const ASSET_ID_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

/// How many nonce candidates the signer tries before giving up on finding a
/// recovery id. In practice the first attempt always succeeds.
pub const MAX_SIGN_ATTEMPTS: u32 = 10;

// ---------------------------------------------------------------------------
// Transaction Flags
// ---------------------------------------------------------------------------

pub const TX_FLAG_FORGE: u16 = 0x0a;
pub const TX_FLAG_REGISTER: u16 = 0x64;
pub const TX_FLAG_TRANSFER: u16 = 0xc8;
pub const TX_FLAG_BURN: u16 = 0xc9;
pub const TX_FLAG_ACCOUNT_LOCK: u16 = 0x0190;
pub const TX_FLAG_ACCOUNT_UNLOCK: u16 = 0x0191;
pub const TX_FLAG_ACCOUNT_UPGRADE: u16 = 0x0192;

// ---------------------------------------------------------------------------
// Ledger Flags
// ---------------------------------------------------------------------------

/// Debit of a transaction fee from the sender.
pub const LEDGER_FLAG_TX_FEE: u16 = 0x01;
/// Credit of collected fees (e.g. to the forger).
pub const LEDGER_FLAG_FEE_COLLECTED: u16 = 0x02;
/// Block reward credit.
pub const LEDGER_FLAG_FORGE_REWARD: u16 = 0x0a;
/// Initial allocation to a freshly registered account.
pub const LEDGER_FLAG_REGISTER_CREDIT: u16 = 0x64;
/// Transfer leg leaving the sender.
pub const LEDGER_FLAG_TRANSFER_DEBIT: u16 = 0xc8;
/// Transfer leg arriving at the recipient.
pub const LEDGER_FLAG_TRANSFER_CREDIT: u16 = 0xc9;

// ---------------------------------------------------------------------------
// Receipt Status Codes
// ---------------------------------------------------------------------------

/// Default status assigned to a receipt whose ledger entries were applied.
pub const RECEIPT_STATUS_SUCCESS: u16 = 0x01;

// ---------------------------------------------------------------------------
// Chain Configuration
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`ChainConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read chain config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed chain config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("chain id must not be all zero bytes (reserved for genesis pre-images)")]
    ZeroChainId,

    #[error("genesis flag 0x{0:04x} is not a valid transaction flag")]
    InvalidGenesisFlag(u16),
}

fn default_genesis_flag() -> u16 {
    TX_FLAG_REGISTER
}

/// Per-chain parameters that the protocol core needs but cannot derive.
///
/// Serialized as JSON with the chain id as 64 hex characters:
///
/// ```json
/// { "chain_id": "9f…", "fork_id": 1, "genesis_flag": 100, "debug": false }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// 32-byte chain identifier, mixed into every transaction pre-image.
    #[serde(with = "hex::serde")]
    pub chain_id: [u8; 32],

    /// Fork identifier mixed into block pre-images.
    #[serde(default)]
    pub fork_id: u8,

    /// The only transaction flag admissible at height 0.
    #[serde(default = "default_genesis_flag")]
    pub genesis_flag: u16,

    /// Emit diagnostic logs for errors the pipeline swallows (recovery
    /// misses, receipt generation failures). Never changes outcomes.
    #[serde(default)]
    pub debug: bool,
}

impl ChainConfig {
    /// Builds a config for the given chain id with default fork and genesis
    /// settings.
    pub fn new(chain_id: [u8; 32]) -> Self {
        Self {
            chain_id,
            fork_id: 0,
            genesis_flag: default_genesis_flag(),
            debug: false,
        }
    }

    /// A throwaway development chain. The id is `hash256("keel-devnet")`, so
    /// every devnet in the world agrees on it.
    pub fn devnet() -> Self {
        Self::new(crate::crypto::hash::hash256(b"keel-devnet"))
    }

    /// Parses and validates a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ChainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serializes the config as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == [0u8; 32] {
            return Err(ConfigError::ZeroChainId);
        }
        if self.genesis_flag == 0 {
            return Err(ConfigError::InvalidGenesisFlag(self.genesis_flag));
        }
        Ok(())
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
