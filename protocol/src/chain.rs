//! Chain context.
//!
//! Everything chain-specific that the protocol core consults lives in one
//! [`ProtocolChain`] value that callers pass explicitly. Nothing is global,
//! so several chains can be validated side by side in one process.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::ChainConfig;
use crate::receipt::LedgerFlags;
use crate::transaction::flags::{TxFlag, TxFlags};
use crate::transaction::Transaction;

/// Height-dependent consensus rules supplied by the embedding chain.
pub trait ChainRules: Send + Sync {
    /// Fork identifier in force at `height`, mixed into block pre-images.
    fn fork_id(&self, height: u64) -> u8;

    /// Whether transactions of `flag` may be admitted at `height`.
    fn is_enabled_tx_flag(&self, flag: &TxFlag, height: u64) -> bool;
}

/// Rules that never change fork, with optional per-flag activation heights.
#[derive(Debug, Clone, Default)]
pub struct StaticChainRules {
    fork_id: u8,
    activations: BTreeMap<u16, u64>,
    disabled: BTreeSet<u16>,
}

impl StaticChainRules {
    pub fn new(fork_id: u8) -> Self {
        Self {
            fork_id,
            ..Self::default()
        }
    }

    /// Flag `flag_id` is rejected below `height`.
    pub fn activate_at(mut self, flag_id: u16, height: u64) -> Self {
        self.activations.insert(flag_id, height);
        self
    }

    pub fn disable(mut self, flag_id: u16) -> Self {
        self.disabled.insert(flag_id);
        self
    }
}

impl ChainRules for StaticChainRules {
    fn fork_id(&self, _height: u64) -> u8 {
        self.fork_id
    }

    fn is_enabled_tx_flag(&self, flag: &TxFlag, height: u64) -> bool {
        if self.disabled.contains(&flag.id()) {
            return false;
        }
        self.activations
            .get(&flag.id())
            .map_or(true, |activation| height >= *activation)
    }
}

/// Configuration, registries and rules of one chain. Immutable once built.
pub struct ProtocolChain {
    config: ChainConfig,
    tx_flags: TxFlags,
    ledger_flags: LedgerFlags,
    rules: Box<dyn ChainRules>,
}

impl fmt::Debug for ProtocolChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolChain")
            .field("config", &self.config)
            .field("tx_flags", &self.tx_flags.len())
            .field("ledger_flags", &self.ledger_flags.len())
            .finish_non_exhaustive()
    }
}

impl ProtocolChain {
    pub fn new(
        config: ChainConfig,
        tx_flags: TxFlags,
        ledger_flags: LedgerFlags,
        rules: impl ChainRules + 'static,
    ) -> Self {
        Self {
            config,
            tx_flags,
            ledger_flags,
            rules: Box::new(rules),
        }
    }

    /// Built-in flags and static rules at the configured fork id.
    pub fn standard(config: ChainConfig) -> Self {
        let rules = StaticChainRules::new(config.fork_id);
        Self::new(config, TxFlags::standard(), LedgerFlags::standard(), rules)
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn chain_id(&self) -> &[u8; 32] {
        &self.config.chain_id
    }

    pub fn tx_flags(&self) -> &TxFlags {
        &self.tx_flags
    }

    pub fn ledger_flags(&self) -> &LedgerFlags {
        &self.ledger_flags
    }

    pub fn rules(&self) -> &dyn ChainRules {
        self.rules.as_ref()
    }

    /// The chain id transactions at `height` are signed against. Genesis
    /// transactions use all zeros.
    pub fn signing_chain_id(&self, height: u64) -> [u8; 32] {
        if height == 0 {
            [0u8; 32]
        } else {
            self.config.chain_id
        }
    }

    /// The digest a transaction's signers signed at `height`.
    pub fn tx_pre_image(&self, tx: &Transaction, height: u64) -> [u8; 32] {
        tx.hash_pre_image(&self.signing_chain_id(height))
    }
}
