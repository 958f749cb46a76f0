//! Transaction admission.
//!
//! [`CheckedTx::admit`] is the gate between a decoded transaction and a
//! block. In order:
//!
//! 1. At height 0 only the configured genesis flag is accepted and
//!    signatures are not checked.
//! 2. Otherwise the sender account must be supplied and match the
//!    transaction's sender, and enough of its keys must have signed the
//!    height's pre-image.
//! 3. The flag must be registered and enabled at this height.
//! 4. The flag's receipt factory produces a pending receipt.
//!
//! The first failure wins and nothing is returned but the error.

use thiserror::Error;
use tracing::{debug, trace};

use super::flags::UnknownTxFlag;
use super::prepared::Transaction;
use crate::accounts::{required_signatures, verify_signatures, ChainAccount, SignatureError};
use crate::chain::ProtocolChain;
use crate::crypto::Hash160;
use crate::receipt::TxReceipt;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckTxError {
    #[error("transaction carries no signatures")]
    Unsigned,

    #[error("sender account is required outside genesis")]
    MissingSenderAccount,

    #[error("account {account} does not match transaction sender {sender:?}")]
    SenderMismatch {
        account: Hash160,
        sender: Option<Hash160>,
    },

    #[error(transparent)]
    Signatures(#[from] SignatureError),

    #[error("{verified} of {required} required signatures verified")]
    InsufficientSignatures { required: usize, verified: usize },

    #[error("flag 0x{flag:04x} is not the genesis flag 0x{expected:04x}")]
    NotGenesisFlag { flag: u16, expected: u16 },

    #[error(transparent)]
    UnknownFlag(#[from] UnknownTxFlag),

    #[error("flag 0x{flag:04x} is disabled at height {height}")]
    FlagDisabled { flag: u16, height: u64 },

    #[error("receipt generation failed: {reason}")]
    ReceiptGeneration { reason: String },
}

impl CheckTxError {
    /// Numeric rejection code reported to peers.
    pub fn code(&self) -> u8 {
        match self {
            CheckTxError::Unsigned => 0x0b,
            CheckTxError::MissingSenderAccount
            | CheckTxError::SenderMismatch { .. }
            | CheckTxError::Signatures(_)
            | CheckTxError::InsufficientSignatures { .. } => 0x0c,
            CheckTxError::ReceiptGeneration { .. } => 0x0d,
            CheckTxError::NotGenesisFlag { .. }
            | CheckTxError::UnknownFlag(_)
            | CheckTxError::FlagDisabled { .. } => 0x0e,
        }
    }
}

/// Signature counts recorded during admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAudit {
    pub total: usize,
    pub required: usize,
    pub verified: usize,
    pub fork_id: u8,
}

/// A transaction that passed admission, with its pending receipt.
#[derive(Debug, Clone)]
pub struct CheckedTx {
    tx: Transaction,
    receipt: TxReceipt,
    audit: Option<SignatureAudit>,
    height: u64,
}

impl CheckedTx {
    pub fn admit(
        chain: &ProtocolChain,
        sender: Option<&dyn ChainAccount>,
        tx: Transaction,
        height: u64,
    ) -> Result<Self, CheckTxError> {
        let audit = if height == 0 {
            let expected = chain.config().genesis_flag;
            if tx.flag() != expected {
                return Err(CheckTxError::NotGenesisFlag {
                    flag: tx.flag(),
                    expected,
                });
            }
            None
        } else {
            Some(check_signatures(chain, sender, &tx, height)?)
        };

        Self::with_receipt(chain, tx, height, audit)
    }

    /// Accepts a transaction the chain issues itself, such as a forger's
    /// reward. Signatures and the genesis rule are not checked; the flag
    /// must still be registered and enabled.
    pub fn issued(chain: &ProtocolChain, tx: Transaction, height: u64) -> Result<Self, CheckTxError> {
        Self::with_receipt(chain, tx, height, None)
    }

    fn with_receipt(
        chain: &ProtocolChain,
        tx: Transaction,
        height: u64,
        audit: Option<SignatureAudit>,
    ) -> Result<Self, CheckTxError> {
        let flag = chain.tx_flags().get(tx.flag())?;
        if !chain.rules().is_enabled_tx_flag(flag, height) {
            return Err(CheckTxError::FlagDisabled {
                flag: tx.flag(),
                height,
            });
        }

        let receipt = flag
            .kind()
            .generate_receipt(&tx, chain.ledger_flags(), height)
            .map_err(|e| {
                if chain.config().debug {
                    debug!(tx = %hex::encode(tx.hash()), error = %e, "receipt generation failed");
                }
                CheckTxError::ReceiptGeneration {
                    reason: e.to_string(),
                }
            })?;

        trace!(
            tx = %hex::encode(tx.hash()),
            flag = flag.name(),
            height,
            ?audit,
            "transaction admitted"
        );

        Ok(Self {
            tx,
            receipt,
            audit,
            height,
        })
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn receipt(&self) -> &TxReceipt {
        &self.receipt
    }

    pub fn receipt_mut(&mut self) -> &mut TxReceipt {
        &mut self.receipt
    }

    /// `None` for genesis and chain-issued transactions.
    pub fn audit(&self) -> Option<&SignatureAudit> {
        self.audit.as_ref()
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn into_parts(self) -> (Transaction, TxReceipt) {
        (self.tx, self.receipt)
    }
}

fn check_signatures(
    chain: &ProtocolChain,
    sender: Option<&dyn ChainAccount>,
    tx: &Transaction,
    height: u64,
) -> Result<SignatureAudit, CheckTxError> {
    let account = sender.ok_or(CheckTxError::MissingSenderAccount)?;
    if tx.sender() != Some(&account.hash160()) {
        return Err(CheckTxError::SenderMismatch {
            account: account.hash160(),
            sender: tx.sender().copied(),
        });
    }
    if tx.signatures().is_empty() {
        return Err(CheckTxError::Unsigned);
    }

    let required = required_signatures(account.public_keys().len());
    let fork_id = chain.rules().fork_id(height);
    let digest = chain.tx_pre_image(tx, height);
    let verified = verify_signatures(account, &digest, tx.signatures())?;

    let audit = SignatureAudit {
        total: tx.signatures().len(),
        required,
        verified,
        fork_id,
    };
    if verified < required {
        if chain.config().debug {
            debug!(tx = %hex::encode(tx.hash()), ?audit, "insufficient signatures");
        }
        return Err(CheckTxError::InsufficientSignatures { required, verified });
    }
    Ok(audit)
}
