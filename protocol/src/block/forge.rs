//! Block assembly.
//!
//! A [`BlockForge`] collects admitted transactions with their pending
//! receipts. On first serialization it hands them to the chain's
//! [`ForgeHooks`] to be applied and finalised, derives totals and merkle
//! roots, and encodes. After that the body is frozen.

use thiserror::Error;
use tracing::{debug, info};

use super::decoded::{Block, BlockDecodeError};
use super::header::{block_pre_image, encode_block, encode_body, BlockEncodeError, BlockHeader};
use crate::chain::ProtocolChain;
use crate::config::{MAX_SIGNATURES, RECEIPT_STATUS_SUCCESS};
use crate::crypto::{sign_hash, PrivateKey, PublicKey, SignError, Signature};
use crate::merkle::{MerkleError, MerkleMap};
use crate::receipt::ReceiptError;
use crate::transaction::CheckedTx;
use crate::validation::{validate_epoch, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForgeError {
    #[error("previous block hash must be exactly 32 bytes, got {0}")]
    PrevHashLength(usize),

    #[error("invalid block version {0}")]
    Version(u32),

    #[error("invalid block timestamp: {0}")]
    Timestamp(#[from] ValidationError),

    #[error("cannot append a transaction whose receipt is already final")]
    FinalisedReceipt,

    #[error("receipts are final, no more transactions can be appended")]
    BodyFrozen,

    #[error("blocks carry at most {} signatures", MAX_SIGNATURES)]
    TooManySignatures,

    #[error("receipt finalisation failed: {0}")]
    Finalise(#[from] ReceiptError),

    #[error("forge hook failed: {0}")]
    Hook(String),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Encode(#[from] BlockEncodeError),

    #[error(transparent)]
    Decode(#[from] BlockDecodeError),

    #[error(transparent)]
    Sign(#[from] SignError),
}

/// The chain's side of forging: seed the block and settle receipts.
pub trait ForgeHooks {
    /// Called once from [`BlockForge::new`]. Returned transactions, such as
    /// the forger's reward, open the block body.
    fn on_construct(&mut self, chain: &ProtocolChain, height: u64) -> Result<Vec<CheckedTx>, ForgeError>;

    /// Applies the ledger entries of every transaction and finalises each
    /// receipt. Called on serialization until it first succeeds. After a
    /// failed call some receipts may already be final, so implementations
    /// must skip those and settle only the pending ones.
    fn finalize_receipts(
        &mut self,
        chain: &ProtocolChain,
        height: u64,
        txs: &mut [CheckedTx],
    ) -> Result<(), ForgeError>;
}

impl<T: ForgeHooks + ?Sized> ForgeHooks for &mut T {
    fn on_construct(&mut self, chain: &ProtocolChain, height: u64) -> Result<Vec<CheckedTx>, ForgeError> {
        (**self).on_construct(chain, height)
    }

    fn finalize_receipts(
        &mut self,
        chain: &ProtocolChain,
        height: u64,
        txs: &mut [CheckedTx],
    ) -> Result<(), ForgeError> {
        (**self).finalize_receipts(chain, height, txs)
    }
}

/// Marks every entry applied and every receipt successful. For chains that
/// settle balances elsewhere, and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyAllHooks;

impl ForgeHooks for ApplyAllHooks {
    fn on_construct(&mut self, _chain: &ProtocolChain, _height: u64) -> Result<Vec<CheckedTx>, ForgeError> {
        Ok(Vec::new())
    }

    fn finalize_receipts(
        &mut self,
        _chain: &ProtocolChain,
        _height: u64,
        txs: &mut [CheckedTx],
    ) -> Result<(), ForgeError> {
        for checked in txs.iter_mut().filter(|c| !c.receipt().is_finalised()) {
            let receipt = checked.receipt_mut();
            receipt.ledger_mut().mark_applied();
            receipt.finalise(RECEIPT_STATUS_SUCCESS)?;
        }
        Ok(())
    }
}

/// Block under construction for `height`.
pub struct BlockForge<'c, H: ForgeHooks> {
    chain: &'c ProtocolChain,
    height: u64,
    hooks: H,
    version: u8,
    timestamp: u32,
    prev_hash: [u8; 32],
    forger: Option<PublicKey>,
    signatures: Vec<Signature>,
    reward: u64,
    txs: Vec<CheckedTx>,
    finalised: bool,
}

impl<'c, H: ForgeHooks> BlockForge<'c, H> {
    pub fn new(
        chain: &'c ProtocolChain,
        height: u64,
        prev_hash: &[u8],
        version: u32,
        epoch: u64,
        mut hooks: H,
    ) -> Result<Self, ForgeError> {
        let prev_hash: [u8; 32] = prev_hash
            .try_into()
            .map_err(|_| ForgeError::PrevHashLength(prev_hash.len()))?;
        let version = u8::try_from(version).map_err(|_| ForgeError::Version(version))?;
        let timestamp = validate_epoch(epoch)?;

        let txs = hooks.on_construct(chain, height)?;
        let mut forge = Self {
            chain,
            height,
            hooks,
            version,
            timestamp,
            prev_hash,
            forger: None,
            signatures: Vec::new(),
            reward: 0,
            txs: Vec::with_capacity(txs.len()),
            finalised: false,
        };
        for checked in txs {
            forge.append_tx(checked)?;
        }
        Ok(forge)
    }

    pub fn append_tx(&mut self, checked: CheckedTx) -> Result<&mut Self, ForgeError> {
        if self.finalised {
            return Err(ForgeError::BodyFrozen);
        }
        if checked.receipt().is_finalised() {
            return Err(ForgeError::FinalisedReceipt);
        }
        self.txs.push(checked);
        Ok(self)
    }

    pub fn forger(&mut self, key: PublicKey) -> &mut Self {
        self.forger = Some(key);
        self
    }

    pub fn add_signature(&mut self, signature: Signature) -> Result<&mut Self, ForgeError> {
        if self.signatures.len() >= MAX_SIGNATURES {
            return Err(ForgeError::TooManySignatures);
        }
        self.signatures.push(signature);
        Ok(self)
    }

    pub fn set_reward(&mut self, reward: u64) -> &mut Self {
        self.reward = reward;
        self
    }

    pub fn txs(&self) -> &[CheckedTx] {
        &self.txs
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn is_finalised(&self) -> bool {
        self.finalised
    }

    /// Encodes the block, finalising receipts on the first call. If the hooks
    /// fail, the body stays open and the next call runs them again.
    pub fn serialize(&mut self, include_signatures: bool) -> Result<Vec<u8>, ForgeError> {
        let forger = self.forger.ok_or(BlockEncodeError::MissingForger)?;
        if !self.finalised {
            self.hooks.finalize_receipts(self.chain, self.height, &mut self.txs)?;
            self.finalised = true;
        }

        let tx_count = u16::try_from(self.txs.len())
            .map_err(|_| BlockEncodeError::TooManyTransactions(self.txs.len()))?;
        let mut tx_map = MerkleMap::new();
        let mut receipt_map = MerkleMap::new();
        let (mut total_in, mut total_out, mut total_fee) = (0u64, 0u64, 0u64);

        for (index, checked) in self.txs.iter().enumerate() {
            let receipt = checked.receipt();
            if !receipt.is_finalised() {
                return Err(BlockEncodeError::PendingReceipt(index).into());
            }
            let receipt_hash = receipt
                .receipt_hash()
                .map_err(|source| BlockEncodeError::Receipt { index, source })?;
            tx_map.append_with_hash(*checked.tx().hash(), checked.tx())?;
            receipt_map.append_with_hash(receipt_hash, receipt)?;

            for entry in receipt.ledger().entries().filter(|e| e.asset.is_none()) {
                let total = if entry.flag.is_fee() {
                    &mut total_fee
                } else if entry.flag.is_credit() {
                    &mut total_in
                } else {
                    &mut total_out
                };
                *total = total
                    .checked_add(entry.amount)
                    .ok_or(BlockEncodeError::TotalsOverflow)?;
            }
        }

        let body = encode_body(
            self.txs
                .iter()
                .map(|checked| (checked.tx(), checked.receipt())),
        )?;
        let header = BlockHeader {
            version: self.version,
            timestamp: self.timestamp,
            prev_hash: self.prev_hash,
            tx_count,
            total_in,
            total_out,
            total_fee,
            forger: forger.hash160(),
            signatures: self.signatures.clone(),
            reward: self.reward,
            merkle_tx: tx_map.merkle_root(),
            merkle_receipts: receipt_map.merkle_root(),
            body_size: 0,
        };
        Ok(encode_block(&header, &body, include_signatures)?)
    }

    /// `hash256(fork_id ‖ chain_id ‖ serialize(false))` at this height.
    pub fn hash_pre_image(&mut self) -> Result<[u8; 32], ForgeError> {
        let unsigned = self.serialize(false)?;
        let fork_id = self.chain.rules().fork_id(self.height);
        Ok(block_pre_image(fork_id, self.chain.chain_id(), &unsigned))
    }

    /// Signs the block pre-image and appends the signature.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<&mut Self, ForgeError> {
        if self.signatures.len() >= MAX_SIGNATURES {
            return Err(ForgeError::TooManySignatures);
        }
        let digest = self.hash_pre_image()?;
        let signature = sign_hash(key, &digest)?;
        debug!(height = self.height, v = signature.v(), "block signed");
        self.signatures.push(signature);
        Ok(self)
    }

    /// Encodes with signatures and decodes the bytes back into a [`Block`].
    pub fn seal(&mut self) -> Result<Block, ForgeError> {
        let bytes = self.serialize(true)?;
        let block = Block::decode(self.chain, &bytes, self.height)?;
        info!(
            height = self.height,
            hash = %hex::encode(block.hash()),
            txs = block.tx_count(),
            size = bytes.len(),
            "block forged"
        );
        Ok(block)
    }
}
