//! Decoded blocks.

use thiserror::Error;
use tracing::warn;

use super::header::{block_pre_image, BlockHeader, HEADER_SEPARATOR, SIGNATURES_OFFSET};
use crate::chain::ProtocolChain;
use crate::codec::{CodecError, Reader};
use crate::config::{BLOCK_VERSION, MAX_BLOCK_SIZE, MAX_SIGNATURES};
use crate::crypto::signatures::SIGNATURE_WIRE_LEN;
use crate::crypto::{hash256, Hash160, Signature};
use crate::merkle::{MerkleError, MerkleMap};
use crate::receipt::{ReceiptError, TxReceipt};
use crate::transaction::{Transaction, TxDecodeError, UnknownTxFlag};
use crate::validation::is_valid_epoch;

/// Why a block field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockFieldError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("unsupported block version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid block timestamp {0}")]
    Timestamp(u32),

    #[error("block carries {0} signatures, maximum is {}", MAX_SIGNATURES)]
    TooManySignatures(u8),

    #[error("{0} merkle root must be all zero bytes in an empty block")]
    NonZeroMerkleRoot(&'static str),

    #[error("invalid header separator 0x{0:02x}")]
    Separator(u8),

    #[error("body size declares {declared} bytes but {consumed} were used by {tx_count} transactions")]
    BodySize {
        declared: u32,
        consumed: usize,
        tx_count: u16,
    },

    #[error("transaction #{index}: {source}")]
    Transaction {
        index: usize,
        #[source]
        source: TxDecodeError,
    },

    #[error("transaction #{index}: {source}")]
    UnknownFlag {
        index: usize,
        #[source]
        source: UnknownTxFlag,
    },

    #[error("receipt #{index}: {source}")]
    Receipt {
        index: usize,
        #[source]
        source: ReceiptError,
    },

    #[error("transaction #{index}: {source}")]
    Duplicate {
        index: usize,
        #[source]
        source: MerkleError,
    },

    #[error("{0} merkle root does not match the block body")]
    MerkleMismatch(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockDecodeError {
    #[error("block of {size} bytes exceeds maximum of {}", MAX_BLOCK_SIZE)]
    TooLarge { size: usize },

    /// `partial` holds every header field read before the failure.
    #[error("incomplete block: {reason}")]
    Incomplete {
        reason: BlockFieldError,
        partial: Box<BlockHeader>,
    },
}

impl BlockDecodeError {
    pub fn reason(&self) -> Option<&BlockFieldError> {
        match self {
            BlockDecodeError::Incomplete { reason, .. } => Some(reason),
            BlockDecodeError::TooLarge { .. } => None,
        }
    }
}

/// A fully validated block.
///
/// Produced by [`Block::decode`] or [`super::BlockForge::seal`]. Both merkle
/// roots have been recomputed from the body and every receipt was decoded
/// against its own transaction.
#[derive(Debug, Clone)]
pub struct Block {
    header: BlockHeader,
    txs: MerkleMap<Transaction>,
    receipts: MerkleMap<TxReceipt>,
    raw: Vec<u8>,
    unsigned: Vec<u8>,
    hash: [u8; 32],
}

impl Block {
    /// Decodes and validates block bytes received at `height`.
    pub fn decode(chain: &ProtocolChain, bytes: &[u8], height: u64) -> Result<Self, BlockDecodeError> {
        if bytes.len() > MAX_BLOCK_SIZE {
            return Err(BlockDecodeError::TooLarge { size: bytes.len() });
        }

        let mut header = BlockHeader::default();
        let mut txs = MerkleMap::new();
        let mut receipts = MerkleMap::new();
        if let Err(reason) = decode_into(chain, bytes, height, &mut header, &mut txs, &mut receipts) {
            if chain.config().debug {
                warn!(height, error = %reason, "block decode failed");
            }
            return Err(BlockDecodeError::Incomplete {
                reason,
                partial: Box::new(header),
            });
        }

        // The unsigned form differs only in the signature section.
        let signatures_end = SIGNATURES_OFFSET + 1 + header.signatures.len() * SIGNATURE_WIRE_LEN;
        let mut unsigned = Vec::with_capacity(bytes.len());
        unsigned.extend_from_slice(&bytes[..SIGNATURES_OFFSET]);
        unsigned.push(0);
        unsigned.extend_from_slice(&bytes[signatures_end..]);

        Ok(Self {
            header,
            txs,
            receipts,
            raw: bytes.to_vec(),
            unsigned,
            hash: hash256(bytes),
        })
    }

    /// `hash256(raw)`.
    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn serialize(&self, include_signatures: bool) -> Vec<u8> {
        if include_signatures {
            self.raw.clone()
        } else {
            self.unsigned.clone()
        }
    }

    /// `hash256(fork_id ‖ chain_id ‖ serialize(false))`.
    pub fn hash_pre_image(&self, chain_id: &[u8; 32], fork_id: u8) -> [u8; 32] {
        block_pre_image(fork_id, chain_id, &self.unsigned)
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn txs(&self) -> &MerkleMap<Transaction> {
        &self.txs
    }

    pub fn receipts(&self) -> &MerkleMap<TxReceipt> {
        &self.receipts
    }

    pub fn version(&self) -> u8 {
        self.header.version
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    pub fn prev_hash(&self) -> &[u8; 32] {
        &self.header.prev_hash
    }

    pub fn tx_count(&self) -> u16 {
        self.header.tx_count
    }

    pub fn forger(&self) -> &Hash160 {
        &self.header.forger
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.header.signatures
    }

    pub fn reward(&self) -> u64 {
        self.header.reward
    }
}

/// Fills `h` step by step.
fn decode_into(
    chain: &ProtocolChain,
    bytes: &[u8],
    height: u64,
    h: &mut BlockHeader,
    txs: &mut MerkleMap<Transaction>,
    receipts: &mut MerkleMap<TxReceipt>,
) -> Result<(), BlockFieldError> {
    let mut r = Reader::new(bytes);

    h.version = r.read_u8()?;
    if h.version != BLOCK_VERSION {
        return Err(BlockFieldError::UnsupportedVersion(h.version));
    }
    h.timestamp = r.read_u32()?;
    if !is_valid_epoch(h.timestamp as u64) {
        return Err(BlockFieldError::Timestamp(h.timestamp));
    }
    h.prev_hash = r.read_array()?;
    h.tx_count = r.read_u16()?;
    h.total_in = r.read_u64()?;
    h.total_out = r.read_u64()?;
    h.total_fee = r.read_u64()?;
    h.forger = Hash160(r.read_array()?);

    let signature_count = r.read_u8()?;
    if signature_count as usize > MAX_SIGNATURES {
        return Err(BlockFieldError::TooManySignatures(signature_count));
    }
    for _ in 0..signature_count {
        h.signatures.push(Signature::read(&mut r)?);
    }

    h.reward = r.read_u64()?;
    h.merkle_tx = r.read_array()?;
    h.merkle_receipts = r.read_array()?;
    if h.tx_count == 0 {
        if h.merkle_tx != [0u8; 32] {
            return Err(BlockFieldError::NonZeroMerkleRoot("transactions"));
        }
        if h.merkle_receipts != [0u8; 32] {
            return Err(BlockFieldError::NonZeroMerkleRoot("receipts"));
        }
    }

    h.body_size = r.read_u32()?;
    let separator = r.read_u8()?;
    if separator != HEADER_SEPARATOR {
        return Err(BlockFieldError::Separator(separator));
    }

    let body = r.read_bytes(h.body_size as usize)?;
    r.ensure_exhausted()?;

    let mut b = Reader::new(body);
    for index in 0..h.tx_count as usize {
        let tx_len = b.read_u16()? as usize;
        let tx = Transaction::decode(b.read_bytes(tx_len)?)
            .map_err(|source| BlockFieldError::Transaction { index, source })?;

        let receipt_len = b.read_u16()? as usize;
        let receipt_bytes = b.read_bytes(receipt_len)?;
        let flag = chain
            .tx_flags()
            .get(tx.flag())
            .map_err(|source| BlockFieldError::UnknownFlag { index, source })?;
        let receipt = flag
            .kind()
            .decode_receipt(&tx, receipt_bytes, chain.ledger_flags(), height)
            .map_err(|source| BlockFieldError::Receipt { index, source })?;
        let receipt_hash = receipt
            .receipt_hash()
            .map_err(|source| BlockFieldError::Receipt { index, source })?;

        txs.append_with_hash(*tx.hash(), tx)
            .map_err(|source| BlockFieldError::Duplicate { index, source })?;
        receipts
            .append_with_hash(receipt_hash, receipt)
            .map_err(|source| BlockFieldError::Duplicate { index, source })?;
    }
    if b.remaining() != 0 {
        return Err(BlockFieldError::BodySize {
            declared: h.body_size,
            consumed: b.position(),
            tx_count: h.tx_count,
        });
    }

    if txs.merkle_root() != h.merkle_tx {
        return Err(BlockFieldError::MerkleMismatch("transactions"));
    }
    if receipts.merkle_root() != h.merkle_receipts {
        return Err(BlockFieldError::MerkleMismatch("receipts"));
    }
    Ok(())
}
