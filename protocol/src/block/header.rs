//! Block header fields and the shared block encoder.
//!
//! Wire layout (version 1), little-endian:
//!
//! ```text
//! version          u8
//! timestamp        u32
//! prev hash        32
//! tx count         u16
//! total in         u64
//! total out        u64
//! total fee        u64
//! forger           20   hash160
//! signatures       u8 count (≤ 5), then r(32) s(32) v(u8) each
//! reward           u64
//! merkle tx        32
//! merkle receipts  32
//! body size        u32
//! separator        0x00
//! body             per tx: u16 len ‖ tx ‖ u16 len ‖ receipt
//! ```
//!
//! The unsigned encoding writes a signature count of zero.

use thiserror::Error;

use crate::codec::{CodecError, UIntWidth, Writer};
use crate::config::{MAX_BLOCK_SIZE, MAX_SIGNATURES};
use crate::crypto::{hash256, Hash160, Signature};
use crate::receipt::{ReceiptError, TxReceipt};
use crate::transaction::Transaction;

/// Byte between the header and the body.
pub const HEADER_SEPARATOR: u8 = 0x00;

/// Offset of the signature count: every field before it is fixed width.
pub const SIGNATURES_OFFSET: usize = 1 + 4 + 32 + 2 + 8 * 3 + Hash160::LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockEncodeError {
    #[error("block forger public key is required")]
    MissingForger,

    #[error("blocks carry at most {} signatures", MAX_SIGNATURES)]
    TooManySignatures,

    #[error("block holds {0} transactions, more than a u16 count allows")]
    TooManyTransactions(usize),

    #[error("receipt #{0} is still pending")]
    PendingReceipt(usize),

    #[error("receipt #{index}: {source}")]
    Receipt {
        index: usize,
        #[source]
        source: ReceiptError,
    },

    #[error("block totals overflow u64")]
    TotalsOverflow,

    #[error("encoded block is {0} bytes, maximum is {}", MAX_BLOCK_SIZE)]
    TooLarge(usize),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Every header field of a block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u8,
    pub timestamp: u32,
    pub prev_hash: [u8; 32],
    pub tx_count: u16,
    pub total_in: u64,
    pub total_out: u64,
    pub total_fee: u64,
    pub forger: Hash160,
    pub signatures: Vec<Signature>,
    pub reward: u64,
    pub merkle_tx: [u8; 32],
    pub merkle_receipts: [u8; 32],
    pub body_size: u32,
}

/// Encodes the (transaction, receipt) pairs of a block body. Receipts must
/// be finalised.
pub(crate) fn encode_body<'a>(
    pairs: impl IntoIterator<Item = (&'a Transaction, &'a TxReceipt)>,
) -> Result<Vec<u8>, BlockEncodeError> {
    let mut w = Writer::new();
    for (index, (tx, receipt)) in pairs.into_iter().enumerate() {
        let receipt_bytes = receipt
            .serialize()
            .map_err(|source| BlockEncodeError::Receipt { index, source })?;
        w.put_prefixed(tx.raw(), UIntWidth::U16)?;
        w.put_prefixed(&receipt_bytes, UIntWidth::U16)?;
    }
    Ok(w.finish())
}

/// Encodes a whole block. `header.body_size` is ignored in favour of the
/// actual body length.
pub(crate) fn encode_block(
    header: &BlockHeader,
    body: &[u8],
    include_signatures: bool,
) -> Result<Vec<u8>, BlockEncodeError> {
    if header.signatures.len() > MAX_SIGNATURES {
        return Err(BlockEncodeError::TooManySignatures);
    }

    let mut w = Writer::with_capacity(256 + body.len());
    w.put_u8(header.version);
    w.put_u32(header.timestamp);
    w.put_bytes(&header.prev_hash);
    w.put_u16(header.tx_count);
    w.put_u64(header.total_in);
    w.put_u64(header.total_out);
    w.put_u64(header.total_fee);
    w.put_bytes(header.forger.as_bytes());
    if include_signatures {
        w.put_u8(header.signatures.len() as u8);
        for signature in &header.signatures {
            signature.write(&mut w);
        }
    } else {
        w.put_u8(0);
    }
    w.put_u64(header.reward);
    w.put_bytes(&header.merkle_tx);
    w.put_bytes(&header.merkle_receipts);
    w.put_uint(body.len() as u64, UIntWidth::U32)?;
    w.put_u8(HEADER_SEPARATOR);
    w.put_bytes(body);

    if w.len() > MAX_BLOCK_SIZE {
        return Err(BlockEncodeError::TooLarge(w.len()));
    }
    Ok(w.finish())
}

/// `hash256(fork_id ‖ chain_id ‖ unsigned block)`, the digest forgers sign.
pub(crate) fn block_pre_image(fork_id: u8, chain_id: &[u8; 32], unsigned: &[u8]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(1 + 32 + unsigned.len());
    buf.push(fork_id);
    buf.extend_from_slice(chain_id);
    buf.extend_from_slice(unsigned);
    hash256(&buf)
}
