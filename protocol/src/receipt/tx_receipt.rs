//! Transaction receipts.

use thiserror::Error;

use super::ledger::{LedgerEntries, LedgerError, LedgerFlags};
use crate::codec::{CodecError, Reader, Writer};
use crate::config::MAX_RECEIPT_DATA;
use crate::crypto::hash256;
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiptError {
    #[error("receipt is still pending")]
    Pending,

    #[error("receipt already finalised with status 0x{0:04x}")]
    AlreadyFinalised(u16),

    #[error("receipt data of {0} bytes exceeds maximum of {}", MAX_RECEIPT_DATA)]
    DataTooLarge(usize),

    #[error("receipt is bound to tx {found}, expected {expected}")]
    TxHashMismatch { expected: String, found: String },

    #[error("transaction has no {0}")]
    MissingParty(&'static str),

    #[error("invalid transaction payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// The outcome of one transaction: a status, optional data, and the ledger
/// entries it produced.
///
/// Receipts are born pending from a flag's receipt factory. The ledger
/// collaborator applies the entries and then calls [`TxReceipt::finalise`].
/// Only finalised receipts hash or serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    tx_hash: [u8; 32],
    status: Option<u16>,
    data: Vec<u8>,
    ledger: LedgerEntries,
}

impl TxReceipt {
    /// A pending receipt with no data and no ledger entries.
    pub fn pending(tx: &Transaction) -> Self {
        Self {
            tx_hash: *tx.hash(),
            status: None,
            data: Vec::new(),
            ledger: LedgerEntries::new(),
        }
    }

    pub fn tx_hash(&self) -> &[u8; 32] {
        &self.tx_hash
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_finalised(&self) -> bool {
        self.status.is_some()
    }

    pub fn finalise(&mut self, status: u16) -> Result<(), ReceiptError> {
        if let Some(current) = self.status {
            return Err(ReceiptError::AlreadyFinalised(current));
        }
        self.status = Some(status);
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_data(&mut self, data: Vec<u8>) -> Result<(), ReceiptError> {
        if data.len() > MAX_RECEIPT_DATA {
            return Err(ReceiptError::DataTooLarge(data.len()));
        }
        self.data = data;
        Ok(())
    }

    pub fn ledger(&self) -> &LedgerEntries {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut LedgerEntries {
        &mut self.ledger
    }

    /// `hash256(tx_hash ‖ batches)`.
    pub fn ledger_entries_hash(&self) -> [u8; 32] {
        let batches = self.ledger.serialize();
        let mut buf = Vec::with_capacity(32 + batches.len());
        buf.extend_from_slice(&self.tx_hash);
        buf.extend_from_slice(&batches);
        hash256(&buf)
    }

    /// `hash256(tx_hash ‖ status ‖ data_len ‖ data ‖ ledger_entries_hash)`.
    pub fn receipt_hash(&self) -> Result<[u8; 32], ReceiptError> {
        let status = self.status.ok_or(ReceiptError::Pending)?;
        let mut w = Writer::with_capacity(32 + 2 + 1 + self.data.len() + 32);
        self.write_head(&mut w, status);
        w.put_bytes(&self.ledger_entries_hash());
        Ok(hash256(&w.finish()))
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ReceiptError> {
        let status = self.status.ok_or(ReceiptError::Pending)?;
        let mut w = Writer::new();
        self.write_head(&mut w, status);
        w.put_bytes(&self.ledger.serialize());
        Ok(w.finish())
    }

    fn write_head(&self, w: &mut Writer, status: u16) {
        w.put_bytes(&self.tx_hash);
        w.put_u16(status);
        // Bounded by set_data.
        w.put_u8(self.data.len() as u8);
        w.put_bytes(&self.data);
    }

    /// Decodes a serialized receipt that must belong to `tx`.
    pub fn decode(
        tx: &Transaction,
        bytes: &[u8],
        ledger_flags: &LedgerFlags,
    ) -> Result<Self, ReceiptError> {
        let mut r = Reader::new(bytes);
        let tx_hash: [u8; 32] = r.read_array()?;
        if &tx_hash != tx.hash() {
            return Err(ReceiptError::TxHashMismatch {
                expected: hex::encode(tx.hash()),
                found: hex::encode(tx_hash),
            });
        }
        let status = r.read_u16()?;
        let data_len = r.read_u8()? as usize;
        let data = r.read_bytes(data_len)?.to_vec();
        let ledger = LedgerEntries::read(&mut r, ledger_flags)?;
        r.ensure_exhausted()?;
        Ok(Self {
            tx_hash,
            status: Some(status),
            data,
            ledger,
        })
    }
}
