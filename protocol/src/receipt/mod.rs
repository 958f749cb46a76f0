//! Receipts and the ledger entries they carry.
//!
//! ```text
//! receipt/
//! ├── ledger.rs      LedgerFlag(s), LedgerEntry, LedgerEntries (batches)
//! ├── tx_receipt.rs  TxReceipt: pending → finalised, hashing, wire format
//! └── factories.rs   Receipts for the built-in TRANSFER, REGISTER, FORGE kinds
//! ```

pub mod factories;
pub mod ledger;
pub mod tx_receipt;

pub use ledger::{LedgerEntries, LedgerEntry, LedgerError, LedgerFlag, LedgerFlags};
pub use tx_receipt::{ReceiptError, TxReceipt};
