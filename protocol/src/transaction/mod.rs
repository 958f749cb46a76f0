//! # Transaction Module
//!
//! Encoding, construction, signing and admission of KEEL transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs       AssetId, Transfer, Transfers
//! wire.rs        TxFields: the shared encoder and the fail-fast decoder
//! prepared.rs    Transaction: immutable, decoded, hashed
//! builder.rs     TransactionBuilder: validating setters, sign, seal
//! register.rs    REGISTER payload (account keys)
//! flags.rs       TxFlag / TxFlags registry, TxKind dispatch
//! admission.rs   CheckedTx::admit: signatures, flag gates, pending receipt
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: assemble fields with [`TransactionBuilder`].
//! 2. **Sign**: [`TransactionBuilder::sign`] signs
//!    `hash256(chain_id ‖ unsigned bytes)` and appends the signature.
//! 3. **Seal**: [`TransactionBuilder::seal`] encodes and decodes into an
//!    immutable [`Transaction`]. Bytes from the network take the same path
//!    through [`Transaction::decode`].
//! 4. **Admit**: [`CheckedTx::admit`] verifies signatures against the sender
//!    account and produces a pending receipt.
//! 5. **Forge**: checked transactions go into a
//!    [`crate::block::BlockForge`].
//!
//! ## Design Decisions
//!
//! - A transaction's id is `hash256` of its exact wire bytes, signatures
//!   included. Signatures cover the bytes without signatures.
//! - All amounts are `u64` base units capped at `MAX_AMOUNT`. No floating
//!   point anywhere near monetary values.
//! - Decoding fails on the first violation and returns the fields decoded
//!   so far, so callers can report what they did understand.

pub mod admission;
pub mod builder;
pub mod flags;
pub mod prepared;
pub mod register;
pub mod types;
pub mod wire;

pub use admission::{CheckTxError, CheckedTx, SignatureAudit};
pub use builder::{TransactionBuilder, TxConstructError};
pub use flags::{FlagRegistryError, TxFlag, TxFlags, TxHandler, TxKind, UnknownTxFlag};
pub use prepared::Transaction;
pub use register::{RegisterPayload, RegisterPayloadError};
pub use types::{AssetId, Transfer, TransferError, Transfers};
pub use wire::{TxDecodeError, TxFieldError, TxFields};

/// Encoding failures share the field error type with decoding.
pub type TxEncodeError = TxFieldError;
