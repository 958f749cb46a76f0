// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # KEEL Protocol: Core Library
//!
//! The consensus-critical core of a proof-of-stake ledger: how bytes become
//! transactions, how transactions become receipts, and how both become
//! blocks. Everything here is deterministic and synchronous. Networking,
//! storage and balances belong to whatever embeds this crate.
//!
//! secp256k1 for signatures (with recovery ids, so transactions carry no
//! public keys), double SHA-256 for every hash, and a fixed little-endian
//! wire format that both sides of every encoder share.
//!
//! ## Architecture
//!
//! - **codec**: Fixed-width little-endian integers, `Reader`/`Writer`.
//! - **crypto**: hash256/hash160, keys, recoverable signatures.
//! - **accounts**: Multisig thresholds and signature verification.
//! - **merkle**: Order-preserving merkle accumulator.
//! - **transaction**: Wire format, builder, flags, admission.
//! - **receipt**: Receipts and ledger entries.
//! - **block**: Block decoding and forging.
//! - **chain**: Per-chain context: config, registries, height rules.
//! - **config**: Protocol constants and `ChainConfig`.
//! - **validation**: Field validators shared by encoders and decoders.
//!
//! ## Pipeline
//!
//! ```text
//! TransactionBuilder ─seal→ Transaction ─admit→ CheckedTx ─append→ BlockForge ─seal→ Block
//!                                ↑                                                    │
//!                        Transaction::decode  ←──────────── Block::decode ←───────────┘
//! ```
//!
//! ## Design Philosophy
//!
//! 1. Decoders fail closed. Anything not understood is rejected.
//! 2. Builders and decoders share one validator per field, so a builder
//!    cannot produce bytes the decoder refuses.
//! 3. No globals. Chain context travels as an explicit [`chain::ProtocolChain`].

pub mod accounts;
pub mod block;
pub mod chain;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod merkle;
pub mod receipt;
pub mod transaction;
pub mod validation;

pub use chain::ProtocolChain;
pub use config::ChainConfig;
