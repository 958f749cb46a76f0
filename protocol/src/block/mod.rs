//! # Block Module
//!
//! Blocks commit to an ordered list of (transaction, receipt) pairs through
//! two merkle roots.
//!
//! ```text
//! header.rs    BlockHeader, the shared encoder, the signing pre-image
//! decoded.rs   Block::decode: every field validated, roots recomputed
//! forge.rs     BlockForge: append checked txs, finalise, sign, seal
//! ```
//!
//! A block hash is `hash256` of its exact bytes. Forgers sign
//! `hash256(fork_id ‖ chain_id ‖ unsigned block)`, where the unsigned block
//! carries a zero signature count.

pub mod decoded;
pub mod forge;
pub mod header;

pub use decoded::{Block, BlockDecodeError, BlockFieldError};
pub use forge::{ApplyAllHooks, BlockForge, ForgeError, ForgeHooks};
pub use header::{BlockEncodeError, BlockHeader};
