//! # CLI Interface
//!
//! Command-line structure for `keel` using `clap` derive. Every subcommand
//! is offline: it reads hex from the command line and prints JSON.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// KEEL protocol inspection tool.
///
/// Generates keys, hashes payloads and decodes raw transactions and blocks
/// against a chain configuration.
#[derive(Parser, Debug)]
#[command(
    name = "keel",
    about = "KEEL protocol inspection tool",
    version,
    propagate_version = true
)]
pub struct KeelCli {
    /// Path to a chain configuration file (JSON).
    ///
    /// When omitted, a devnet configuration is used.
    #[arg(long, short = 'c', global = true, env = "KEEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "KEEL_LOG", default_value = crate::logging::DEFAULT_FILTER)]
    pub log_level: String,

    /// Log format: "pretty" or "json".
    #[arg(long, global = true, default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `keel` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a secp256k1 keypair, or derive one from an existing secret.
    Keygen(KeygenArgs),
    /// Print the hash256 and hash160 of a hex payload.
    Hash(HexArgs),
    /// Decode a signed transaction.
    DecodeTx(HexArgs),
    /// Decode a block at the given height.
    DecodeBlock(DecodeBlockArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `keygen` subcommand.
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Hex-encoded 32-byte private key to derive from instead of generating.
    #[arg(long)]
    pub secret: Option<String>,
}

/// A single hex-encoded payload.
#[derive(Parser, Debug)]
pub struct HexArgs {
    /// Hex-encoded bytes, with or without a `0x` prefix.
    pub hex: String,
}

/// Arguments for the `decode-block` subcommand.
#[derive(Parser, Debug)]
pub struct DecodeBlockArgs {
    /// Hex-encoded block bytes.
    pub hex: String,

    /// Height the block was forged at. Selects the fork id and enabled flags.
    #[arg(long)]
    pub height: u64,
}
