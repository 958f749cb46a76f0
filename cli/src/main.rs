// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # KEEL Inspection Tool
//!
//! Entry point for the `keel` binary. Parses CLI arguments, initializes
//! logging, loads the chain configuration and runs one subcommand:
//!
//! - `keygen`        generate or derive a secp256k1 keypair
//! - `hash`          hash256 and hash160 of a payload
//! - `decode-tx`     decode a signed transaction
//! - `decode-block`  decode and verify a block at a height
//! - `version`       print build version information
//!
//! Results are printed to stdout as JSON. Logs go to stderr.

mod cli;
mod logging;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};

use keel_protocol::block::Block;
use keel_protocol::crypto::{hash160, hash256, PrivateKey};
use keel_protocol::receipt::TxReceipt;
use keel_protocol::transaction::Transaction;
use keel_protocol::{ChainConfig, ProtocolChain};

use cli::{Commands, KeelCli};
use logging::LogFormat;

fn main() -> Result<()> {
    let cli = KeelCli::parse();
    logging::init_logging(&cli.log_level, LogFormat::from_str_lossy(&cli.log_format));

    let output = match cli.command {
        Commands::Version => {
            print_version();
            return Ok(());
        }
        Commands::Keygen(args) => keygen(args.secret.as_deref())?,
        Commands::Hash(args) => hash(&args.hex)?,
        Commands::DecodeTx(args) => {
            let chain = load_chain(cli.config.as_deref())?;
            decode_tx(&chain, &args.hex)?
        }
        Commands::DecodeBlock(args) => {
            let chain = load_chain(cli.config.as_deref())?;
            decode_block(&chain, &args.hex, args.height)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Loads the chain configuration from `path`, or falls back to devnet.
fn load_chain(path: Option<&Path>) -> Result<ProtocolChain> {
    let config = match path {
        Some(path) => ChainConfig::load(path)
            .with_context(|| format!("failed to load chain config from {}", path.display()))?,
        None => {
            tracing::debug!("no chain config given, using devnet");
            ChainConfig::devnet()
        }
    };
    config.validate().context("invalid chain config")?;
    tracing::info!(chain_id = %hex::encode(config.chain_id), fork_id = config.fork_id, "chain loaded");
    Ok(ProtocolChain::standard(config))
}

fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits).context("input is not valid hex")
}

fn keygen(secret: Option<&str>) -> Result<Value> {
    let key = match secret {
        Some(secret) => PrivateKey::from_hex(secret).context("invalid secret key")?,
        None => PrivateKey::generate(),
    };
    let public = key.public_key();

    Ok(json!({
        "secret_key": hex::encode(key.to_bytes()),
        "public_key": public.to_hex(),
        "account": public.hash160().to_hex(),
    }))
}

fn hash(input: &str) -> Result<Value> {
    let bytes = parse_hex(input)?;
    Ok(json!({
        "len": bytes.len(),
        "hash256": hex::encode(hash256(&bytes)),
        "hash160": hash160(&bytes).to_hex(),
    }))
}

fn decode_tx(chain: &ProtocolChain, input: &str) -> Result<Value> {
    let bytes = parse_hex(input)?;
    let tx = Transaction::decode(&bytes).context("failed to decode transaction")?;
    tracing::debug!(hash = %hex::encode(tx.hash()), "transaction decoded");
    Ok(tx_json(chain, &tx))
}

fn decode_block(chain: &ProtocolChain, input: &str, height: u64) -> Result<Value> {
    let bytes = parse_hex(input)?;
    let block = Block::decode(chain, &bytes, height)
        .with_context(|| format!("failed to decode block at height {}", height))?;
    let header = block.header();

    let txs: Vec<Value> = block
        .txs()
        .iter()
        .zip(block.receipts().iter())
        .map(|(tx, receipt)| {
            let mut value = tx_json(chain, tx);
            value["receipt"] = receipt_json(receipt);
            value
        })
        .collect();

    Ok(json!({
        "hash": hex::encode(block.hash()),
        "height": height,
        "version": header.version,
        "timestamp": header.timestamp,
        "prev_hash": hex::encode(header.prev_hash),
        "forger": header.forger.to_hex(),
        "reward": header.reward,
        "total_in": header.total_in,
        "total_out": header.total_out,
        "total_fee": header.total_fee,
        "merkle_tx": hex::encode(header.merkle_tx),
        "merkle_receipts": hex::encode(header.merkle_receipts),
        "body_size": header.body_size,
        "signatures": header.signatures.iter().map(|s| hex::encode(s.to_bytes())).collect::<Vec<_>>(),
        "transactions": txs,
    }))
}

fn tx_json(chain: &ProtocolChain, tx: &Transaction) -> Value {
    let flag_name = chain.tx_flags().get(tx.flag()).map(|f| f.name().to_string()).ok();
    json!({
        "hash": hex::encode(tx.hash()),
        "version": tx.version(),
        "flag": tx.flag(),
        "flag_name": flag_name,
        "sender": tx.sender().map(|h| h.to_hex()),
        "nonce": tx.nonce(),
        "recipient": tx.recipient().map(|h| h.to_hex()),
        "memo": tx.memo(),
        "transfers": tx
            .transfers()
            .iter()
            .map(|t| json!({
                "asset": t.asset.as_ref().map(|a| a.as_str()),
                "amount": t.amount,
                "display": t.display_decimal(),
            }))
            .collect::<Vec<_>>(),
        "data": tx.data().map(hex::encode),
        "fee": tx.fee(),
        "timestamp": tx.timestamp(),
        "signatures": tx.signatures().iter().map(|s| hex::encode(s.to_bytes())).collect::<Vec<_>>(),
    })
}

fn receipt_json(receipt: &TxReceipt) -> Value {
    let ledger: Vec<Value> = receipt
        .ledger()
        .entries()
        .map(|e| {
            json!({
                "account": e.account.to_hex(),
                "flag": e.flag,
                "amount": e.amount,
                "asset": e.asset.as_ref().map(|a| a.as_str()),
                "applied": e.applied,
            })
        })
        .collect();

    json!({
        "status": receipt.status(),
        "data": hex::encode(receipt.data()),
        "ledger_batches": receipt.ledger().batch_count(),
        "ledger": ledger,
    })
}

/// Prints version information to stdout.
fn print_version() {
    println!("keel     {}", env!("CARGO_PKG_VERSION"));
    println!("protocol {}", keel_protocol::config::PROTOCOL_VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_protocol::config::TX_FLAG_TRANSFER;
    use keel_protocol::crypto::Hash160;
    use keel_protocol::transaction::TransactionBuilder;
    use std::io::Write;

    #[test]
    fn keygen_from_secret_is_deterministic() {
        let secret = "01".repeat(32);
        let a = keygen(Some(&secret)).unwrap();
        let b = keygen(Some(&secret)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a["secret_key"], secret);
        assert_eq!(a["public_key"].as_str().unwrap().len(), 66);
        assert_eq!(a["account"].as_str().unwrap().len(), 40);
    }

    #[test]
    fn keygen_rejects_bad_secret() {
        assert!(keygen(Some("zz")).is_err());
        assert!(keygen(Some("00")).is_err());
    }

    #[test]
    fn hash_accepts_0x_prefix() {
        let plain = hash("deadbeef").unwrap();
        let prefixed = hash("0xdeadbeef").unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(plain["len"], 4);
        assert!(hash("xyz").is_err());
    }

    #[test]
    fn decode_tx_reports_fields() {
        let chain = ProtocolChain::standard(ChainConfig::devnet());
        let key = PrivateKey::generate();
        let mut b = TransactionBuilder::new(TX_FLAG_TRANSFER);
        b.sender(key.public_key(), 3)
            .unwrap()
            .recipient_hash160(Hash160([4; 20]))
            .unwrap()
            .add_transfer(250, None)
            .unwrap()
            .sign(&key, chain.chain_id())
            .unwrap();
        let bytes = b.serialize(true).unwrap();

        let value = decode_tx(&chain, &hex::encode(&bytes)).unwrap();
        assert_eq!(value["flag"], TX_FLAG_TRANSFER);
        assert_eq!(value["flag_name"], "TRANSFER");
        assert_eq!(value["nonce"], 3);
        assert_eq!(value["sender"], key.public_key().hash160().to_hex());
        assert_eq!(value["transfers"][0]["amount"], 250);
        assert_eq!(value["signatures"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn decode_block_rejects_garbage() {
        let chain = ProtocolChain::standard(ChainConfig::devnet());
        assert!(decode_block(&chain, "0102", 1).is_err());
    }

    #[test]
    fn load_chain_from_file() {
        let config = ChainConfig::new([0x42; 32]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_json().unwrap().as_bytes()).unwrap();

        let chain = load_chain(Some(file.path())).unwrap();
        assert_eq!(chain.chain_id(), &[0x42; 32]);
        assert!(load_chain(Some(Path::new("/nonexistent/keel.json"))).is_err());
        assert_eq!(load_chain(None).unwrap().config(), &ChainConfig::devnet());
    }
}
