//! End-to-end integration tests for the KEEL protocol.
//!
//! These tests run the whole pipeline the way an embedding node would:
//! build and sign a transaction, decode it from bytes, admit it against a
//! sender account, forge it into a block with a ledger that actually moves
//! balances, and decode the block back.
//!
//! Each test builds its own chain and ledger. No shared state.

use std::collections::HashMap;

use keel_protocol::accounts::Account;
use keel_protocol::block::{
    Block, BlockFieldError, BlockForge, ForgeError, ForgeHooks,
};
use keel_protocol::codec::CodecError;
use keel_protocol::config::{
    ChainConfig, RECEIPT_STATUS_SUCCESS, TX_FLAG_FORGE, TX_FLAG_REGISTER, TX_FLAG_TRANSFER,
};
use keel_protocol::crypto::{hash256, Hash160, PrivateKey};
use keel_protocol::transaction::{
    CheckTxError, CheckedTx, RegisterPayload, Transaction, TransactionBuilder,
};
use keel_protocol::ProtocolChain;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const EPOCH: u64 = 1_700_000_000;

/// Native balances keyed by account, applied when receipts are finalised.
#[derive(Default)]
struct Ledger {
    balances: HashMap<Hash160, i128>,
}

impl ForgeHooks for Ledger {
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
            for entry in receipt.ledger().entries().filter(|e| e.asset.is_none()) {
                *self.balances.entry(entry.account).or_default() += entry.delta();
            }
            receipt.ledger_mut().mark_applied();
            receipt.finalise(RECEIPT_STATUS_SUCCESS)?;
        }
        Ok(())
    }
}

fn chain() -> ProtocolChain {
    ProtocolChain::standard(ChainConfig::devnet())
}

fn signed_transfer(chain: &ProtocolChain, from: &PrivateKey, to: Hash160, amount: u64, nonce: u32) -> Vec<u8> {
    let mut b = TransactionBuilder::new(TX_FLAG_TRANSFER);
    b.sender(from.public_key(), nonce)
        .unwrap()
        .recipient_hash160(to)
        .unwrap()
        .add_transfer(amount, None)
        .unwrap()
        .memo("e2e")
        .unwrap()
        .timestamp(EPOCH)
        .unwrap()
        .sign(from, chain.chain_id())
        .unwrap();
    b.serialize(true).unwrap()
}

// ---------------------------------------------------------------------------
// Transfer scenario
// ---------------------------------------------------------------------------

#[test]
fn transfer_of_500_at_height_10() {
    let chain = chain();
    let alice = PrivateKey::generate();
    let bob = PrivateKey::generate().public_key().hash160();
    let account = Account::single(alice.public_key());

    let bytes = signed_transfer(&chain, &alice, bob, 500, 1);
    let tx = Transaction::decode(&bytes).unwrap();
    assert_eq!(tx.hash(), &hash256(&bytes));

    let checked = CheckedTx::admit(&chain, Some(&account), tx, 10).unwrap();
    let audit = checked.audit().unwrap();
    assert_eq!((audit.required, audit.verified), (1, 1));

    let receipt = checked.receipt();
    assert!(!receipt.is_finalised());
    assert_eq!(receipt.ledger().entry_count(), 2);
    assert_eq!(receipt.ledger().net_delta(None), 0);
    let entries: Vec<_> = receipt.ledger().entries().collect();
    assert_eq!(entries[0].account, alice.public_key().hash160());
    assert_eq!(entries[0].delta(), -500);
    assert_eq!(entries[1].account, bob);
    assert_eq!(entries[1].delta(), 500);
}

#[test]
fn receipt_hash_changes_with_status_or_tx_bytes() {
    let chain = chain();
    let alice = PrivateKey::generate();
    let account = Account::single(alice.public_key());
    let bob = Hash160([0xb0; 20]);

    let admit = |amount: u64| {
        let bytes = signed_transfer(&chain, &alice, bob, amount, 1);
        CheckedTx::admit(&chain, Some(&account), Transaction::decode(&bytes).unwrap(), 10).unwrap()
    };

    let mut ok = admit(500);
    let mut failed = admit(500);
    ok.receipt_mut().finalise(RECEIPT_STATUS_SUCCESS).unwrap();
    failed.receipt_mut().finalise(0x02).unwrap();
    assert_ne!(
        ok.receipt().receipt_hash().unwrap(),
        failed.receipt().receipt_hash().unwrap()
    );

    let mut other = admit(501);
    other.receipt_mut().finalise(RECEIPT_STATUS_SUCCESS).unwrap();
    assert_ne!(
        ok.receipt().receipt_hash().unwrap(),
        other.receipt().receipt_hash().unwrap()
    );
}

#[test]
fn tampered_transaction_fails_admission() {
    let chain = chain();
    let alice = PrivateKey::generate();
    let account = Account::single(alice.public_key());
    let mut bytes = signed_transfer(&chain, &alice, Hash160([1; 20]), 500, 1);

    // Bump the low byte of the transfer amount, after the memo.
    let amount_at = 1 + 2 + 21 + 4 + 21 + 1 + 3 + 1;
    assert_eq!(bytes[amount_at..amount_at + 8], 500u64.to_le_bytes());
    bytes[amount_at] ^= 0x01;

    let tx = Transaction::decode(&bytes).unwrap();
    assert!(matches!(
        CheckedTx::admit(&chain, Some(&account), tx, 10),
        Err(CheckTxError::InsufficientSignatures { verified: 0, .. })
    ));
}

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

#[test]
fn genesis_register_is_exempt_from_signatures() {
    let chain = chain();
    let founder = PrivateKey::generate().public_key();
    let mut b = TransactionBuilder::register(&RegisterPayload::new(founder)).unwrap();
    b.recipient(founder).unwrap().add_transfer(1_000_000, None).unwrap();
    let tx = Transaction::decode(&b.serialize(true).unwrap()).unwrap();
    assert!(tx.signatures().is_empty());

    let checked = CheckedTx::admit(&chain, None, tx.clone(), 0).unwrap();
    assert_eq!(checked.receipt().ledger().net_delta(None), 1_000_000);

    // Outside genesis the same transaction needs a signed sender.
    assert_eq!(
        CheckedTx::admit(&chain, None, tx, 1).unwrap_err(),
        CheckTxError::MissingSenderAccount
    );
}

#[test]
fn genesis_rejects_other_flags() {
    let chain = chain();
    let tx = TransactionBuilder::new(TX_FLAG_FORGE).seal().unwrap();
    assert_eq!(
        CheckedTx::admit(&chain, None, tx, 0).unwrap_err(),
        CheckTxError::NotGenesisFlag {
            flag: TX_FLAG_FORGE,
            expected: TX_FLAG_REGISTER
        }
    );
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

#[test]
fn genesis_then_transfer_blocks_move_balances() {
    let chain = chain();
    let forger = PrivateKey::generate();
    let alice = PrivateKey::generate();
    let bob = PrivateKey::generate().public_key().hash160();
    let alice_id = alice.public_key().hash160();

    // Height 0: register alice with an allocation.
    let mut b = TransactionBuilder::register(&RegisterPayload::new(alice.public_key())).unwrap();
    b.recipient(alice.public_key())
        .unwrap()
        .add_transfer(10_000, None)
        .unwrap()
        .timestamp(EPOCH)
        .unwrap();
    let genesis_tx = CheckedTx::admit(&chain, None, b.seal().unwrap(), 0).unwrap();

    let mut ledger = Ledger::default();
    let mut forge = BlockForge::new(&chain, 0, &[0u8; 32], 1, EPOCH, &mut ledger).unwrap();
    forge.append_tx(genesis_tx).unwrap();
    forge.forger(forger.public_key());
    forge.sign(&forger).unwrap();
    let genesis = forge.seal().unwrap();
    drop(forge);
    assert_eq!(ledger.balances[&alice_id], 10_000);

    // Height 1: alice pays bob.
    let account = Account::single(alice.public_key());
    let bytes = signed_transfer(&chain, &alice, bob, 500, 1);
    let checked = CheckedTx::admit(&chain, Some(&account), Transaction::decode(&bytes).unwrap(), 1).unwrap();

    let mut forge = BlockForge::new(&chain, 1, genesis.hash(), 1, EPOCH + 10, &mut ledger).unwrap();
    forge.append_tx(checked).unwrap();
    forge.forger(forger.public_key());
    forge.sign(&forger).unwrap();
    let block = forge.seal().unwrap();
    drop(forge);

    assert_eq!(ledger.balances[&alice_id], 9_500);
    assert_eq!(ledger.balances[&bob], 500);
    assert_eq!(block.prev_hash(), genesis.hash());
    assert_eq!(block.header().total_in, 500);
    assert_eq!(block.header().total_out, 500);

    let decoded = Block::decode(&chain, block.raw(), 1).unwrap();
    assert_eq!(decoded.hash(), block.hash());
    assert_eq!(decoded.serialize(true), block.raw());
    assert_eq!(decoded.txs().get(0).unwrap().raw(), &bytes[..]);
}

#[test]
fn block_decode_rejects_merkle_root_without_transactions() {
    let chain = chain();
    let forger = PrivateKey::generate();
    let mut ledger = Ledger::default();
    let mut forge = BlockForge::new(&chain, 5, &[9u8; 32], 1, EPOCH, &mut ledger).unwrap();
    forge.forger(forger.public_key());
    let mut bytes = forge.serialize(true).unwrap();

    // tx count is 0, so both roots must be zero. The header ends with
    // merkle tx (32), merkle receipts (32), body size (4), separator (1).
    let merkle_tx_at = bytes.len() - 1 - 4 - 32 - 32;
    bytes[merkle_tx_at] = 0x01;
    let err = Block::decode(&chain, &bytes, 5).unwrap_err();
    assert_eq!(
        err.reason(),
        Some(&BlockFieldError::NonZeroMerkleRoot("transactions"))
    );
}

#[test]
fn block_decode_rejects_trailing_bytes() {
    let chain = chain();
    let forger = PrivateKey::generate();
    let mut ledger = Ledger::default();
    let mut forge = BlockForge::new(&chain, 5, &[9u8; 32], 1, EPOCH, &mut ledger).unwrap();
    forge.forger(forger.public_key());
    let mut bytes = forge.serialize(true).unwrap();
    assert!(Block::decode(&chain, &bytes, 5).is_ok());

    bytes.extend_from_slice(&[0, 0]);
    assert!(matches!(
        Block::decode(&chain, &bytes, 5).unwrap_err().reason(),
        Some(BlockFieldError::Codec(CodecError::ExcessBytes { remaining: 2 }))
    ));
}

#[test]
fn block_signature_binds_chain_and_fork() {
    let chain = chain();
    let other = ProtocolChain::standard(ChainConfig::new([0x77; 32]));
    let forger = PrivateKey::generate();
    let mut ledger = Ledger::default();
    let mut forge = BlockForge::new(&chain, 3, &[1u8; 32], 1, EPOCH, &mut ledger).unwrap();
    forge.forger(forger.public_key());
    forge.sign(&forger).unwrap();
    let block = forge.seal().unwrap();

    let signature = block.signatures()[0];
    let recover = |chain_id: &[u8; 32]| {
        let digest = block.hash_pre_image(chain_id, 0);
        keel_protocol::crypto::recover_public_key(&signature, &digest, signature.v()).ok()
    };
    assert_eq!(recover(chain.chain_id()), Some(forger.public_key()));
    assert_ne!(recover(other.chain_id()), Some(forger.public_key()));
}
