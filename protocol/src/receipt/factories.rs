//! Receipt factories for the built-in transaction kinds.
//!
//! Each factory turns an admitted transaction into a pending receipt whose
//! ledger entries describe the balance changes. Nothing is applied here.

use super::ledger::{LedgerEntry, LedgerFlags};
use super::tx_receipt::{ReceiptError, TxReceipt};
use crate::config::{
    LEDGER_FLAG_FORGE_REWARD, LEDGER_FLAG_REGISTER_CREDIT, LEDGER_FLAG_TRANSFER_CREDIT,
    LEDGER_FLAG_TRANSFER_DEBIT, LEDGER_FLAG_TX_FEE,
};
use crate::crypto::Hash160;
use crate::transaction::register::RegisterPayload;
use crate::transaction::Transaction;

fn sender(tx: &Transaction) -> Result<Hash160, ReceiptError> {
    tx.sender().copied().ok_or(ReceiptError::MissingParty("sender"))
}

fn recipient(tx: &Transaction) -> Result<Hash160, ReceiptError> {
    tx.recipient().copied().ok_or(ReceiptError::MissingParty("recipient"))
}

/// One batch crediting `account` with every transfer of `tx`.
fn credit_transfers(
    receipt: &mut TxReceipt,
    tx: &Transaction,
    account: Hash160,
    flag_id: u16,
    flags: &LedgerFlags,
) -> Result<(), ReceiptError> {
    if tx.transfers().is_empty() {
        return Ok(());
    }
    let flag = *flags.get(flag_id)?;
    let batch = tx
        .transfers()
        .iter()
        .map(|t| LedgerEntry::new(account, flag, t.amount, t.asset.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    receipt.ledger_mut().add_batch(batch)?;
    Ok(())
}

fn debit_fee(
    receipt: &mut TxReceipt,
    tx: &Transaction,
    flags: &LedgerFlags,
) -> Result<(), ReceiptError> {
    if tx.fee() == 0 {
        return Ok(());
    }
    let entry = LedgerEntry::new(sender(tx)?, *flags.get(LEDGER_FLAG_TX_FEE)?, tx.fee(), None)?;
    receipt.ledger_mut().add_batch(vec![entry])?;
    Ok(())
}

/// Per transfer, a batch debiting the sender and crediting the recipient,
/// then a fee batch when a fee is paid.
pub fn transfer_receipt(tx: &Transaction, flags: &LedgerFlags) -> Result<TxReceipt, ReceiptError> {
    let from = sender(tx)?;
    let to = recipient(tx)?;
    let debit = *flags.get(LEDGER_FLAG_TRANSFER_DEBIT)?;
    let credit = *flags.get(LEDGER_FLAG_TRANSFER_CREDIT)?;

    let mut receipt = TxReceipt::pending(tx);
    for transfer in tx.transfers().iter() {
        receipt.ledger_mut().add_batch(vec![
            LedgerEntry::new(from, debit, transfer.amount, transfer.asset.clone())?,
            LedgerEntry::new(to, credit, transfer.amount, transfer.asset.clone())?,
        ])?;
    }
    debit_fee(&mut receipt, tx, flags)?;
    Ok(receipt)
}

/// Credits the registered account with the allocation carried in the
/// transfers. The payload must decode and name the recipient.
pub fn register_receipt(tx: &Transaction, flags: &LedgerFlags) -> Result<TxReceipt, ReceiptError> {
    let to = recipient(tx)?;
    let data = tx.data().ok_or(ReceiptError::MissingParty("register payload"))?;
    let payload = RegisterPayload::decode(data).map_err(|e| ReceiptError::Payload(e.to_string()))?;
    if payload.account() != to {
        return Err(ReceiptError::Payload(format!(
            "payload registers {} but the recipient is {}",
            payload.account(),
            to
        )));
    }

    let mut receipt = TxReceipt::pending(tx);
    credit_transfers(&mut receipt, tx, to, LEDGER_FLAG_REGISTER_CREDIT, flags)?;
    if tx.sender().is_some() {
        debit_fee(&mut receipt, tx, flags)?;
    }
    Ok(receipt)
}

/// Credits the forger's reward to the recipient.
pub fn forge_receipt(tx: &Transaction, flags: &LedgerFlags) -> Result<TxReceipt, ReceiptError> {
    let to = recipient(tx)?;
    let mut receipt = TxReceipt::pending(tx);
    credit_transfers(&mut receipt, tx, to, LEDGER_FLAG_FORGE_REWARD, flags)?;
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TX_FLAG_FORGE, TX_FLAG_TRANSFER};
    use crate::crypto::PrivateKey;
    use crate::transaction::TransactionBuilder;

    fn transfer(fee: u64) -> Transaction {
        let key = PrivateKey::generate();
        let mut b = TransactionBuilder::new(TX_FLAG_TRANSFER);
        b.sender(key.public_key(), 1)
            .unwrap()
            .recipient_hash160(Hash160([2u8; 20]))
            .unwrap()
            .add_transfer(500, None)
            .unwrap()
            .add_transfer(7, Some("GOLD"))
            .unwrap()
            .fee(fee)
            .unwrap();
        b.seal().unwrap()
    }

    #[test]
    fn transfer_emits_balanced_batches() {
        let tx = transfer(0);
        let receipt = transfer_receipt(&tx, &LedgerFlags::standard()).unwrap();
        assert!(!receipt.is_finalised());
        assert_eq!(receipt.ledger().batch_count(), 2);
        assert_eq!(receipt.ledger().entry_count(), 4);
        assert_eq!(receipt.ledger().net_delta(None), 0);
        let gold = crate::transaction::types::AssetId::new("GOLD").unwrap();
        assert_eq!(receipt.ledger().net_delta(Some(&gold)), 0);

        let first = &receipt.ledger().batches()[0];
        assert_eq!(first[0].account, *tx.sender().unwrap());
        assert!(!first[0].flag.is_credit());
        assert_eq!(first[1].account, Hash160([2u8; 20]));
        assert!(first[1].flag.is_credit());
    }

    #[test]
    fn transfer_fee_gets_its_own_batch() {
        let tx = transfer(25);
        let receipt = transfer_receipt(&tx, &LedgerFlags::standard()).unwrap();
        assert_eq!(receipt.ledger().batch_count(), 3);
        let fee = &receipt.ledger().batches()[2];
        assert_eq!(fee.len(), 1);
        assert!(fee[0].flag.is_fee());
        assert_eq!(receipt.ledger().net_delta(None), -25);
    }

    #[test]
    fn transfer_requires_sender() {
        let mut b = TransactionBuilder::new(TX_FLAG_TRANSFER);
        b.recipient_hash160(Hash160([2u8; 20])).unwrap().add_transfer(1, None).unwrap();
        let tx = b.seal().unwrap();
        assert_eq!(
            transfer_receipt(&tx, &LedgerFlags::standard()),
            Err(ReceiptError::MissingParty("sender"))
        );
    }

    #[test]
    fn register_credits_new_account() {
        let key = PrivateKey::generate().public_key();
        let mut b = TransactionBuilder::register(&RegisterPayload::new(key)).unwrap();
        b.recipient(key).unwrap().add_transfer(1_000, None).unwrap();
        let tx = b.seal().unwrap();

        let receipt = register_receipt(&tx, &LedgerFlags::standard()).unwrap();
        assert_eq!(receipt.ledger().entry_count(), 1);
        let entry = receipt.ledger().entries().next().unwrap();
        assert_eq!(entry.account, key.hash160());
        assert_eq!(entry.amount, 1_000);
        assert_eq!(entry.flag.id(), LEDGER_FLAG_REGISTER_CREDIT);
    }

    #[test]
    fn register_rejects_mismatched_recipient() {
        let key = PrivateKey::generate().public_key();
        let mut b = TransactionBuilder::register(&RegisterPayload::new(key)).unwrap();
        b.recipient_hash160(Hash160([3u8; 20])).unwrap();
        let tx = b.seal().unwrap();
        assert!(matches!(
            register_receipt(&tx, &LedgerFlags::standard()),
            Err(ReceiptError::Payload(_))
        ));
    }

    #[test]
    fn forge_credits_reward() {
        let mut b = TransactionBuilder::new(TX_FLAG_FORGE);
        b.recipient_hash160(Hash160([4u8; 20])).unwrap().add_transfer(50, None).unwrap();
        let tx = b.seal().unwrap();
        let receipt = forge_receipt(&tx, &LedgerFlags::standard()).unwrap();
        assert_eq!(receipt.ledger().net_delta(None), 50);
        assert_eq!(
            receipt.ledger().entries().next().unwrap().flag.id(),
            LEDGER_FLAG_FORGE_REWARD
        );
    }
}
