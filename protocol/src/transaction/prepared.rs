//! Decoded, immutable transactions.

use super::types::Transfers;
use super::wire::{TxDecodeError, TxFields};
use crate::crypto::{hash256, Hash160, Signature};
use crate::merkle::MerkleLeaf;

/// A structurally valid transaction.
///
/// The only ways to get one are [`Transaction::decode`] and
/// [`super::TransactionBuilder::seal`], so every `Transaction` in memory
/// passed the full decoder. `raw` holds the exact bytes it was decoded from
/// and `hash` is `hash256(raw)`, the transaction's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    fields: TxFields,
    raw: Vec<u8>,
    unsigned: Vec<u8>,
    hash: [u8; 32],
}

impl Transaction {
    /// Decodes transaction bytes, failing closed on any violation.
    pub fn decode(bytes: &[u8]) -> Result<Self, TxDecodeError> {
        let fields = TxFields::decode(bytes)?;
        let unsigned = match fields.encode(false) {
            Ok(unsigned) => unsigned,
            Err(reason) => {
                return Err(TxDecodeError::Incomplete {
                    reason,
                    partial: Box::new(fields),
                })
            }
        };
        Ok(Self {
            fields,
            raw: bytes.to_vec(),
            unsigned,
            hash: hash256(bytes),
        })
    }

    /// `hash256(chain_id ‖ serialize(false))`, the digest every signer signs.
    ///
    /// Genesis transactions are signed against the all-zero chain id; see
    /// [`crate::chain::ProtocolChain::tx_pre_image`].
    pub fn hash_pre_image(&self, chain_id: &[u8; 32]) -> [u8; 32] {
        pre_image(chain_id, &self.unsigned)
    }

    /// Re-encodes the transaction. With signatures this is exactly `raw`.
    pub fn serialize(&self, include_signatures: bool) -> Vec<u8> {
        if include_signatures {
            self.raw.clone()
        } else {
            self.unsigned.clone()
        }
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn fields(&self) -> &TxFields {
        &self.fields
    }

    pub fn version(&self) -> u8 {
        self.fields.version
    }

    pub fn flag(&self) -> u16 {
        self.fields.flag
    }

    pub fn sender(&self) -> Option<&Hash160> {
        self.fields.sender.as_ref()
    }

    pub fn nonce(&self) -> u32 {
        self.fields.nonce
    }

    pub fn recipient(&self) -> Option<&Hash160> {
        self.fields.recipient.as_ref()
    }

    pub fn memo(&self) -> Option<&str> {
        self.fields.memo.as_deref()
    }

    pub fn transfers(&self) -> &Transfers {
        &self.fields.transfers
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.fields.data.as_deref()
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.fields.signatures
    }

    pub fn fee(&self) -> u64 {
        self.fields.fee
    }

    pub fn timestamp(&self) -> u32 {
        self.fields.timestamp
    }
}

impl MerkleLeaf for Transaction {
    fn leaf_hash(&self) -> [u8; 32] {
        self.hash
    }
}

pub(crate) fn pre_image(chain_id: &[u8; 32], unsigned: &[u8]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(32 + unsigned.len());
    buf.extend_from_slice(chain_id);
    buf.extend_from_slice(unsigned);
    hash256(&buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::types::AssetId;

    fn encoded() -> Vec<u8> {
        let mut transfers = Transfers::new();
        transfers.set(Some(AssetId::new("KEEL").unwrap()), 42).unwrap();
        TxFields {
            flag: 0xc8,
            sender: Some(Hash160([3u8; 20])),
            nonce: 1,
            recipient: Some(Hash160([4u8; 20])),
            transfers,
            signatures: vec![Signature::new([1u8; 32], [2u8; 32], 0)],
            timestamp: 1_650_000_000,
            ..TxFields::default()
        }
        .encode(true)
        .unwrap()
    }

    #[test]
    fn hash_is_hash256_of_raw() {
        let bytes = encoded();
        let tx = Transaction::decode(&bytes).unwrap();
        assert_eq!(tx.hash(), &hash256(&bytes));
        assert_eq!(tx.raw(), &bytes[..]);
        assert_eq!(tx.serialize(true), bytes);
    }

    #[test]
    fn pre_image_excludes_signatures_and_binds_chain() {
        let tx = Transaction::decode(&encoded()).unwrap();
        let unsigned = tx.serialize(false);
        assert_eq!(unsigned.len(), tx.raw().len() - 65);

        let chain_a = [0xaa; 32];
        let mut expected = chain_a.to_vec();
        expected.extend_from_slice(&unsigned);
        assert_eq!(tx.hash_pre_image(&chain_a), hash256(&expected));
        assert_ne!(tx.hash_pre_image(&chain_a), tx.hash_pre_image(&[0u8; 32]));
    }

    #[test]
    fn accessors_expose_decoded_fields() {
        let tx = Transaction::decode(&encoded()).unwrap();
        assert_eq!(tx.flag(), 0xc8);
        assert_eq!(tx.nonce(), 1);
        assert_eq!(tx.sender(), Some(&Hash160([3u8; 20])));
        assert_eq!(tx.recipient(), Some(&Hash160([4u8; 20])));
        assert_eq!(tx.transfers().len(), 1);
        assert_eq!(tx.signatures().len(), 1);
        assert_eq!(tx.memo(), None);
        assert_eq!(tx.data(), None);
        assert_eq!(tx.leaf_hash(), *tx.hash());
    }
}
