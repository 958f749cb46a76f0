//! Order-preserving merkle accumulator.
//!
//! Despite the name this is not a binary tree. The root is
//!
//! ```text
//! hash256(leaf_hash[0] ‖ leaf_hash[1] ‖ … ‖ leaf_hash[n-1])
//! ```
//!
//! over the leaves in insertion order, or 32 zero bytes when empty. One hash
//! pass commits to both content and order; nobody needs inclusion proofs at
//! this layer.
//!
//! Leaves are keyed by their own hash. Appending a leaf whose hash is already
//! present is rejected: a block must not contain the same transaction twice,
//! and silently overwriting the slot would leave `len()` disagreeing with the
//! number of distinct leaves.

use std::collections::HashMap;

use thiserror::Error;

use crate::crypto::hash256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("leaf {} is already present at index {}", hex::encode(.hash), .index)]
    DuplicateLeaf { hash: [u8; 32], index: usize },
}

/// Anything that can name itself with a 32-byte content hash.
pub trait MerkleLeaf {
    fn leaf_hash(&self) -> [u8; 32];
}

/// Insertion-ordered map of leaves keyed by content hash.
#[derive(Debug, Clone)]
pub struct MerkleMap<T> {
    leaves: Vec<([u8; 32], T)>,
    index: HashMap<[u8; 32], usize>,
}

impl<T> Default for MerkleMap<T> {
    fn default() -> Self {
        Self {
            leaves: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> MerkleMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `leaf` under an externally computed hash. Returns its index.
    pub fn append_with_hash(&mut self, hash: [u8; 32], leaf: T) -> Result<usize, MerkleError> {
        if let Some(&index) = self.index.get(&hash) {
            return Err(MerkleError::DuplicateLeaf { hash, index });
        }
        let index = self.leaves.len();
        self.leaves.push((hash, leaf));
        self.index.insert(hash, index);
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.leaves.get(index).map(|(_, leaf)| leaf)
    }

    pub fn get_by_hash(&self, hash: &[u8; 32]) -> Option<&T> {
        self.index.get(hash).and_then(|&i| self.get(i))
    }

    pub fn contains(&self, hash: &[u8; 32]) -> bool {
        self.index.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaves in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.leaves.iter().map(|(_, leaf)| leaf)
    }

    /// Leaf hashes in insertion order.
    pub fn hashes(&self) -> impl Iterator<Item = &[u8; 32]> {
        self.leaves.iter().map(|(hash, _)| hash)
    }

    pub fn merkle_root(&self) -> [u8; 32] {
        if self.leaves.is_empty() {
            return [0u8; 32];
        }
        let mut concat = Vec::with_capacity(self.leaves.len() * 32);
        for (hash, _) in &self.leaves {
            concat.extend_from_slice(hash);
        }
        hash256(&concat)
    }

    pub fn into_leaves(self) -> Vec<T> {
        self.leaves.into_iter().map(|(_, leaf)| leaf).collect()
    }
}

impl<T: MerkleLeaf> MerkleMap<T> {
    /// Appends `leaf`, keyed by its own hash. Returns its index.
    pub fn append(&mut self, leaf: T) -> Result<usize, MerkleError> {
        let hash = leaf.leaf_hash();
        self.append_with_hash(hash, leaf)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Blob(&'static [u8]);

    impl MerkleLeaf for Blob {
        fn leaf_hash(&self) -> [u8; 32] {
            hash256(self.0)
        }
    }

    #[test]
    fn empty_root_is_zero() {
        let map: MerkleMap<Blob> = MerkleMap::new();
        assert_eq!(map.merkle_root(), [0u8; 32]);
        assert!(map.is_empty());
    }

    #[test]
    fn single_leaf_root_is_hash_of_leaf_hash() {
        let mut map = MerkleMap::new();
        map.append(Blob(b"tx")).unwrap();
        assert_eq!(map.merkle_root(), hash256(&hash256(b"tx")));
    }

    #[test]
    fn root_commits_to_order() {
        let mut ab = MerkleMap::new();
        ab.append(Blob(b"a")).unwrap();
        ab.append(Blob(b"b")).unwrap();

        let mut ba = MerkleMap::new();
        ba.append(Blob(b"b")).unwrap();
        ba.append(Blob(b"a")).unwrap();

        assert_ne!(ab.merkle_root(), ba.merkle_root());

        let mut concat = hash256(b"a").to_vec();
        concat.extend_from_slice(&hash256(b"b"));
        assert_eq!(ab.merkle_root(), hash256(&concat));
    }

    #[test]
    fn duplicate_leaf_is_rejected_and_not_counted() {
        let mut map = MerkleMap::new();
        assert_eq!(map.append(Blob(b"same")).unwrap(), 0);
        let err = map.append(Blob(b"same")).unwrap_err();
        assert_eq!(
            err,
            MerkleError::DuplicateLeaf {
                hash: hash256(b"same"),
                index: 0
            }
        );
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn lookup_by_index_and_hash() {
        let mut map = MerkleMap::new();
        map.append(Blob(b"first")).unwrap();
        map.append(Blob(b"second")).unwrap();
        assert_eq!(map.get(1).map(|b| b.0), Some(&b"second"[..]));
        assert_eq!(
            map.get_by_hash(&hash256(b"first")).map(|b| b.0),
            Some(&b"first"[..])
        );
        assert!(map.get(2).is_none());
        assert_eq!(map.iter().count(), 2);
        assert!(map.contains(&hash256(b"second")));
    }
}
