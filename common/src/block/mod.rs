use serde::{Deserialize, Serialize};

use crate::crypto::{Hash, Hashable};
use crate::transaction::Transaction;

/// Height of the genesis block. Heights are contiguous from here.
pub const GENESIS_HEIGHT: u64 = 1;

/// Committed block as returned by a node.
///
/// Rejected transactions are not stored, only their hashes so that a
/// client can tell a rejection from a transaction that never arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub prev_hash: Hash,
    pub created_time: u64,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub rejected_hashes: Vec<Hash>,
}

impl Hashable for Block {}

impl Block {
    pub fn genesis(created_time: u64) -> Self {
        Self {
            height: GENESIS_HEIGHT,
            prev_hash: Hash::zero(),
            created_time,
            transactions: Vec::new(),
            rejected_hashes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.rejected_hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_links_to_zero() {
        let genesis = Block::genesis(0);
        assert_eq!(genesis.height, GENESIS_HEIGHT);
        assert_eq!(genesis.prev_hash, Hash::zero());
        assert!(genesis.is_empty());
        assert_ne!(genesis.hash(), Block::genesis(1).hash());
    }
}
