//! Block structures
//!
//! Blocks carry the ordered transactions the engine replays. There is no
//! proof-of-work: the header hash is a plain BLAKE3 commitment to the
//! header fields and the ordered transaction hashes.

use serde::{Deserialize, Serialize};

use lib_types::{BlockEnv, BlockHash, BlockHeight, Transaction};

/// Block header with the fields covered by the block hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: BlockHeight,
    /// Zero for genesis
    pub previous_block_hash: BlockHash,
    pub timestamp: u64,
    /// BLAKE3 over the ordered transaction hashes
    pub transactions_root: [u8; 32],
    pub transaction_count: u32,
    pub block_hash: BlockHash,
}

impl BlockHeader {
    pub fn new(
        number: BlockHeight,
        previous_block_hash: BlockHash,
        timestamp: u64,
        transactions: &[Transaction],
    ) -> Self {
        let mut header = Self {
            number,
            previous_block_hash,
            timestamp,
            transactions_root: calculate_transactions_root(transactions),
            transaction_count: transactions.len() as u32,
            block_hash: BlockHash::zero(),
        };
        header.block_hash = header.calculate_hash();
        header
    }

    /// Calculate the hash of this block header
    pub fn calculate_hash(&self) -> BlockHash {
        let mut hasher = blake3::Hasher::new();

        hasher.update(&self.number.to_le_bytes());
        hasher.update(self.previous_block_hash.as_bytes());
        hasher.update(&self.timestamp.to_le_bytes());
        hasher.update(&self.transactions_root);
        hasher.update(&self.transaction_count.to_le_bytes());

        BlockHash::new(*hasher.finalize().as_bytes())
    }
}

pub fn calculate_transactions_root(transactions: &[Transaction]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for tx in transactions {
        hasher.update(tx.hash.as_bytes());
    }
    *hasher.finalize().as_bytes()
}

/// Ledger block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        number: BlockHeight,
        previous_block_hash: BlockHash,
        timestamp: u64,
        transactions: Vec<Transaction>,
    ) -> Self {
        let header = BlockHeader::new(number, previous_block_hash, timestamp, &transactions);
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.header.block_hash
    }

    pub fn number(&self) -> BlockHeight {
        self.header.number
    }

    pub fn previous_hash(&self) -> BlockHash {
        self.header.previous_block_hash
    }

    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Number and timestamp as seen by executing transactions
    pub fn env(&self) -> BlockEnv {
        BlockEnv::new(self.header.number, self.header.timestamp)
    }

    pub fn is_genesis(&self) -> bool {
        self.header.number == 0 && self.header.previous_block_hash.is_zero()
    }

    /// Header hash and transaction root both match the contents
    pub fn has_valid_header(&self) -> bool {
        self.header.transactions_root == calculate_transactions_root(&self.transactions)
            && self.header.transaction_count as usize == self.transactions.len()
            && self.header.block_hash == self.header.calculate_hash()
    }
}

/// Empty block 0
pub fn create_genesis_block() -> Block {
    Block::new(0, BlockHash::zero(), 0, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::Address;

    #[test]
    fn test_hash_commits_to_transactions() {
        let tx = Transaction::transfer(Address::from("alice"), Address::from("bob"), 1, 0, 0);
        let genesis = create_genesis_block();
        assert!(genesis.is_genesis());

        let a = Block::new(1, genesis.hash(), 10, vec![tx.clone()]);
        let b = Block::new(1, genesis.hash(), 10, Vec::new());
        assert_ne!(a.hash(), b.hash());
        assert!(a.has_valid_header());

        let mut tampered = a.clone();
        tampered.transactions.clear();
        assert!(!tampered.has_valid_header());
        assert_eq!(a.env(), BlockEnv::new(1, 10));
    }
}
