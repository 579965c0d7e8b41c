//! Chain collaborator
//!
//! The engine only needs the latest block number and hash to build the
//! next block, and a way to append and list blocks.

use lib_types::{BlockHash, BlockHeight};

use crate::execution::errors::{BlockApplyError, BlockApplyResult};

use super::core::{create_genesis_block, Block};

pub trait Chain: Send + Sync {
    fn latest_block_number(&self) -> BlockHeight;

    fn latest_block_hash(&self) -> BlockHash;

    /// Append a block that extends the current tip
    fn add_block(&mut self, block: Block) -> BlockApplyResult<()>;

    /// All blocks, genesis first
    fn blocks(&self) -> Vec<Block>;

    /// Check that `block` is well-formed and extends the current tip
    fn validate_next(&self, block: &Block) -> BlockApplyResult<()> {
        if !block.has_valid_header() {
            return Err(BlockApplyError::InvalidHeader {
                number: block.number(),
            });
        }

        let expected = self.latest_block_number() + 1;
        if block.number() != expected {
            return Err(BlockApplyError::NumberMismatch {
                expected,
                actual: block.number(),
            });
        }

        let tip = self.latest_block_hash();
        if block.previous_hash() != tip {
            return Err(BlockApplyError::InvalidPreviousHash {
                expected: tip.to_string(),
                actual: block.previous_hash().to_string(),
            });
        }
        Ok(())
    }
}

/// In-memory chain starting at an empty genesis block
#[derive(Debug, Clone)]
pub struct MemoryChain {
    blocks: Vec<Block>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self {
            blocks: vec![create_genesis_block()],
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn latest(&self) -> Option<&Block> {
        self.blocks.last()
    }
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain for MemoryChain {
    fn latest_block_number(&self) -> BlockHeight {
        self.latest().map(Block::number).unwrap_or(0)
    }

    fn latest_block_hash(&self) -> BlockHash {
        self.latest().map(Block::hash).unwrap_or_else(BlockHash::zero)
    }

    fn add_block(&mut self, block: Block) -> BlockApplyResult<()> {
        self.validate_next(&block)?;
        self.blocks.push(block);
        Ok(())
    }

    fn blocks(&self) -> Vec<Block> {
        self.blocks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_links_blocks() {
        let mut chain = MemoryChain::new();
        assert_eq!(chain.latest_block_number(), 0);

        let block = Block::new(1, chain.latest_block_hash(), 5, Vec::new());
        chain.add_block(block.clone()).unwrap();
        assert_eq!(chain.latest_block_number(), 1);
        assert_eq!(chain.latest_block_hash(), block.hash());
        assert_eq!(chain.blocks().len(), 2);
    }

    #[test]
    fn test_chain_rejects_gaps_and_forks() {
        let mut chain = MemoryChain::new();
        let gap = Block::new(2, chain.latest_block_hash(), 5, Vec::new());
        assert!(matches!(
            chain.add_block(gap),
            Err(BlockApplyError::NumberMismatch { expected: 1, actual: 2 })
        ));

        let fork = Block::new(1, BlockHash::new([9u8; 32]), 5, Vec::new());
        assert!(matches!(
            chain.add_block(fork),
            Err(BlockApplyError::InvalidPreviousHash { .. })
        ));
    }
}
