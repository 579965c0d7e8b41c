//! Block structures and the chain collaborator

pub mod chain;
pub mod core;

pub use chain::{Chain, MemoryChain};
pub use self::core::{calculate_transactions_root, create_genesis_block, Block, BlockHeader};
