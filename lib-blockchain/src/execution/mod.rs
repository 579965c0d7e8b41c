//! Transaction Execution Module
//!
//! This module implements the canonical transaction pipeline. It is the
//! ONLY code path that mutates ledger state.
//!
//! # Architecture
//!
//! ```text
//! TransactionEngine::execute_block(block)
//!     │
//!     ├── For each transaction:
//!     │       ├── snapshot = ledger.clone()
//!     │       ├── deploy / call / transfer   [writes via StateMutator]
//!     │       └── commit snapshot or drop it, record receipt
//!     │
//!     └── credit_block_reward(miner)
//! ```
//!
//! # Key Types
//!
//! - [`TransactionEngine`] - Main entry point for transaction application
//! - [`StateMutator`] - Controlled state mutation primitives
//!
//! # Invariants
//!
//! - A transaction's mutations are all visible or none are
//! - Exactly one receipt per executed transaction hash
//! - Deterministic: same block + same pre-state = same mutations

pub mod address;
pub mod engine;
pub mod errors;
pub mod tx_apply;

// Re-exports
pub use address::allocate_contract_address;
pub use engine::{BlockOutcome, EngineConfig, TransactionEngine};
pub use errors::{BlockApplyError, BlockApplyResult, TxApplyError, TxApplyResult};
pub use tx_apply::{StateMutator, TransferOutcome};
