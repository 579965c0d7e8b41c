//! Ledger Node Package
//!
//! Transaction execution over a snapshot-and-commit ledger, receipts, pool
//! admission and block application. Contract backends live in
//! `lib-contracts`; the data model in `lib-types`.

pub mod block;
pub mod config;
pub mod events;
pub mod execution;
pub mod mempool;
pub mod node;
pub mod receipts;

// Block module
pub use block::{calculate_transactions_root, create_genesis_block, Block, BlockHeader, Chain, MemoryChain};

// Configuration
pub use config::{ConfigError, NodeConfig};

// Events
pub use events::{LedgerEvent, LedgerEventListener, LedgerEventPublisher, TestEventListener};

// Execution
pub use execution::{
    allocate_contract_address, BlockApplyError, BlockApplyResult, BlockOutcome, EngineConfig,
    StateMutator, TransactionEngine, TransferOutcome, TxApplyError, TxApplyResult,
};

// Pool admission
pub use mempool::{
    address_from_public_key, sign_transaction, AcceptAllVerifier, AdmitError, AdmitErrorKind,
    AdmitResult, Ed25519Verifier, MempoolConfig, SignatureVerifier, TxPool,
};

// Node
pub use node::{Node, NodeError, NodeResult};

// Receipts
pub use receipts::{Receipt, ReceiptLedger, ReceiptStatus, Resolution};
