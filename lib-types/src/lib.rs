//! Ledger node primitives.
//! Stable, backend-neutral, behavior-free.

pub mod errors;
pub mod primitives;
pub mod state;
pub mod transaction;
pub mod value;

pub use errors::{BalanceError, BalanceResult};
pub use primitives::{
    blake3_hash, Address, Amount, BlockHash, BlockHeight, ExecutionMode, TxHash,
    CONTRACT_ADDRESS_PREFIX,
};
pub use state::{AccountRecord, CompiledUnit, LedgerState};
pub use transaction::{BlockEnv, Transaction, TxData, TxKind};
pub use value::Value;
