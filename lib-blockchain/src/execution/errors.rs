//! Execution Errors
//!
//! Error types for transaction and block execution. Every
//! [`TxApplyError`] raised inside `execute_transaction` is caught at the
//! transaction boundary and becomes an `Error` receipt; none of them
//! escapes to block processing.

use thiserror::Error;

use lib_contracts::VmError;
use lib_types::{Address, Amount, BalanceError, TxHash};

/// Error during transaction application
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxApplyError {
    // =========================================================================
    // Admission
    // =========================================================================

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Transaction {0} was already executed")]
    AlreadyExecuted(TxHash),

    // =========================================================================
    // Dispatch
    // =========================================================================

    #[error("Address {0} is not a valid contract")]
    InvalidContractAddress(Address),

    #[error("Calling this method directly is not allowed: {0}")]
    ReservedMethodInvocation(String),

    #[error("Transaction has no recipient")]
    MissingRecipient,

    // =========================================================================
    // Contract lifecycle
    // =========================================================================

    #[error("Contract compile/verify failure: {0}")]
    CompileOrVerifyFailure(String),

    #[error("Contract execution failure: {0}")]
    ContractExecutionFailure(String),

    // =========================================================================
    // Accounting
    // =========================================================================

    #[error("Insufficient balance for {address}: have {have}, need {need}")]
    InsufficientBalance {
        address: Address,
        have: Amount,
        need: Amount,
    },

    #[error("Balance overflow for {0}")]
    BalanceOverflow(Address),
}

impl From<BalanceError> for TxApplyError {
    fn from(e: BalanceError) -> Self {
        match e {
            BalanceError::InsufficientBalance {
                address,
                have,
                need,
            } => TxApplyError::InsufficientBalance {
                address,
                have,
                need,
            },
            BalanceError::Overflow(address) => TxApplyError::BalanceOverflow(address),
        }
    }
}

impl TxApplyError {
    /// Map a backend error raised while compiling or verifying deploy source
    pub fn from_compile(e: VmError) -> Self {
        TxApplyError::CompileOrVerifyFailure(e.to_string())
    }

    /// Map a backend error raised while contract code was running
    pub fn from_execution(e: VmError) -> Self {
        match e {
            VmError::Balance(balance) => balance.into(),
            other => TxApplyError::ContractExecutionFailure(other.to_string()),
        }
    }
}

/// Error during block assembly and application
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockApplyError {
    #[error("Block number mismatch: expected {expected}, got {actual}")]
    NumberMismatch { expected: u64, actual: u64 },

    #[error("Invalid previous block hash: expected {expected}, got {actual}")]
    InvalidPreviousHash { expected: String, actual: String },

    #[error("Block {number} header does not match its contents")]
    InvalidHeader { number: u64 },

    #[error("Block too large: {count} transactions, max {max}")]
    TooManyTransactions { count: usize, max: usize },
}

/// Result type for transaction application
pub type TxApplyResult<T> = Result<T, TxApplyError>;

/// Result type for block application
pub type BlockApplyResult<T> = Result<T, BlockApplyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_errors_map_by_phase() {
        let compile = TxApplyError::from_compile(VmError::VerifyFailed("loop".into()));
        assert!(matches!(compile, TxApplyError::CompileOrVerifyFailure(_)));

        let run = TxApplyError::from_execution(VmError::ContractFailed("nope".into()));
        assert!(matches!(run, TxApplyError::ContractExecutionFailure(_)));

        let underflow = TxApplyError::from_execution(VmError::Balance(
            BalanceError::InsufficientBalance {
                address: Address::from("contract_x"),
                have: 1,
                need: 2,
            },
        ));
        assert!(matches!(underflow, TxApplyError::InsufficientBalance { .. }));
    }
}
