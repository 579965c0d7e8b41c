//! Ledger State Errors

use thiserror::Error;

use crate::primitives::{Address, Amount};

/// Error raised by balance primitives on [`crate::LedgerState`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Insufficient balance for {address}: have {have}, need {need}")]
    InsufficientBalance {
        address: Address,
        have: Amount,
        need: Amount,
    },

    #[error("Balance overflow for {0}")]
    Overflow(Address),
}

/// Result type for balance primitives
pub type BalanceResult<T> = Result<T, BalanceError>;
