//! Contract VM Errors
//!
//! Every backend reports through [`VmError`]. The engine decides how a
//! variant maps onto a transaction failure, based on which phase
//! (compile/verify or run) produced it.

use lib_types::{BalanceError, ExecutionMode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("No backend registered for execution mode {0}")]
    UnknownMode(ExecutionMode),

    #[error("Invalid deploy payload: {0}")]
    InvalidPayload(String),

    #[error("Compilation failed: {0}")]
    CompileFailed(String),

    #[error("Verification failed: {0}")]
    VerifyFailed(String),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Execution trapped: {0}")]
    ExecutionTrap(String),

    #[error("Contract failed: {0}")]
    ContractFailed(String),

    #[error("Execution budget exhausted after {0} steps")]
    OutOfSteps(u64),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Host error: {0}")]
    HostError(String),

    #[error("Memory error: {0}")]
    MemoryError(String),

    #[error(transparent)]
    Balance(#[from] BalanceError),
}

pub type VmResult<T> = Result<T, VmError>;
