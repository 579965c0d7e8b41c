//! Pool Admission Errors

use thiserror::Error;

use lib_types::{Address, TxHash};

/// Specific reason for admission rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmitErrorKind {
    // Authentication
    InvalidSignature,

    // Capacity
    PoolFull { max: u32 },
    SenderLimitReached { sender: Address, count: u32, max: u32 },

    // Identity
    DuplicateTransaction(TxHash),
}

/// Error during pool admission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Admission rejected: {kind:?}")]
pub struct AdmitError {
    pub kind: AdmitErrorKind,
}

impl AdmitError {
    pub fn new(kind: AdmitErrorKind) -> Self {
        Self { kind }
    }

    pub fn invalid_signature() -> Self {
        Self::new(AdmitErrorKind::InvalidSignature)
    }

    pub fn pool_full(max: u32) -> Self {
        Self::new(AdmitErrorKind::PoolFull { max })
    }

    pub fn sender_limit(sender: Address, count: u32, max: u32) -> Self {
        Self::new(AdmitErrorKind::SenderLimitReached { sender, count, max })
    }

    pub fn duplicate(hash: TxHash) -> Self {
        Self::new(AdmitErrorKind::DuplicateTransaction(hash))
    }
}

/// Result type for pool admission
pub type AdmitResult<T> = Result<T, AdmitError>;
