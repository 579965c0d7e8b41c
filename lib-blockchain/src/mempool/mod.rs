//! Transaction pool and admission
//!
//! Admission order: signature check, duplicate check, capacity checks.
//! Nothing in this module touches ledger state.

pub mod errors;
pub mod pool;
pub mod signature;

pub use errors::{AdmitError, AdmitErrorKind, AdmitResult};
pub use pool::{MempoolConfig, TxPool};
pub use signature::{
    address_from_public_key, sign_transaction, AcceptAllVerifier, Ed25519Verifier,
    SignatureVerifier,
};
