//! Transaction Receipt Module
//!
//! Receipts track every admitted transaction from `Pending` to its final
//! `Success` or `Error` outcome.

pub mod ledger;
pub mod types;

pub use ledger::{ReceiptLedger, Resolution};
pub use types::{Receipt, ReceiptStatus};
