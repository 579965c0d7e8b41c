//! Transaction Receipt Types
//!
//! A receipt is the transaction as submitted plus its outcome. It is created
//! `Pending` at pool admission and overwritten in place once execution
//! resolves.

use lib_types::{BlockEnv, BlockHeight, Transaction, TxHash, Value};
use serde::{Deserialize, Serialize};

/// Status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// Transaction in pool, awaiting inclusion in a block
    Pending,
    /// Executed and committed
    Success,
    /// Executed and discarded; `error` says why
    Error,
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceiptStatus::Pending => write!(f, "Pending"),
            ReceiptStatus::Success => write!(f, "Success"),
            ReceiptStatus::Error => write!(f, "Error"),
        }
    }
}

/// Receipt for a transaction, keyed by its hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction fields as last recorded
    #[serde(flatten)]
    pub tx: Transaction,
    pub status: ReceiptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Return value of the invoked member, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<BlockHeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_timestamp: Option<u64>,
}

impl Receipt {
    pub fn pending(tx: &Transaction) -> Self {
        Self {
            tx: tx.clone(),
            status: ReceiptStatus::Pending,
            error: None,
            result: None,
            block_number: None,
            block_timestamp: None,
        }
    }

    /// Error receipt for `tx` resolved in `block`
    pub fn failed(tx: &Transaction, block: &BlockEnv, error: impl Into<String>) -> Self {
        Self {
            tx: tx.clone(),
            status: ReceiptStatus::Error,
            error: Some(error.into()),
            result: None,
            block_number: Some(block.number),
            block_timestamp: Some(block.timestamp),
        }
    }

    pub fn tx_hash(&self) -> TxHash {
        self.tx.hash
    }

    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }

    /// Block this receipt was resolved in, if any
    pub fn block(&self) -> Option<BlockEnv> {
        match (self.block_number, self.block_timestamp) {
            (Some(number), Some(timestamp)) => Some(BlockEnv::new(number, timestamp)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::Address;

    #[test]
    fn test_receipt_serializes_flat() {
        let tx = Transaction::transfer(Address::from("alice"), Address::from("bob"), 3, 1, 0);
        let mut receipt = Receipt::pending(&tx);
        receipt.status = ReceiptStatus::Success;
        receipt.block_number = Some(4);
        receipt.block_timestamp = Some(1_000);

        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["from"], "alice");
        assert_eq!(json["value"], 3);
        assert_eq!(json["status"], "Success");
        assert_eq!(json["block_number"], 4);
        assert!(json.get("error").is_none());

        let back: Receipt = serde_json::from_value(json).unwrap();
        assert_eq!(back, receipt);
        assert_eq!(back.block(), Some(BlockEnv::new(4, 1_000)));
    }
}
