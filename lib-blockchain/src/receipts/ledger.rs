//! Receipt Ledger
//!
//! Append/overwrite log keyed by transaction hash. Entries are never
//! deleted; every accessor hands out copies.

use std::collections::BTreeMap;

use lib_types::{BlockEnv, Transaction, TxHash, Value};

use super::types::{Receipt, ReceiptStatus};

/// Outcome written over an existing receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub status: ReceiptStatus,
    pub error: Option<String>,
    pub result: Option<Value>,
}

impl Resolution {
    pub fn success(result: Option<Value>) -> Self {
        Self {
            status: ReceiptStatus::Success,
            error: None,
            result,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            status: ReceiptStatus::Error,
            error: Some(error.into()),
            result: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReceiptLedger {
    receipts: BTreeMap<TxHash, Receipt>,
}

impl ReceiptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly admitted transaction
    pub fn record_pending(&mut self, tx: &Transaction) -> Receipt {
        self.resolve(
            tx,
            None,
            Resolution {
                status: ReceiptStatus::Pending,
                error: None,
                result: None,
            },
        )
    }

    /// Merge an outcome into the receipt for `tx.hash`.
    ///
    /// Transaction fields, status, error and result are replaced. Block
    /// fields are only replaced when a block is given. Returns a copy of the
    /// merged receipt.
    pub fn resolve(
        &mut self,
        tx: &Transaction,
        block: Option<&BlockEnv>,
        outcome: Resolution,
    ) -> Receipt {
        let receipt = self
            .receipts
            .entry(tx.hash)
            .or_insert_with(|| Receipt::pending(tx));

        receipt.tx = tx.clone();
        receipt.status = outcome.status;
        receipt.error = outcome.error;
        receipt.result = outcome.result;
        if let Some(block) = block {
            receipt.block_number = Some(block.number);
            receipt.block_timestamp = Some(block.timestamp);
        }
        receipt.clone()
    }

    pub fn get(&self, hash: &TxHash) -> Option<Receipt> {
        self.receipts.get(hash).cloned()
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.receipts.contains_key(hash)
    }

    /// Whether `hash` has already been executed (Success or Error)
    pub fn is_resolved(&self, hash: &TxHash) -> bool {
        self.receipts
            .get(hash)
            .map_or(false, |r| r.status != ReceiptStatus::Pending)
    }

    pub fn all(&self) -> Vec<Receipt> {
        self.receipts.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::Address;

    fn tx() -> Transaction {
        Transaction::transfer(Address::from("alice"), Address::from("bob"), 1, 0, 0)
    }

    #[test]
    fn test_pending_is_upgraded_not_duplicated() {
        let mut ledger = ReceiptLedger::new();
        let tx = tx();
        let pending = ledger.record_pending(&tx);
        assert_eq!(pending.status, ReceiptStatus::Pending);
        assert_eq!(ledger.get(&tx.hash), Some(pending));
        assert!(!ledger.is_resolved(&tx.hash));

        ledger.resolve(&tx, Some(&BlockEnv::new(1, 10)), Resolution::success(None));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_resolved(&tx.hash));
        let receipt = ledger.get(&tx.hash).unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert_eq!(receipt.block_number, Some(1));
    }

    #[test]
    fn test_latest_resolution_wins() {
        let mut ledger = ReceiptLedger::new();
        let tx = tx();
        ledger.resolve(&tx, Some(&BlockEnv::new(1, 10)), Resolution::success(Some(Value::Int(1))));
        let receipt = ledger.resolve(&tx, None, Resolution::error("boom"));

        assert_eq!(receipt.status, ReceiptStatus::Error);
        assert_eq!(receipt.error.as_deref(), Some("boom"));
        assert_eq!(receipt.result, None);
        // block fields survive a resolution without a block
        assert_eq!(receipt.block_timestamp, Some(10));
    }

    #[test]
    fn test_returned_receipts_are_copies() {
        let mut ledger = ReceiptLedger::new();
        let tx = tx();
        ledger.record_pending(&tx);

        let mut copy = ledger.get(&tx.hash).unwrap();
        copy.status = ReceiptStatus::Success;
        let mut all = ledger.all();
        all[0].error = Some("tampered".to_string());

        let stored = ledger.get(&tx.hash).unwrap();
        assert_eq!(stored.status, ReceiptStatus::Pending);
        assert_eq!(stored.error, None);
    }
}
