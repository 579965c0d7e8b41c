//! Transaction Pool
//!
//! FIFO queue of admitted transactions awaiting a block. Admission checks
//! capacity and identity; signature verification happens before a
//! transaction reaches the pool.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use lib_types::{Address, Transaction, TxHash};

use super::errors::{AdmitError, AdmitResult};

/// Configuration for pool admission checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Maximum number of transactions in the pool
    pub max_tx_count: u32,
    /// Maximum pending transactions per sender address
    pub max_per_sender: u32,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_tx_count: 10_000,
            max_per_sender: 1_000,
        }
    }
}

/// Pending transactions in arrival order
#[derive(Debug, Clone, Default)]
pub struct TxPool {
    config: MempoolConfig,
    queue: VecDeque<Transaction>,
    hashes: HashSet<TxHash>,
    per_sender: HashMap<Address, u32>,
}

impl TxPool {
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    /// Append a transaction to the back of the queue
    pub fn admit(&mut self, tx: Transaction) -> AdmitResult<()> {
        if self.hashes.contains(&tx.hash) {
            return Err(AdmitError::duplicate(tx.hash));
        }
        if self.queue.len() >= self.config.max_tx_count as usize {
            return Err(AdmitError::pool_full(self.config.max_tx_count));
        }
        let pending = self.pending_from(&tx.from);
        if pending >= self.config.max_per_sender {
            return Err(AdmitError::sender_limit(
                tx.from.clone(),
                pending,
                self.config.max_per_sender,
            ));
        }

        self.hashes.insert(tx.hash);
        *self.per_sender.entry(tx.from.clone()).or_default() += 1;
        self.queue.push_back(tx);
        Ok(())
    }

    /// Copies of up to `max` transactions from the front; the pool keeps
    /// them until [`TxPool::remove`]
    pub fn peek(&self, max: usize) -> Vec<Transaction> {
        self.queue.iter().take(max).cloned().collect()
    }

    /// Drop a transaction that made it into a block
    pub fn remove(&mut self, hash: &TxHash) -> Option<Transaction> {
        if !self.hashes.contains(hash) {
            return None;
        }
        let index = self.queue.iter().position(|tx| &tx.hash == hash)?;
        let tx = self.queue.remove(index)?;
        self.forget(&tx);
        Some(tx)
    }

    pub fn contains(&self, hash: &TxHash) -> bool {
        self.hashes.contains(hash)
    }

    pub fn pending_from(&self, sender: &Address) -> u32 {
        self.per_sender.get(sender).copied().unwrap_or(0)
    }

    /// Copies of the queued transactions, front first
    pub fn pending(&self) -> Vec<Transaction> {
        self.queue.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn forget(&mut self, tx: &Transaction) {
        self.hashes.remove(&tx.hash);
        if let Some(count) = self.per_sender.get_mut(&tx.from) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.per_sender.remove(&tx.from);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mempool::errors::AdmitErrorKind;

    fn tx(from: &str, nonce: u64) -> Transaction {
        Transaction::transfer(Address::from(from), Address::from("bob"), 1, 0, nonce)
    }

    #[test]
    fn test_fifo_order() {
        let mut pool = TxPool::new(MempoolConfig::default());
        for nonce in 0..3 {
            pool.admit(tx("alice", nonce)).unwrap();
        }

        let front = pool.peek(2);
        assert_eq!(front.iter().map(|t| t.nonce).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(pool.len(), 3);

        for tx in &front {
            assert!(pool.remove(&tx.hash).is_some());
        }
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pending_from(&Address::from("alice")), 1);
        assert_eq!(pool.peek(10)[0].nonce, 2);
    }

    #[test]
    fn test_remove_from_the_middle() {
        let mut pool = TxPool::new(MempoolConfig::default());
        let txs: Vec<_> = (0..3).map(|nonce| tx("alice", nonce)).collect();
        for t in &txs {
            pool.admit(t.clone()).unwrap();
        }

        assert_eq!(pool.remove(&txs[1].hash), Some(txs[1].clone()));
        assert_eq!(pool.remove(&txs[1].hash), None);
        assert_eq!(
            pool.pending().iter().map(|t| t.nonce).collect::<Vec<_>>(),
            vec![0, 2]
        );
    }

    #[test]
    fn test_duplicate_rejected_until_removed() {
        let mut pool = TxPool::new(MempoolConfig::default());
        let t = tx("alice", 0);
        pool.admit(t.clone()).unwrap();

        let err = pool.admit(t.clone()).unwrap_err();
        assert_eq!(err.kind, AdmitErrorKind::DuplicateTransaction(t.hash));

        pool.remove(&t.hash);
        assert!(!pool.contains(&t.hash));
        pool.admit(t).unwrap();
    }

    #[test]
    fn test_capacity_limits() {
        let mut pool = TxPool::new(MempoolConfig {
            max_tx_count: 2,
            max_per_sender: 1,
        });
        pool.admit(tx("alice", 0)).unwrap();

        let err = pool.admit(tx("alice", 1)).unwrap_err();
        assert!(matches!(err.kind, AdmitErrorKind::SenderLimitReached { count: 1, .. }));

        pool.admit(tx("carol", 0)).unwrap();
        let err = pool.admit(tx("dave", 0)).unwrap_err();
        assert_eq!(err.kind, AdmitErrorKind::PoolFull { max: 2 });
    }
}
