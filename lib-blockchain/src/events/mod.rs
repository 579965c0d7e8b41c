//! Ledger Event Emission
//!
//! Subscribers are notified after a block has been applied: one event per
//! resolved transaction, one per contract that came into existence, then
//! the block itself.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use lib_types::{Address, BlockHash, TxHash};

// ============================================================================
// EVENT TYPES
// ============================================================================

/// Ledger-level events that clients can subscribe to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LedgerEvent {
    /// Block appended to the chain and its transactions executed
    BlockApplied {
        number: u64,
        block_hash: BlockHash,
        timestamp: u64,
        transaction_count: u64,
    },

    /// Transaction resolved to a final receipt
    TransactionProcessed {
        tx_hash: TxHash,
        block_number: u64,
        success: bool,
    },

    /// Deployment committed
    ContractDeployed {
        address: Address,
        deployed_by: Address,
        block_number: u64,
    },
}

impl std::fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEvent::BlockApplied { number, .. } => write!(f, "BlockApplied(number={})", number),
            LedgerEvent::TransactionProcessed { tx_hash, success, .. } => {
                write!(
                    f,
                    "TransactionProcessed(tx={}, success={})",
                    hex::encode(&tx_hash.as_bytes()[..8]),
                    success
                )
            }
            LedgerEvent::ContractDeployed { address, .. } => {
                write!(f, "ContractDeployed({})", address)
            }
        }
    }
}

// ============================================================================
// EVENT LISTENER TRAIT
// ============================================================================

/// Trait for entities that listen to ledger events
#[async_trait]
pub trait LedgerEventListener: Send {
    /// Called when a ledger event occurs
    async fn on_event(&mut self, event: LedgerEvent) -> Result<()>;
}

// ============================================================================
// EVENT PUBLISHER
// ============================================================================

/// Thread-safe event publisher for ledger events
#[derive(Clone)]
pub struct LedgerEventPublisher {
    listeners: Arc<Mutex<Vec<Box<dyn LedgerEventListener>>>>,
}

impl std::fmt::Debug for LedgerEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerEventPublisher").finish()
    }
}

impl LedgerEventPublisher {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn subscribe(&self, listener: Box<dyn LedgerEventListener>) -> Result<()> {
        let mut listeners = self.listeners.lock().await;
        listeners.push(listener);
        Ok(())
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: LedgerEvent) -> Result<()> {
        let mut listeners = self.listeners.lock().await;

        for listener in listeners.iter_mut() {
            if let Err(e) = listener.on_event(event.clone()).await {
                // A failing listener never blocks the others
                tracing::warn!("Event listener error: {}", e);
            }
        }

        Ok(())
    }

    pub async fn listener_count(&self) -> Result<usize> {
        let listeners = self.listeners.lock().await;
        Ok(listeners.len())
    }
}

impl Default for LedgerEventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SIMPLE TEST LISTENER
// ============================================================================

/// Simple listener that captures events for testing
#[derive(Debug, Clone)]
pub struct TestEventListener {
    pub events: Arc<Mutex<Vec<LedgerEvent>>>,
}

impl TestEventListener {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn get_events(&self) -> Result<Vec<LedgerEvent>> {
        let events = self.events.lock().await;
        Ok(events.clone())
    }
}

impl Default for TestEventListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerEventListener for TestEventListener {
    async fn on_event(&mut self, event: LedgerEvent) -> Result<()> {
        let mut events = self.events.lock().await;
        events.push(event);
        Ok(())
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingListener;

    #[async_trait]
    impl LedgerEventListener for FailingListener {
        async fn on_event(&mut self, _event: LedgerEvent) -> Result<()> {
            anyhow::bail!("listener down")
        }
    }

    #[tokio::test]
    async fn test_publish_event_to_listeners() {
        let publisher = LedgerEventPublisher::new();
        let listener = Box::new(TestEventListener::new());
        let listener_ref = listener.clone();
        publisher.subscribe(listener).await.unwrap();

        let event = LedgerEvent::BlockApplied {
            number: 1,
            block_hash: BlockHash::new([1u8; 32]),
            timestamp: 1000,
            transaction_count: 5,
        };
        publisher.publish(event.clone()).await.unwrap();

        let events = listener_ref.get_events().await.unwrap();
        assert_eq!(events, vec![event]);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let publisher = LedgerEventPublisher::new();
        let listener = Box::new(TestEventListener::new());
        let listener_ref = listener.clone();

        publisher.subscribe(Box::new(FailingListener)).await.unwrap();
        publisher.subscribe(listener).await.unwrap();
        assert_eq!(publisher.listener_count().await.unwrap(), 2);

        let event = LedgerEvent::TransactionProcessed {
            tx_hash: TxHash::new([2u8; 32]),
            block_number: 3,
            success: false,
        };
        publisher.publish(event.clone()).await.unwrap();

        assert_eq!(listener_ref.get_events().await.unwrap(), vec![event]);
    }
}
