//! Ledger Node
//!
//! Thin orchestration around the engine: pool admission, block assembly
//! and application, the periodic mining loop, and read-only queries.
//!
//! # Lock order
//!
//! `chain` → `ledger` → `receipts` → `pool`. The pool is never held while
//! a block executes.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use lib_contracts::{
    is_reserved, CallTarget, ContextFactory, ContractRunner, VmError, VmRegistry,
};
use lib_types::{
    Address, Amount, BalanceError, BlockHeight, LedgerState, Transaction, TxHash, TxKind, Value,
};

use crate::block::{Block, Chain, MemoryChain};
use crate::config::NodeConfig;
use crate::events::{LedgerEvent, LedgerEventListener, LedgerEventPublisher};
use crate::execution::{BlockApplyError, BlockOutcome, TransactionEngine};
use crate::mempool::{
    AcceptAllVerifier, AdmitError, Ed25519Verifier, SignatureVerifier, TxPool,
};
use crate::receipts::{Receipt, ReceiptLedger};

/// Error surfaced by node operations
#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Admission(#[from] AdmitError),

    #[error("The address supplied is not a deployed contract")]
    NotAContract(Address),

    #[error("Calling this method directly is not allowed: {0}")]
    ReservedMethodInvocation(String),

    #[error("Contract error: {0}")]
    Vm(#[from] VmError),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error("Block rejected: {0}")]
    Block(#[from] BlockApplyError),
}

pub type NodeResult<T> = Result<T, NodeError>;

pub struct Node<C: Chain = MemoryChain> {
    config: NodeConfig,
    engine: TransactionEngine,
    verifier: Arc<dyn SignatureVerifier>,
    chain: RwLock<C>,
    ledger: RwLock<LedgerState>,
    receipts: RwLock<ReceiptLedger>,
    pool: Mutex<TxPool>,
    events: LedgerEventPublisher,
}

impl<C: Chain> std::fmt::Debug for Node<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("miner", &self.config.miner_address)
            .field("modes", &self.engine.registry().modes())
            .finish()
    }
}

impl Node<MemoryChain> {
    /// Node over a fresh in-memory chain
    pub fn in_memory(config: NodeConfig) -> NodeResult<Self> {
        Self::new(config, MemoryChain::new())
    }
}

impl<C: Chain> Node<C> {
    /// Build a node with the shipped backends. The verifier follows
    /// `config.verify_signatures`.
    pub fn new(config: NodeConfig, chain: C) -> NodeResult<Self> {
        let verifier: Arc<dyn SignatureVerifier> = if config.verify_signatures {
            Arc::new(Ed25519Verifier)
        } else {
            Arc::new(AcceptAllVerifier)
        };
        let registry = VmRegistry::with_default_backends(config.limits.clone())?;
        Ok(Self::with_parts(config, chain, Arc::new(registry), verifier))
    }

    pub fn with_parts(
        config: NodeConfig,
        chain: C,
        registry: Arc<VmRegistry>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        let engine =
            TransactionEngine::with_verifier(registry, config.engine_config(), Arc::clone(&verifier));
        let mut ledger = LedgerState::with_miner(&config.miner_address);
        for (address, amount) in &config.genesis_balances {
            if let Err(e) = ledger.credit(address, *amount) {
                warn!("Genesis balance for {} skipped: {}", address, e);
            }
        }
        let pool = TxPool::new(config.mempool.clone());

        Self {
            config,
            engine,
            verifier,
            chain: RwLock::new(chain),
            ledger: RwLock::new(ledger),
            receipts: RwLock::new(ReceiptLedger::new()),
            pool: Mutex::new(pool),
            events: LedgerEventPublisher::new(),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn engine(&self) -> &TransactionEngine {
        &self.engine
    }

    pub async fn subscribe(&self, listener: Box<dyn LedgerEventListener>) -> anyhow::Result<()> {
        self.events.subscribe(listener).await
    }

    /// Credit an account outside of block execution (genesis allocation)
    pub async fn fund(&self, address: &Address, amount: Amount) -> NodeResult<()> {
        let mut ledger = self.ledger.write().await;
        ledger.credit(address, amount)?;
        Ok(())
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Verify, enqueue and record a `Pending` receipt.
    ///
    /// A hash that already has a receipt is a duplicate, whether it is still
    /// pooled or already executed.
    pub async fn add_transaction(&self, tx: Transaction) -> NodeResult<TxHash> {
        if !self.verifier.verify(&tx) {
            warn!("Rejected transaction {}: invalid signature", tx.hash);
            return Err(AdmitError::invalid_signature().into());
        }

        let mut receipts = self.receipts.write().await;
        if receipts.contains(&tx.hash) {
            return Err(AdmitError::duplicate(tx.hash).into());
        }

        let hash = tx.hash;
        self.pool.lock().await.admit(tx.clone())?;
        let receipt = receipts.record_pending(&tx);

        debug!("Admitted transaction {} ({})", hash, receipt.status);
        Ok(hash)
    }

    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.pool.lock().await.pending()
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Append `block` to the chain, execute its transactions and accrue the
    /// miner reward. Signatures are checked per transaction during
    /// execution; the block's transactions leave the pool afterwards.
    pub async fn apply_block(&self, block: Block) -> NodeResult<BlockOutcome> {
        let mut chain = self.chain.write().await;
        self.apply_block_locked(&mut *chain, block).await
    }

    /// Apply up to `block_size` pooled transactions as the next block.
    /// Returns `None` when the pool is empty. Transactions stay pooled if
    /// the block is rejected.
    pub async fn mine_block(&self, timestamp: u64) -> NodeResult<Option<Block>> {
        let mut chain = self.chain.write().await;
        let txs = self.pool.lock().await.peek(self.config.block_size);
        if txs.is_empty() {
            return Ok(None);
        }

        let block = Block::new(
            chain.latest_block_number() + 1,
            chain.latest_block_hash(),
            timestamp,
            txs,
        );
        self.apply_block_locked(&mut *chain, block.clone()).await?;
        Ok(Some(block))
    }

    async fn apply_block_locked(&self, chain: &mut C, block: Block) -> NodeResult<BlockOutcome> {
        if block.transaction_count() > self.config.block_size {
            return Err(BlockApplyError::TooManyTransactions {
                count: block.transaction_count(),
                max: self.config.block_size,
            }
            .into());
        }
        chain.add_block(block.clone())?;

        let outcome = {
            let mut ledger = self.ledger.write().await;
            let mut receipts = self.receipts.write().await;
            self.engine
                .execute_block(&block, &mut ledger, &mut receipts)
                .await
        };

        {
            let mut pool = self.pool.lock().await;
            for tx in &block.transactions {
                pool.remove(&tx.hash);
            }
        }

        self.publish_block_events(&block, &outcome).await;
        Ok(outcome)
    }

    async fn publish_block_events(&self, block: &Block, outcome: &BlockOutcome) {
        let mut events = Vec::with_capacity(outcome.receipts.len() + 1);
        for (tx, receipt) in block.transactions.iter().zip(&outcome.receipts) {
            events.push(LedgerEvent::TransactionProcessed {
                tx_hash: tx.hash,
                block_number: block.number(),
                success: receipt.is_success(),
            });
            if tx.kind() == TxKind::Deployment && receipt.is_success() {
                if let Some(address) = receipt.tx.to.clone() {
                    events.push(LedgerEvent::ContractDeployed {
                        address,
                        deployed_by: tx.from.clone(),
                        block_number: block.number(),
                    });
                }
            }
        }
        events.push(LedgerEvent::BlockApplied {
            number: block.number(),
            block_hash: block.hash(),
            timestamp: block.timestamp(),
            transaction_count: block.transaction_count() as u64,
        });

        for event in events {
            if let Err(e) = self.events.publish(event).await {
                warn!("Failed to publish ledger event: {}", e);
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn receipt(&self, hash: &TxHash) -> Option<Receipt> {
        self.receipts.read().await.get(hash)
    }

    pub async fn receipts(&self) -> Vec<Receipt> {
        self.receipts.read().await.all()
    }

    pub async fn blocks(&self) -> Vec<Block> {
        self.chain.read().await.blocks()
    }

    pub async fn latest_block_number(&self) -> BlockHeight {
        self.chain.read().await.latest_block_number()
    }

    pub async fn balance_of(&self, address: &Address) -> Amount {
        self.ledger.read().await.balance_of(address)
    }

    pub async fn contract_addresses(&self) -> Vec<Address> {
        self.ledger.read().await.contract_addresses()
    }

    /// Copy of the live ledger
    pub async fn ledger_snapshot(&self) -> LedgerState {
        self.ledger.read().await.clone()
    }

    /// Externally callable members of a contract; empty for any other
    /// address.
    pub async fn callable_members(&self, address: &Address) -> NodeResult<Vec<String>> {
        let code = {
            let ledger = self.ledger.read().await;
            ledger.contract_code(address).map(|(m, u)| (m, u.clone()))
        };
        let Some((mode, unit)) = code else {
            return Ok(Vec::new());
        };

        let metadata = self.engine.registry().metadata(mode, address, &unit).await?;
        Ok(metadata.callable_members())
    }

    /// Run a member with read access to the live ledger. Nothing the member
    /// writes survives the call.
    pub async fn call_view(
        &self,
        address: &Address,
        name: &str,
        params: Vec<Value>,
    ) -> NodeResult<Value> {
        self.guard_direct_call(address, name).await?;

        let ledger = self.ledger.read().await;
        let (mode, unit) = ledger
            .contract_code(address)
            .map(|(m, u)| (m, u.clone()))
            .ok_or_else(|| NodeError::NotAContract(address.clone()))?;
        let vm = self.engine.registry().get(mode)?;

        let target = CallTarget::new(address.clone(), name, params);
        let mut ctx = vm.context_for_view(&ledger, target);
        Ok(vm.run(&unit, &mut ctx).await?)
    }

    /// Run a member with no ledger state at all
    pub async fn call_pure(
        &self,
        address: &Address,
        name: &str,
        params: Vec<Value>,
    ) -> NodeResult<Value> {
        self.guard_direct_call(address, name).await?;

        let (mode, unit) = {
            let ledger = self.ledger.read().await;
            ledger
                .contract_code(address)
                .map(|(m, u)| (m, u.clone()))
                .ok_or_else(|| NodeError::NotAContract(address.clone()))?
        };
        let vm = self.engine.registry().get(mode)?;

        let target = CallTarget::new(address.clone(), name, params);
        let mut ctx = vm.context_for_pure(target);
        Ok(vm.run(&unit, &mut ctx).await?)
    }

    async fn guard_direct_call(&self, address: &Address, name: &str) -> NodeResult<()> {
        if is_reserved(name) {
            return Err(NodeError::ReservedMethodInvocation(name.to_string()));
        }

        let code = {
            let ledger = self.ledger.read().await;
            ledger.contract_code(address).map(|(m, u)| (m, u.clone()))
        };
        let (mode, unit) = code.ok_or_else(|| NodeError::NotAContract(address.clone()))?;
        let metadata = self.engine.registry().metadata(mode, address, &unit).await?;
        if metadata.is_hook(name) {
            return Err(NodeError::ReservedMethodInvocation(name.to_string()));
        }
        Ok(())
    }
}

impl<C: Chain + 'static> Node<C> {
    /// Mine every `mine_interval_ms` until `shutdown` flips to `true` or its
    /// sender is dropped. Ticks with an empty pool produce no block.
    pub fn spawn_miner(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(node.config.mine_interval());
            info!("Miner started, interval {:?}", node.config.mine_interval());

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match node.mine_block(unix_millis()).await {
                            Ok(Some(block)) => debug!(
                                "Mined block {} with {} transactions",
                                block.number(),
                                block.transaction_count()
                            ),
                            Ok(None) => {}
                            Err(e) => warn!("Mining failed: {}", e),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Miner stopped");
        })
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
