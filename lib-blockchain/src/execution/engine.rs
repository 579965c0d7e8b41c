//! Transaction Engine (Single Authority)
//!
//! The engine is the only code that turns transactions into ledger
//! mutations. Every transaction runs against a private snapshot; the
//! snapshot replaces the live ledger only if the whole transaction
//! succeeded.
//!
//! # Execution Order
//!
//! ```text
//! snapshot = ledger.clone()
//!   deployment?  allocate address, decode, compile, verify, install,
//!                run __on_deployed
//!   call?        guard reserved names, run member in a write context
//!   value        debit value + fee, credit recipient and miner
//!   transfer to contract with value > 0?  run __on_received
//! success → ledger = snapshot, Success receipt
//! failure → snapshot dropped, Error receipt
//! ```
//!
//! No error crosses the transaction boundary: `execute_transaction` always
//! returns a receipt. A transaction whose hash already has a Success or
//! Error receipt is not executed again; its rejection is returned but not
//! recorded, so the first outcome stays on file.

use std::sync::Arc;

use tracing::{debug, info, warn};

use lib_contracts::{
    decode_deploy_payload, is_reserved, CallTarget, ContextFactory, ContractCompiler,
    ContractRunner, ContractVm, VmRegistry, ON_DEPLOYED, ON_RECEIVED,
};
use lib_types::{
    AccountRecord, Address, Amount, BlockEnv, CompiledUnit, LedgerState, Transaction, TxKind,
    Value,
};

use super::address::allocate_contract_address;
use super::errors::{TxApplyError, TxApplyResult};
use super::tx_apply::StateMutator;
use crate::block::Block;
use crate::mempool::{AcceptAllVerifier, SignatureVerifier};
use crate::receipts::{Receipt, ReceiptLedger, Resolution};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Account credited with fees and block rewards
    pub miner_address: Address,
    /// Flat reward credited once per applied block
    pub block_reward: Amount,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            miner_address: Address::from("miner"),
            block_reward: 10,
        }
    }
}

/// Outcome of applying a block's transactions
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    /// Block number that was applied
    pub number: u64,
    /// Receipts in transaction order
    pub receipts: Vec<Receipt>,
    /// Fees credited to the miner by successful transactions
    pub fees_collected: Amount,
    /// Reward credited after the last transaction
    pub reward: Amount,
}

impl BlockOutcome {
    pub fn succeeded(&self) -> usize {
        self.receipts.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.receipts.len() - self.succeeded()
    }
}

/// Executes transactions against snapshots of the ledger
#[derive(Clone)]
pub struct TransactionEngine {
    registry: Arc<VmRegistry>,
    verifier: Arc<dyn SignatureVerifier>,
    config: EngineConfig,
}

impl std::fmt::Debug for TransactionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl TransactionEngine {
    /// Engine that trusts every signature
    pub fn new(registry: Arc<VmRegistry>, config: EngineConfig) -> Self {
        Self::with_verifier(registry, config, Arc::new(AcceptAllVerifier))
    }

    pub fn with_verifier(
        registry: Arc<VmRegistry>,
        config: EngineConfig,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            registry,
            verifier,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<VmRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn miner_address(&self) -> &Address {
        &self.config.miner_address
    }

    /// Execute one transaction and record its receipt.
    ///
    /// On success the live ledger is replaced by the transaction's snapshot
    /// and the receipt carries the updated transaction (with `to` set for a
    /// deployment). On failure the ledger is untouched and the receipt
    /// carries the transaction as submitted.
    pub async fn execute_transaction(
        &self,
        tx: &Transaction,
        block: &BlockEnv,
        ledger: &mut LedgerState,
        receipts: &mut ReceiptLedger,
    ) -> Receipt {
        if receipts.is_resolved(&tx.hash) {
            let err = TxApplyError::AlreadyExecuted(tx.hash);
            warn!("Transaction {} skipped in block {}: {}", tx.hash, block.number, err);
            return Receipt::failed(tx, block, err.to_string());
        }

        let mut snapshot = ledger.clone();
        let mut working = tx.clone();

        match self.apply(&mut working, block, &mut snapshot).await {
            Ok(result) => {
                *ledger = snapshot;
                debug!("Transaction {} applied in block {}", tx.hash, block.number);
                receipts.resolve(&working, Some(block), Resolution::success(result))
            }
            Err(e) => {
                warn!("Transaction {} failed: {}", tx.hash, e);
                receipts.resolve(tx, Some(block), Resolution::error(e.to_string()))
            }
        }
    }

    /// Execute a block's transactions in order, then credit the miner
    /// reward on the live ledger.
    pub async fn execute_block(
        &self,
        block: &Block,
        ledger: &mut LedgerState,
        receipts: &mut ReceiptLedger,
    ) -> BlockOutcome {
        let env = block.env();
        let mut outcome = BlockOutcome {
            number: block.number(),
            receipts: Vec::with_capacity(block.transactions.len()),
            fees_collected: 0,
            reward: 0,
        };

        for tx in &block.transactions {
            let receipt = self.execute_transaction(tx, &env, ledger, receipts).await;
            if receipt.is_success() {
                outcome.fees_collected = outcome.fees_collected.saturating_add(tx.fee);
            }
            outcome.receipts.push(receipt);
        }

        let reward = self.config.block_reward;
        match StateMutator::new(ledger).credit_block_reward(&self.config.miner_address, reward) {
            Ok(()) => outcome.reward = reward,
            Err(e) => warn!("Block {} reward not credited: {}", block.number(), e),
        }

        info!(
            "Applied block {}: {} succeeded, {} failed",
            outcome.number,
            outcome.succeeded(),
            outcome.failed()
        );
        outcome
    }

    // =========================================================================
    // Transaction pipeline
    // =========================================================================

    async fn apply(
        &self,
        tx: &mut Transaction,
        block: &BlockEnv,
        snapshot: &mut LedgerState,
    ) -> TxApplyResult<Option<Value>> {
        if !self.verifier.verify(tx) {
            return Err(TxApplyError::InvalidSignature);
        }

        let kind = tx.kind();
        let result = match kind {
            TxKind::Deployment => {
                let address = self.deploy(tx, block, snapshot).await?;
                tx.to = Some(address);
                None
            }
            TxKind::Call => Some(self.call(tx, block, snapshot).await?),
            TxKind::Transfer => None,
        };

        StateMutator::new(snapshot).apply_value_transfer(tx, &self.config.miner_address)?;

        if kind == TxKind::Transfer && tx.value > 0 {
            if let Some(to) = tx.to.clone() {
                if let Some((mode, unit)) = snapshot.contract_code(&to).map(|(m, u)| (m, u.clone())) {
                    let vm = self
                        .registry
                        .get(mode)
                        .map_err(TxApplyError::from_execution)?;
                    let target = CallTarget::hook(to, ON_RECEIVED);
                    self.run_write(vm.as_ref(), &unit, tx, block, snapshot, target)
                        .await?;
                }
            }
        }

        Ok(result)
    }

    async fn deploy(
        &self,
        tx: &Transaction,
        block: &BlockEnv,
        snapshot: &mut LedgerState,
    ) -> TxApplyResult<Address> {
        let mode = tx.data.mode.ok_or_else(|| {
            TxApplyError::CompileOrVerifyFailure("deployment carries no execution mode".to_string())
        })?;
        let payload = tx.data.src.as_deref().unwrap_or_default();

        let vm = self.registry.get(mode).map_err(TxApplyError::from_compile)?;
        let source = decode_deploy_payload(mode, payload).map_err(TxApplyError::from_compile)?;
        let unit = vm.compile(&source).map_err(TxApplyError::from_compile)?;
        vm.verify(&unit).map_err(TxApplyError::from_compile)?;

        let address = allocate_contract_address(snapshot, &tx.from, &tx.hash);
        StateMutator::new(snapshot).install_contract(
            address.clone(),
            AccountRecord::contract(mode, tx.from.clone(), unit.clone()),
        );
        info!("Deploying {} contract at {}", vm.name(), address);

        let target = CallTarget::hook(address.clone(), ON_DEPLOYED);
        self.run_write(vm.as_ref(), &unit, tx, block, snapshot, target)
            .await?;
        Ok(address)
    }

    async fn call(
        &self,
        tx: &Transaction,
        block: &BlockEnv,
        snapshot: &mut LedgerState,
    ) -> TxApplyResult<Value> {
        let to = tx.to.clone().ok_or(TxApplyError::MissingRecipient)?;
        let name = tx.data.name.clone().unwrap_or_default();
        if is_reserved(&name) {
            return Err(TxApplyError::ReservedMethodInvocation(name));
        }

        let (mode, unit) = snapshot
            .contract_code(&to)
            .map(|(m, u)| (m, u.clone()))
            .ok_or_else(|| TxApplyError::InvalidContractAddress(to.clone()))?;
        let vm = self.registry.get(mode).map_err(TxApplyError::from_execution)?;

        let metadata = self
            .registry
            .metadata(mode, &to, &unit)
            .await
            .map_err(TxApplyError::from_execution)?;
        if metadata.is_hook(&name) {
            return Err(TxApplyError::ReservedMethodInvocation(name));
        }

        let target = CallTarget::new(to, name, tx.data.params.clone());
        self.run_write(vm.as_ref(), &unit, tx, block, snapshot, target)
            .await
    }

    /// Run a member in a write context over the snapshot and persist the
    /// storage writes it handed back.
    async fn run_write(
        &self,
        vm: &dyn ContractVm,
        unit: &CompiledUnit,
        tx: &Transaction,
        block: &BlockEnv,
        snapshot: &mut LedgerState,
        target: CallTarget,
    ) -> TxApplyResult<Value> {
        let address = target.address.clone();
        let mut ctx = vm.context_for_write(tx, block, snapshot, target);
        let result = vm
            .run(unit, &mut ctx)
            .await
            .map_err(TxApplyError::from_execution)?;
        let changes = ctx.into_state_changes().unwrap_or_default();

        StateMutator::new(snapshot).apply_contract_state(&address, changes)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_contracts::ExecutionLimits;

    fn engine() -> TransactionEngine {
        let registry = VmRegistry::with_default_backends(ExecutionLimits::for_testing()).unwrap();
        TransactionEngine::new(Arc::new(registry), EngineConfig::default())
    }

    fn funded(address: &str, balance: Amount) -> LedgerState {
        let mut ledger = LedgerState::with_miner(&Address::from("miner"));
        ledger.credit(&Address::from(address), balance).unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_ledger_untouched() {
        let engine = engine();
        let mut ledger = funded("alice", 5);
        let before = ledger.clone();
        let mut receipts = ReceiptLedger::new();

        let tx = Transaction::transfer(Address::from("alice"), Address::from("bob"), 10, 1, 0);
        let receipt = engine
            .execute_transaction(&tx, &BlockEnv::new(1, 1), &mut ledger, &mut receipts)
            .await;

        assert!(!receipt.is_success());
        assert_eq!(ledger, before);
        assert!(receipt.error.unwrap().contains("Insufficient balance"));
    }

    #[tokio::test]
    async fn test_call_to_plain_account_is_rejected() {
        let engine = engine();
        let mut ledger = funded("alice", 5);
        let mut receipts = ReceiptLedger::new();

        let tx = Transaction::call(
            Address::from("alice"),
            Address::from("bob"),
            "bump",
            vec![],
            0,
            0,
            0,
        );
        let receipt = engine
            .execute_transaction(&tx, &BlockEnv::new(1, 1), &mut ledger, &mut receipts)
            .await;

        assert_eq!(receipt.error.as_deref(), Some("Address bob is not a valid contract"));
    }

    #[tokio::test]
    async fn test_reserved_name_is_rejected_before_lookup() {
        let engine = engine();
        let mut ledger = funded("alice", 5);
        let mut receipts = ReceiptLedger::new();

        let tx = Transaction::call(
            Address::from("alice"),
            Address::from("contract_missing"),
            "getState",
            vec![],
            0,
            0,
            0,
        );
        let receipt = engine
            .execute_transaction(&tx, &BlockEnv::new(1, 1), &mut ledger, &mut receipts)
            .await;

        assert_eq!(
            receipt.error.as_deref(),
            Some("Calling this method directly is not allowed: getState")
        );
    }

    #[tokio::test]
    async fn test_repeated_transaction_runs_once() {
        let engine = engine();
        let mut ledger = funded("alice", 100);
        let mut receipts = ReceiptLedger::new();

        let tx = Transaction::transfer(Address::from("alice"), Address::from("bob"), 10, 1, 0);
        let block = Block::new(1, Default::default(), 5, vec![tx.clone(), tx.clone()]);
        let outcome = engine.execute_block(&block, &mut ledger, &mut receipts).await;

        assert_eq!(outcome.succeeded(), 1);
        assert_eq!(
            outcome.receipts[1].error,
            Some(format!("Transaction {} was already executed", tx.hash))
        );
        assert_eq!(ledger.balance_of(&Address::from("alice")), 89);
        assert_eq!(ledger.balance_of(&Address::from("bob")), 10);
        // the first outcome stays on file
        assert!(receipts.get(&tx.hash).unwrap().is_success());
    }

    #[tokio::test]
    async fn test_unverified_transaction_is_rejected() {
        struct RejectAll;
        impl SignatureVerifier for RejectAll {
            fn verify(&self, _tx: &Transaction) -> bool {
                false
            }
        }

        let registry = VmRegistry::with_default_backends(ExecutionLimits::for_testing()).unwrap();
        let engine =
            TransactionEngine::with_verifier(Arc::new(registry), EngineConfig::default(), Arc::new(RejectAll));
        let mut ledger = funded("alice", 100);
        let before = ledger.clone();
        let mut receipts = ReceiptLedger::new();

        let tx = Transaction::transfer(Address::from("alice"), Address::from("bob"), 50, 0, 0);
        let receipt = engine
            .execute_transaction(&tx, &BlockEnv::new(1, 1), &mut ledger, &mut receipts)
            .await;

        assert_eq!(receipt.error.as_deref(), Some("Invalid signature"));
        assert_eq!(ledger, before);
    }

    #[tokio::test]
    async fn test_empty_block_still_pays_reward() {
        let engine = engine();
        let mut ledger = LedgerState::with_miner(engine.miner_address());
        let mut receipts = ReceiptLedger::new();

        let block = Block::new(1, Default::default(), 7, vec![]);
        let outcome = engine.execute_block(&block, &mut ledger, &mut receipts).await;

        assert_eq!(outcome.reward, 10);
        assert_eq!(ledger.balance_of(engine.miner_address()), 10);
        assert!(receipts.is_empty());
    }
}
