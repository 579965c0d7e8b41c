//! Execution Contexts
//!
//! A context is everything a running compiled unit may touch. The access
//! level fixes what that is:
//!
//! | level      | storage                 | balances / transfer    | ledger   |
//! |------------|-------------------------|------------------------|----------|
//! | `Write`    | read-write, retained    | snapshot, may transfer | snapshot |
//! | `View`     | read, writes discarded  | live, read only        | live     |
//! | `Pure`     | none                    | none                   | none     |
//! | `Metadata` | none                    | none                   | none     |
//!
//! Storage writes are buffered in the context. Only a `Write` context hands
//! them back (`into_state_changes`); the engine copies them onto the
//! snapshot's account record.

use std::collections::BTreeMap;

use lib_types::{Address, Amount, BlockEnv, LedgerState, Transaction, TxHash, Value};

use crate::errors::{VmError, VmResult};
use crate::metadata::ContractMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Write,
    View,
    Pure,
    /// Non-executing harvest of compiled metadata
    Metadata,
}

impl AccessLevel {
    pub fn can_read_state(&self) -> bool {
        matches!(self, AccessLevel::Write | AccessLevel::View)
    }
}

/// Which member to invoke, on which contract, with what arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    pub address: Address,
    pub function: String,
    pub params: Vec<Value>,
}

impl CallTarget {
    pub fn new(address: Address, function: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            address,
            function: function.into(),
            params,
        }
    }

    /// Parameterless lifecycle hook invocation
    pub fn hook(address: Address, hook: &str) -> Self {
        Self::new(address, hook, Vec::new())
    }
}

/// Read-only transaction and block fields
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContractEnv {
    pub contract: Address,
    pub sender: Option<Address>,
    pub value: Amount,
    pub fee: Amount,
    pub tx_hash: Option<TxHash>,
    pub block: Option<BlockEnv>,
}

enum LedgerAccess<'a> {
    Snapshot(&'a mut LedgerState),
    Live(&'a LedgerState),
    Detached,
}

pub struct ExecutionContext<'a> {
    access: AccessLevel,
    target: CallTarget,
    env: ContractEnv,
    storage: BTreeMap<String, Value>,
    writes: BTreeMap<String, Value>,
    ledger: LedgerAccess<'a>,
    metadata: Option<ContractMetadata>,
}

impl<'a> ExecutionContext<'a> {
    /// State-mutating context scoped to a transaction's snapshot
    pub fn for_write(
        tx: &Transaction,
        block: &BlockEnv,
        snapshot: &'a mut LedgerState,
        target: CallTarget,
    ) -> Self {
        let storage = snapshot
            .get(&target.address)
            .map(|record| record.state.clone())
            .unwrap_or_default();
        let env = ContractEnv {
            contract: target.address.clone(),
            sender: Some(tx.from.clone()),
            value: tx.value,
            fee: tx.fee,
            tx_hash: Some(tx.hash),
            block: Some(*block),
        };

        Self {
            access: AccessLevel::Write,
            target,
            env,
            storage,
            writes: BTreeMap::new(),
            ledger: LedgerAccess::Snapshot(snapshot),
            metadata: None,
        }
    }

    /// Read-only context against committed state
    pub fn for_view(ledger: &'a LedgerState, target: CallTarget) -> Self {
        let storage = ledger
            .get(&target.address)
            .map(|record| record.state.clone())
            .unwrap_or_default();
        let env = ContractEnv {
            contract: target.address.clone(),
            ..Default::default()
        };

        Self {
            access: AccessLevel::View,
            target,
            env,
            storage,
            writes: BTreeMap::new(),
            ledger: LedgerAccess::Live(ledger),
            metadata: None,
        }
    }
}

impl ExecutionContext<'static> {
    /// Context with no ledger access at all
    pub fn for_pure(target: CallTarget) -> Self {
        Self::detached(AccessLevel::Pure, target)
    }

    /// Dummy context used only to harvest metadata
    pub fn for_metadata(address: Address) -> Self {
        Self::detached(AccessLevel::Metadata, CallTarget::new(address, "", Vec::new()))
    }

    fn detached(access: AccessLevel, target: CallTarget) -> Self {
        let env = ContractEnv {
            contract: target.address.clone(),
            ..Default::default()
        };

        Self {
            access,
            target,
            env,
            storage: BTreeMap::new(),
            writes: BTreeMap::new(),
            ledger: LedgerAccess::Detached,
            metadata: None,
        }
    }
}

impl<'a> ExecutionContext<'a> {
    pub fn access(&self) -> AccessLevel {
        self.access
    }

    pub fn target(&self) -> &CallTarget {
        &self.target
    }

    pub fn function(&self) -> &str {
        &self.target.function
    }

    pub fn params(&self) -> &[Value] {
        &self.target.params
    }

    pub fn env(&self) -> &ContractEnv {
        &self.env
    }

    // =========================================================================
    // Contract storage
    // =========================================================================

    pub fn get_state(&self, key: &str) -> VmResult<Option<Value>> {
        self.ensure_state_access("read storage")?;
        Ok(self
            .writes
            .get(key)
            .or_else(|| self.storage.get(key))
            .cloned())
    }

    /// Buffer a storage write. Under `View` the write is visible to the rest
    /// of the call and then dropped.
    pub fn set_state(&mut self, key: impl Into<String>, value: Value) -> VmResult<()> {
        self.ensure_state_access("write storage")?;
        self.writes.insert(key.into(), value);
        Ok(())
    }

    /// Storage as the contract currently sees it, buffered writes included
    pub fn storage_view(&self) -> VmResult<BTreeMap<String, Value>> {
        self.ensure_state_access("read storage")?;
        let mut merged = self.storage.clone();
        merged.extend(self.writes.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(merged)
    }

    fn ensure_state_access(&self, what: &str) -> VmResult<()> {
        if self.access.can_read_state() {
            Ok(())
        } else {
            Err(VmError::AccessDenied(format!(
                "cannot {} in a {:?} context",
                what, self.access
            )))
        }
    }

    // =========================================================================
    // Balances
    // =========================================================================

    pub fn balance_of(&self, address: &Address) -> VmResult<Amount> {
        match &self.ledger {
            LedgerAccess::Snapshot(ledger) => Ok(ledger.balance_of(address)),
            LedgerAccess::Live(ledger) => Ok(ledger.balance_of(address)),
            LedgerAccess::Detached => Err(VmError::AccessDenied(format!(
                "cannot read balances in a {:?} context",
                self.access
            ))),
        }
    }

    pub fn self_balance(&self) -> VmResult<Amount> {
        self.balance_of(&self.env.contract)
    }

    /// Move funds out of the executing contract. Only a write context can
    /// transfer, and only against its snapshot.
    pub fn transfer(&mut self, to: &Address, amount: Amount) -> VmResult<()> {
        match &mut self.ledger {
            LedgerAccess::Snapshot(ledger) => {
                ledger.transfer(&self.env.contract, to, amount)?;
                Ok(())
            }
            _ => Err(VmError::AccessDenied(format!(
                "cannot transfer in a {:?} context",
                self.access
            ))),
        }
    }

    // =========================================================================
    // Metadata harvest
    // =========================================================================

    pub fn set_metadata(&mut self, metadata: ContractMetadata) -> VmResult<()> {
        if self.access != AccessLevel::Metadata {
            return Err(VmError::AccessDenied(
                "metadata can only be recorded by a dummy context".to_string(),
            ));
        }
        self.metadata = Some(metadata);
        Ok(())
    }

    pub fn take_metadata(&mut self) -> Option<ContractMetadata> {
        self.metadata.take()
    }

    /// Release the ledger borrow and return the storage writes to persist.
    /// `None` for every level except `Write`.
    pub fn into_state_changes(self) -> Option<BTreeMap<String, Value>> {
        match self.access {
            AccessLevel::Write => Some(self.writes),
            _ => None,
        }
    }
}
