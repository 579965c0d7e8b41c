//! Ledger State
//!
//! Pure data: the address → account table plus the deployment sequence used
//! for contract address derivation. Snapshots are plain deep copies
//! (`Clone`); whoever owns a snapshot either writes it back over the live
//! table or drops it.
//!
//! # Invariants
//!
//! - `src` is set iff the account is a contract, and `mode` iff `src`
//! - Balances never go negative (enforced by [`LedgerState::debit`])

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{BalanceError, BalanceResult};
use crate::primitives::{Address, Amount, ExecutionMode};
use crate::value::Value;

/// Contract code as produced by a mode's compiler.
///
/// Opaque to everything except the runner of the mode that produced it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CompiledUnit {
    pub code: Vec<u8>,
}

impl CompiledUnit {
    pub fn new(code: Vec<u8>) -> Self {
        Self { code }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledUnit({} bytes)", self.code.len())
    }
}

/// Account or contract record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AccountRecord {
    pub balance: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<CompiledUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_by: Option<Address>,
    /// Contract-private storage, only touched through an execution context
    #[serde(default)]
    pub state: BTreeMap<String, Value>,
}

impl AccountRecord {
    /// Plain user account with the given balance
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// Freshly deployed contract: zero balance, empty storage
    pub fn contract(mode: ExecutionMode, deployed_by: Address, src: CompiledUnit) -> Self {
        Self {
            balance: 0,
            src: Some(src),
            mode: Some(mode),
            deployed_by: Some(deployed_by),
            state: BTreeMap::new(),
        }
    }

    pub fn is_contract(&self) -> bool {
        self.src.is_some()
    }
}

/// Address → account table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LedgerState {
    accounts: BTreeMap<Address, AccountRecord>,
    /// Number of deployments ever attempted on this ledger generation
    deployments: u64,
}

impl LedgerState {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded with a zero-balance record for the miner account
    pub fn with_miner(miner: &Address) -> Self {
        let mut state = Self::new();
        state.insert(miner.clone(), AccountRecord::default());
        state
    }

    // =========================================================================
    // Record access
    // =========================================================================

    pub fn get(&self, address: &Address) -> Option<&AccountRecord> {
        self.accounts.get(address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut AccountRecord> {
        self.accounts.get_mut(address)
    }

    /// Load a record, creating an empty one if the address is unknown
    pub fn entry(&mut self, address: &Address) -> &mut AccountRecord {
        self.accounts.entry(address.clone()).or_default()
    }

    pub fn insert(&mut self, address: Address, record: AccountRecord) {
        self.accounts.insert(address, record);
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &AccountRecord)> {
        self.accounts.iter()
    }

    /// The compiled unit and mode of a deployed contract
    pub fn contract_code(&self, address: &Address) -> Option<(ExecutionMode, &CompiledUnit)> {
        let record = self.accounts.get(address)?;
        match (record.mode, record.src.as_ref()) {
            (Some(mode), Some(src)) => Some((mode, src)),
            _ => None,
        }
    }

    /// Contract addresses in ledger order, filtered by the address prefix
    pub fn contract_addresses(&self) -> Vec<Address> {
        self.accounts
            .keys()
            .filter(|addr| addr.is_contract())
            .cloned()
            .collect()
    }

    // =========================================================================
    // Deployment sequence
    // =========================================================================

    pub fn deployments(&self) -> u64 {
        self.deployments
    }

    /// Return the current deployment sequence number and advance it
    pub fn next_deployment_sequence(&mut self) -> u64 {
        let current = self.deployments;
        self.deployments = self.deployments.saturating_add(1);
        current
    }

    // =========================================================================
    // Balance primitives
    // =========================================================================

    /// Balance of an address, 0 if unknown
    pub fn balance_of(&self, address: &Address) -> Amount {
        self.accounts.get(address).map(|r| r.balance).unwrap_or(0)
    }

    /// Debit an address.
    ///
    /// # Errors
    /// - `InsufficientBalance` if the balance would go negative
    pub fn debit(&mut self, address: &Address, amount: Amount) -> BalanceResult<()> {
        if amount == 0 {
            return Ok(());
        }

        let have = self.balance_of(address);
        if have < amount {
            return Err(BalanceError::InsufficientBalance {
                address: address.clone(),
                have,
                need: amount,
            });
        }

        self.entry(address).balance = have - amount;
        Ok(())
    }

    /// Credit an address, creating its record if needed
    pub fn credit(&mut self, address: &Address, amount: Amount) -> BalanceResult<()> {
        if amount == 0 {
            return Ok(());
        }

        let record = self.entry(address);
        record.balance = record
            .balance
            .checked_add(amount)
            .ok_or_else(|| BalanceError::Overflow(address.clone()))?;
        Ok(())
    }

    /// Debit `from` and credit `to`
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> BalanceResult<()> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }
}
