//! Transaction Application - State Mutation Primitives
//!
//! The engine mutates a transaction's snapshot only through
//! [`StateMutator`].
//!
//! # Invariants
//!
//! - No negative balances (enforced by `LedgerState::debit`)
//! - Sender pays `value + fee`, recipient gains `value`, miner gains `fee`
//! - All changes are deterministic and reproducible

use std::collections::BTreeMap;

use lib_types::{AccountRecord, Address, Amount, LedgerState, Transaction, Value};

use super::errors::{TxApplyError, TxApplyResult};

/// Result of the value/fee movement of one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Total taken from the sender (`value + fee`)
    pub debited: Amount,
    /// Credited to the recipient
    pub credited: Amount,
    /// Credited to the miner
    pub fee: Amount,
}

/// State mutator - wraps a snapshot and provides controlled mutation primitives
pub struct StateMutator<'a> {
    state: &'a mut LedgerState,
}

impl<'a> StateMutator<'a> {
    pub fn new(state: &'a mut LedgerState) -> Self {
        Self { state }
    }

    // =========================================================================
    // Contract records
    // =========================================================================

    /// Install a freshly deployed contract record
    pub fn install_contract(&mut self, address: Address, record: AccountRecord) {
        self.state.insert(address, record);
    }

    /// Persist the storage writes a write context handed back
    pub fn apply_contract_state(
        &mut self,
        address: &Address,
        changes: BTreeMap<String, Value>,
    ) -> TxApplyResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let record = self
            .state
            .get_mut(address)
            .ok_or_else(|| TxApplyError::InvalidContractAddress(address.clone()))?;
        record.state.extend(changes);
        Ok(())
    }

    // =========================================================================
    // Balance Primitives
    // =========================================================================

    /// Debit `from` by `value + fee`, credit `to` by `value` and `miner` by
    /// `fee`.
    ///
    /// # Errors
    /// - `InsufficientBalance` if the sender cannot cover `value + fee`
    pub fn apply_value_transfer(
        &mut self,
        tx: &Transaction,
        miner: &Address,
    ) -> TxApplyResult<TransferOutcome> {
        let to = tx.to.as_ref().ok_or(TxApplyError::MissingRecipient)?;
        let total = tx
            .value
            .checked_add(tx.fee)
            .ok_or_else(|| TxApplyError::BalanceOverflow(tx.from.clone()))?;

        self.state.debit(&tx.from, total)?;
        self.state.credit(to, tx.value)?;
        self.state.credit(miner, tx.fee)?;

        Ok(TransferOutcome {
            debited: total,
            credited: tx.value,
            fee: tx.fee,
        })
    }

    /// Flat per-block reward, credited after every transaction resolved
    pub fn credit_block_reward(&mut self, miner: &Address, reward: Amount) -> TxApplyResult<()> {
        self.state.credit(miner, reward)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(address: &str, balance: Amount) -> LedgerState {
        let mut state = LedgerState::with_miner(&Address::from("miner"));
        state.credit(&Address::from(address), balance).unwrap();
        state
    }

    #[test]
    fn test_value_transfer_conserves_balances() {
        let mut state = funded("alice", 100);
        let tx = Transaction::transfer(Address::from("alice"), Address::from("bob"), 10, 1, 0);

        let outcome = StateMutator::new(&mut state)
            .apply_value_transfer(&tx, &Address::from("miner"))
            .unwrap();

        assert_eq!(outcome.debited, 11);
        assert_eq!(state.balance_of(&Address::from("alice")), 89);
        assert_eq!(state.balance_of(&Address::from("bob")), 10);
        assert_eq!(state.balance_of(&Address::from("miner")), 1);
    }

    #[test]
    fn test_underfunded_sender_is_rejected() {
        let mut state = funded("alice", 10);
        let tx = Transaction::transfer(Address::from("alice"), Address::from("bob"), 10, 1, 0);

        let err = StateMutator::new(&mut state)
            .apply_value_transfer(&tx, &Address::from("miner"))
            .unwrap_err();
        assert!(matches!(err, TxApplyError::InsufficientBalance { have: 10, need: 11, .. }));
        assert_eq!(state.balance_of(&Address::from("alice")), 10);
    }

    #[test]
    fn test_contract_state_requires_record() {
        let mut state = LedgerState::new();
        let mut changes = BTreeMap::new();
        changes.insert("k".to_string(), Value::Int(1));

        let err = StateMutator::new(&mut state)
            .apply_contract_state(&Address::from("contract_missing"), changes)
            .unwrap_err();
        assert!(matches!(err, TxApplyError::InvalidContractAddress(_)));
    }
}
