//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use lib_blockchain::{EngineConfig, ReceiptLedger, Receipt, TransactionEngine};
use lib_contracts::{encode_deploy_payload, ExecutionLimits, VmRegistry};
use lib_types::{Address, BlockEnv, ExecutionMode, LedgerState, Transaction};

/// Script contract exercising every engine path
pub const VAULT: &str = r#"{
    "name": "vault",
    "members": {
        "init": { "on": "deployed", "body": [ { "set": { "key": "count", "value": { "lit": 0 } } } ] },
        "thanks": { "on": "received", "body": [ { "set": { "key": "last_sender", "value": { "env": "sender" } } } ] },
        "bump": { "body": [
            { "set": { "key": "count", "value": { "add": [ { "state": "count" }, { "lit": 1 } ] } } },
            { "return": { "state": "count" } }
        ] },
        "bump_then_fail": { "body": [
            { "set": { "key": "count", "value": { "lit": 99 } } },
            { "fail": "rolled back" }
        ] },
        "deposit": { "payable": true, "body": [ { "return": { "env": "value" } } ] },
        "payout": { "body": [
            { "transfer": { "to": { "env": "sender" }, "amount": { "param": 0 } } },
            { "return": { "balance": { "env": "address" } } }
        ] },
        "count": { "view": true, "body": [ { "return": { "state": "count" } } ] },
        "scribble": { "view": true, "body": [
            { "set": { "key": "count", "value": { "lit": 1000 } } },
            { "return": { "state": "count" } }
        ] },
        "double": { "body": [ { "return": { "add": [ { "param": 0 }, { "param": 0 } ] } } ] }
    }
}"#;

/// Deployment hook that always fails
pub const BROKEN: &str = r#"{
    "name": "broken",
    "members": {
        "init": { "on": "deployed", "body": [ { "fail": "refusing to deploy" } ] },
        "noop": { "body": [] }
    }
}"#;

pub fn alice() -> Address {
    Address::from("alice")
}

pub fn bob() -> Address {
    Address::from("bob")
}

pub fn miner() -> Address {
    Address::from("miner")
}

pub fn block_env() -> BlockEnv {
    BlockEnv::new(1, 1_000)
}

pub fn engine() -> TransactionEngine {
    let registry = VmRegistry::with_default_backends(ExecutionLimits::for_testing())
        .expect("default backends");
    TransactionEngine::new(Arc::new(registry), EngineConfig::default())
}

pub fn funded_ledger(balances: &[(&str, u64)]) -> LedgerState {
    let mut ledger = LedgerState::with_miner(&miner());
    for (address, amount) in balances {
        ledger.credit(&Address::from(*address), *amount).unwrap();
    }
    ledger
}

pub fn script_deployment(from: Address, source: &str, nonce: u64) -> Transaction {
    let payload = encode_deploy_payload(ExecutionMode::SCRIPT, source.as_bytes());
    Transaction::deployment(from, ExecutionMode::SCRIPT, payload, 0, nonce)
}

/// Deploy `source` from alice and return the assigned address
pub async fn deploy_script(
    engine: &TransactionEngine,
    ledger: &mut LedgerState,
    receipts: &mut ReceiptLedger,
    source: &str,
    nonce: u64,
) -> (Receipt, Option<Address>) {
    let tx = script_deployment(alice(), source, nonce);
    let receipt = engine
        .execute_transaction(&tx, &block_env(), ledger, receipts)
        .await;
    let address = receipt.tx.to.clone();
    (receipt, address)
}
