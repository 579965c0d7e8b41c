//! Wasm contracts through the full node: deployment, calls, the received
//! hook, contract-initiated transfers and trap rollback.

mod common;

use common::*;
use lib_blockchain::{Node, NodeConfig, ReceiptStatus};
use lib_contracts::encode_deploy_payload;
use lib_types::{Address, ExecutionMode, Transaction, Value};

const COUNTER_WAT: &str = include_str!("../../lib-contracts/tests/fixtures/counter.wat");

async fn node_with_counter() -> (Node, Address) {
    let node = Node::in_memory(NodeConfig::for_testing()).unwrap();
    node.fund(&alice(), 100).await.unwrap();

    let bytes = wat::parse_str(COUNTER_WAT).unwrap();
    let payload = encode_deploy_payload(ExecutionMode::WASM, &bytes);
    let deploy = Transaction::deployment(alice(), ExecutionMode::WASM, payload, 0, 0);
    let hash = node.add_transaction(deploy).await.unwrap();
    node.mine_block(1).await.unwrap();

    let receipt = node.receipt(&hash).await.unwrap();
    assert!(receipt.is_success(), "{:?}", receipt.error);
    (node, receipt.tx.to.unwrap())
}

async fn call(node: &Node, contract: &Address, name: &str, value: u64, nonce: u64) -> lib_blockchain::Receipt {
    let tx = Transaction::call(alice(), contract.clone(), name, vec![], value, 0, nonce);
    let hash = node.add_transaction(tx).await.unwrap();
    node.mine_block(nonce).await.unwrap();
    node.receipt(&hash).await.unwrap()
}

#[tokio::test]
async fn test_deployment_hook_initializes_storage() {
    let (node, contract) = node_with_counter().await;

    let ledger = node.ledger_snapshot().await;
    let record = ledger.get(&contract).unwrap();
    assert_eq!(record.mode, Some(ExecutionMode::WASM));
    assert_eq!(record.state.get("count"), Some(&Value::Int(0)));
}

#[tokio::test]
async fn test_call_commits_and_view_reads() {
    let (node, contract) = node_with_counter().await;

    let receipt = call(&node, &contract, "bump", 0, 1).await;
    assert_eq!(receipt.result, Some(Value::Int(1)));

    // view runs bump too, but nothing it writes survives
    assert_eq!(node.call_view(&contract, "bump", vec![]).await.unwrap(), Value::Int(2));
    assert_eq!(node.call_view(&contract, "bump", vec![]).await.unwrap(), Value::Int(2));
    assert_eq!(node.call_pure(&contract, "answer", vec![]).await.unwrap(), Value::Int(42));
}

#[tokio::test]
async fn test_received_hook_and_contract_transfer() {
    let (node, contract) = node_with_counter().await;

    // nothing to pay out yet: the module traps and the call reverts
    let receipt = call(&node, &contract, "pay", 0, 1).await;
    assert_eq!(receipt.status, ReceiptStatus::Error);

    let tx = Transaction::transfer(alice(), contract.clone(), 7, 0, 2);
    node.add_transaction(tx).await.unwrap();
    node.mine_block(2).await.unwrap();

    let ledger = node.ledger_snapshot().await;
    assert_eq!(ledger.get(&contract).unwrap().state.get("got"), Some(&Value::Bool(true)));
    assert_eq!(ledger.balance_of(&contract), 7);

    let receipt = call(&node, &contract, "pay", 0, 3).await;
    assert!(receipt.is_success(), "{:?}", receipt.error);
    assert_eq!(node.balance_of(&contract).await, 2);
    assert_eq!(node.balance_of(&alice()).await, 98);
}

#[tokio::test]
async fn test_traps_and_fuel_exhaustion_revert() {
    let (node, contract) = node_with_counter().await;
    let before = node.ledger_snapshot().await;

    for (nonce, name) in ["boom", "spin", "missing"].iter().enumerate() {
        let receipt = call(&node, &contract, name, 0, nonce as u64 + 1).await;
        assert_eq!(receipt.status, ReceiptStatus::Error, "{} should fail", name);
    }

    let after = node.ledger_snapshot().await;
    assert_eq!(after.get(&contract), before.get(&contract));
    assert_eq!(after.balance_of(&alice()), before.balance_of(&alice()));
}

#[tokio::test]
async fn test_callable_members_come_from_exports() {
    let (node, contract) = node_with_counter().await;

    let members = node.callable_members(&contract).await.unwrap();
    assert_eq!(members, vec!["bump", "answer", "whoami", "pay", "boom", "spin"]);
}
