//! Transactions and block environment
//!
//! A transaction is created by a submitter, admitted to the pool once its
//! signature verifies, and consumed exactly once by block execution. The
//! only field ever rewritten after admission is `to`, set by the engine when
//! a deployment assigns a fresh contract address.

use serde::{Deserialize, Serialize};

use crate::primitives::{blake3_hash, Address, Amount, BlockHeight, ExecutionMode, TxHash};
use crate::value::Value;

/// Call or deployment payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TxData {
    /// Member to invoke on `to`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
    /// Backend for a deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    /// Base64 deployment payload, see `lib_contracts::source`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

impl TxData {
    pub fn call(name: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            name: Some(name.into()),
            params,
            ..Default::default()
        }
    }

    pub fn deploy(mode: ExecutionMode, src: impl Into<String>) -> Self {
        Self {
            mode: Some(mode),
            src: Some(src.into()),
            ..Default::default()
        }
    }
}

/// What a transaction asks the engine to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    Deployment,
    Call,
    Transfer,
}

/// Signed ledger transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: TxHash,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Amount,
    #[serde(default)]
    pub fee: Amount,
    /// Distinguishes otherwise identical transactions from the same sender
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub data: TxData,
    #[serde(default, with = "hex_bytes")]
    pub signature: Vec<u8>,
}

/// Fields covered by the transaction hash
#[derive(Serialize)]
struct SignableFields<'a> {
    from: &'a Address,
    to: &'a Option<Address>,
    value: Amount,
    fee: Amount,
    nonce: u64,
    data: &'a TxData,
}

impl Transaction {
    /// Build an unsigned transaction with its hash filled in
    pub fn new(
        from: Address,
        to: Option<Address>,
        value: Amount,
        fee: Amount,
        nonce: u64,
        data: TxData,
    ) -> Self {
        let mut tx = Self {
            hash: TxHash::zero(),
            from,
            to,
            value,
            fee,
            nonce,
            data,
            signature: Vec::new(),
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Plain value transfer
    pub fn transfer(from: Address, to: Address, value: Amount, fee: Amount, nonce: u64) -> Self {
        Self::new(from, Some(to), value, fee, nonce, TxData::default())
    }

    /// Contract deployment carrying an encoded payload
    pub fn deployment(
        from: Address,
        mode: ExecutionMode,
        payload: impl Into<String>,
        fee: Amount,
        nonce: u64,
    ) -> Self {
        Self::new(from, None, 0, fee, nonce, TxData::deploy(mode, payload))
    }

    /// Contract call
    pub fn call(
        from: Address,
        contract: Address,
        name: impl Into<String>,
        params: Vec<Value>,
        value: Amount,
        fee: Amount,
        nonce: u64,
    ) -> Self {
        Self::new(from, Some(contract), value, fee, nonce, TxData::call(name, params))
    }

    /// BLAKE3 over the canonical JSON of the signable fields.
    ///
    /// `to` is included as submitted, so the hash is stable even after the
    /// engine assigns a contract address to a deployment's working copy.
    pub fn compute_hash(&self) -> TxHash {
        let fields = SignableFields {
            from: &self.from,
            to: &self.to,
            value: self.value,
            fee: self.fee,
            nonce: self.nonce,
            data: &self.data,
        };
        // Serializing plain structs and BTreeMaps cannot fail
        let encoded = serde_json::to_vec(&fields).unwrap_or_default();
        TxHash::new(blake3_hash(&encoded))
    }

    /// Attach a signature produced over `hash`
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    /// No prior `to` and carries source
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none() && self.data.src.is_some()
    }

    /// Names a member on an explicit target
    pub fn is_contract_call(&self) -> bool {
        self.data.name.is_some() && self.to.is_some()
    }

    pub fn kind(&self) -> TxKind {
        if self.is_contract_creation() {
            TxKind::Deployment
        } else if self.is_contract_call() {
            TxKind::Call
        } else {
            TxKind::Transfer
        }
    }
}

/// Block fields visible to executing transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockEnv {
    pub number: BlockHeight,
    pub timestamp: u64,
}

impl BlockEnv {
    pub fn new(number: BlockHeight, timestamp: u64) -> Self {
        Self { number, timestamp }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let alice = Address::from("alice");
        let deploy = Transaction::deployment(alice.clone(), ExecutionMode::SCRIPT, "e30=", 0, 0);
        assert_eq!(deploy.kind(), TxKind::Deployment);

        let call = Transaction::call(
            alice.clone(),
            Address::from("contract_x"),
            "bump",
            vec![],
            0,
            0,
            1,
        );
        assert_eq!(call.kind(), TxKind::Call);

        let transfer = Transaction::transfer(alice, Address::from("bob"), 5, 1, 2);
        assert_eq!(transfer.kind(), TxKind::Transfer);
    }

    #[test]
    fn test_hash_ignores_signature_and_covers_nonce() {
        let a = Transaction::transfer(Address::from("alice"), Address::from("bob"), 5, 1, 0);
        let signed = a.clone().with_signature(vec![9; 64]);
        assert_eq!(a.hash, signed.compute_hash());

        let b = Transaction::transfer(Address::from("alice"), Address::from("bob"), 5, 1, 1);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_signature_serializes_as_hex() {
        let tx = Transaction::transfer(Address::from("alice"), Address::from("bob"), 1, 0, 0)
            .with_signature(vec![0xab, 0xcd]);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["signature"], "abcd");

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}
