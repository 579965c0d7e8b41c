//! Canonical Primitive Types for the Ledger Node
//!
//! These types are the building blocks for every ledger-visible structure.
//! They are designed to be:
//! - Deterministically serializable
//! - Cheap to compare and order (all ledger maps are ordered)
//! - Free of behavior beyond construction and inspection

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Block number in the chain (genesis = 0)
pub type BlockHeight = u64;

/// Native token amounts
pub type Amount = u64;

/// Prefix that distinguishes system-generated contract addresses from
/// externally supplied user addresses.
pub const CONTRACT_ADDRESS_PREFIX: &str = "contract_";

/// Hash arbitrary bytes with BLAKE3
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

// ============================================================================
// HASH TYPES
// ============================================================================

/// 32-byte block hash
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// Create a new BlockHash from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a zeroed BlockHash
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the underlying bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for BlockHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// 32-byte transaction hash, the identity of a transaction and its receipt
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    /// Create a new TxHash from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a zeroed TxHash
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the underlying bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for TxHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for TxHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// ADDRESS
// ============================================================================

/// Opaque account identifier.
///
/// User addresses are supplied externally; contract addresses are generated
/// at deployment and always start with [`CONTRACT_ADDRESS_PREFIX`].
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this address belongs to the contract address space
    pub fn is_contract(&self) -> bool {
        self.0.starts_with(CONTRACT_ADDRESS_PREFIX)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// EXECUTION MODE
// ============================================================================

/// Tag selecting the compiler/runner/context-factory triple for a contract.
///
/// The set of modes is open; the engine never interprets the number itself.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ExecutionMode(pub u8);

impl ExecutionMode {
    /// JSON-manifest script contracts
    pub const SCRIPT: Self = Self(1);
    /// WebAssembly contracts. Deploy payloads for this mode carry raw bytes.
    pub const WASM: Self = Self(2);

    pub const fn new(tag: u8) -> Self {
        Self(tag)
    }

    pub const fn tag(&self) -> u8 {
        self.0
    }

    /// Whether deploy payloads for this mode decode to raw bytes rather than
    /// URL-escaped text
    pub fn carries_raw_bytes(&self) -> bool {
        *self == Self::WASM
    }
}

impl fmt::Debug for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionMode({})", self.0)
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ExecutionMode {
    fn from(tag: u8) -> Self {
        Self(tag)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_basics() {
        let hash = TxHash::new([2u8; 32]);
        assert!(!hash.is_zero());
        assert_eq!(hash.as_bytes(), &[2u8; 32]);
        assert!(TxHash::zero().is_zero());
    }

    #[test]
    fn test_contract_address_prefix() {
        assert!(Address::from("contract_abc").is_contract());
        assert!(!Address::from("alice").is_contract());
        assert!(!Address::from("miner").is_contract());
    }

    #[test]
    fn test_address_serializes_as_plain_string() {
        let addr = Address::from("alice");
        assert_eq!(serde_json::to_string(&addr).unwrap(), "\"alice\"");
    }

    #[test]
    fn test_raw_byte_mode() {
        assert!(ExecutionMode::WASM.carries_raw_bytes());
        assert!(!ExecutionMode::SCRIPT.carries_raw_bytes());
        assert!(!ExecutionMode::new(7).carries_raw_bytes());
    }

    #[test]
    fn test_blake3_is_deterministic() {
        assert_eq!(blake3_hash(b"ledger"), blake3_hash(b"ledger"));
        assert_ne!(blake3_hash(b"ledger"), blake3_hash(b"ledger2"));
    }
}
