//! Contract address derivation
//!
//! `contract_` + first 40 hex chars of
//! `blake3(deployer || 0x00 || tx_hash || deployment_sequence_be)`.
//!
//! The sequence lives in `LedgerState`, so a discarded snapshot also
//! discards the sequence bump and replaying the same blocks from the same
//! state yields the same addresses.

use lib_types::{Address, LedgerState, TxHash, CONTRACT_ADDRESS_PREFIX};

const ADDRESS_HEX_CHARS: usize = 40;

fn derive(deployer: &Address, tx_hash: &TxHash, sequence: u64) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(deployer.as_str().as_bytes());
    hasher.update(&[0u8]);
    hasher.update(tx_hash.as_bytes());
    hasher.update(&sequence.to_be_bytes());
    let digest = hex::encode(hasher.finalize().as_bytes());

    Address::new(format!(
        "{}{}",
        CONTRACT_ADDRESS_PREFIX,
        &digest[..ADDRESS_HEX_CHARS]
    ))
}

/// Allocate a fresh contract address on `state`, advancing its deployment
/// sequence until the derived address is unused.
pub fn allocate_contract_address(
    state: &mut LedgerState,
    deployer: &Address,
    tx_hash: &TxHash,
) -> Address {
    loop {
        let sequence = state.next_deployment_sequence();
        let candidate = derive(deployer, tx_hash, sequence);
        if !state.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::AccountRecord;

    #[test]
    fn test_addresses_are_prefixed_and_deterministic() {
        let deployer = Address::from("alice");
        let hash = TxHash::new([3u8; 32]);

        let mut a = LedgerState::new();
        let mut b = LedgerState::new();
        let first = allocate_contract_address(&mut a, &deployer, &hash);
        assert!(first.is_contract());
        assert_eq!(first.as_str().len(), CONTRACT_ADDRESS_PREFIX.len() + ADDRESS_HEX_CHARS);
        assert_eq!(first, allocate_contract_address(&mut b, &deployer, &hash));
    }

    #[test]
    fn test_same_sender_same_hash_never_collides() {
        let deployer = Address::from("alice");
        let hash = TxHash::new([3u8; 32]);
        let mut state = LedgerState::new();

        let first = allocate_contract_address(&mut state, &deployer, &hash);
        state.insert(first.clone(), AccountRecord::default());
        let second = allocate_contract_address(&mut state, &deployer, &hash);
        assert_ne!(first, second);
    }

    #[test]
    fn test_occupied_candidate_is_skipped() {
        let deployer = Address::from("alice");
        let hash = TxHash::new([5u8; 32]);

        let mut scratch = LedgerState::new();
        let taken = allocate_contract_address(&mut scratch, &deployer, &hash);

        let mut state = LedgerState::new();
        state.insert(taken.clone(), AccountRecord::with_balance(1));
        let fresh = allocate_contract_address(&mut state, &deployer, &hash);
        assert_ne!(fresh, taken);
        assert_eq!(state.deployments(), 2);
    }
}
