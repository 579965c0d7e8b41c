//! Admission signature check
//!
//! User addresses are the hex encoding of an ed25519 public key. The
//! signature covers the 32-byte transaction hash, and the hash itself must
//! match the transaction's fields.

use ed25519_dalek::{Keypair, PublicKey, Signature, Signer, Verifier};

use lib_types::{Address, Transaction};

/// Decides whether a transaction's `from` authorized it
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, tx: &Transaction) -> bool;
}

/// Ed25519 over the transaction hash, keyed by the hex `from` address
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, tx: &Transaction) -> bool {
        if tx.compute_hash() != tx.hash {
            return false;
        }

        let pk_bytes = match hex::decode(tx.from.as_str()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let public = match PublicKey::from_bytes(&pk_bytes) {
            Ok(pk) => pk,
            Err(_) => return false,
        };
        let signature = match Signature::from_bytes(&tx.signature) {
            Ok(sig) => sig,
            Err(_) => return false,
        };

        public.verify(tx.hash.as_bytes(), &signature).is_ok()
    }
}

/// Accepts every transaction. Local development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllVerifier;

impl SignatureVerifier for AcceptAllVerifier {
    fn verify(&self, _tx: &Transaction) -> bool {
        true
    }
}

/// Address derived from an ed25519 public key
pub fn address_from_public_key(public: &PublicKey) -> Address {
    Address::new(hex::encode(public.as_bytes()))
}

/// Sign `tx.hash` with `keypair`
pub fn sign_transaction(tx: Transaction, keypair: &Keypair) -> Transaction {
    let signature = keypair.sign(tx.hash.as_bytes());
    tx.with_signature(signature.to_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SecretKey;

    fn keypair(seed: u8) -> Keypair {
        let secret = SecretKey::from_bytes(&[seed; 32]).unwrap();
        let public: PublicKey = (&secret).into();
        Keypair { secret, public }
    }

    #[test]
    fn test_valid_signature_verifies() {
        let kp = keypair(7);
        let from = address_from_public_key(&kp.public);
        let tx = sign_transaction(
            Transaction::transfer(from, Address::from("bob"), 1, 1, 0),
            &kp,
        );
        assert!(Ed25519Verifier.verify(&tx));
    }

    #[test]
    fn test_signature_from_other_key_is_rejected() {
        let owner = keypair(7);
        let forger = keypair(8);
        let from = address_from_public_key(&owner.public);
        let tx = sign_transaction(
            Transaction::transfer(from, Address::from("bob"), 1, 1, 0),
            &forger,
        );
        assert!(!Ed25519Verifier.verify(&tx));
    }

    #[test]
    fn test_tampered_fields_are_rejected() {
        let kp = keypair(7);
        let from = address_from_public_key(&kp.public);
        let mut tx = sign_transaction(
            Transaction::transfer(from, Address::from("bob"), 1, 1, 0),
            &kp,
        );
        tx.value = 1_000;
        assert!(!Ed25519Verifier.verify(&tx));
    }

    #[test]
    fn test_non_key_address_is_rejected() {
        let tx = Transaction::transfer(Address::from("alice"), Address::from("bob"), 1, 1, 0)
            .with_signature(vec![0; 64]);
        assert!(!Ed25519Verifier.verify(&tx));
    }
}
