//! Key derivation.
//!
//! Forging and signing keys are derived deterministically from a secret
//! phrase: the Ed25519 seed is the SHA-256 of the phrase bytes. Account
//! identities are derived from the public key hash.

use crate::hash::sha256;
use ed25519_dalek::SigningKey;
use ignis_types::id::id_from_hash_prefix;
use ignis_types::{AccountId, KeyPair, PublicKey, SecretSeed};

/// Derive a key pair from a 32-byte seed.
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing_key = SigningKey::from_bytes(seed);
    KeyPair {
        public: PublicKey(signing_key.verifying_key().to_bytes()),
        secret: SecretSeed(*seed),
    }
}

/// Derive a key pair from a secret phrase (seed = SHA-256 of the phrase).
pub fn keypair_from_secret_phrase(secret_phrase: &str) -> KeyPair {
    keypair_from_seed(&sha256(secret_phrase.as_bytes()))
}

/// Derive only the public key from a secret phrase.
pub fn public_key_from_secret_phrase(secret_phrase: &str) -> PublicKey {
    keypair_from_secret_phrase(secret_phrase).public
}

/// The numeric account id of a public key: first eight bytes of its SHA-256,
/// little-endian.
pub fn account_id_from_public_key(public_key: &PublicKey) -> AccountId {
    AccountId::new(id_from_hash_prefix(&sha256(&public_key.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_is_deterministic() {
        let a = keypair_from_secret_phrase("it was a bright cold day in april");
        let b = keypair_from_secret_phrase("it was a bright cold day in april");
        assert_eq!(a.public, b.public);
        assert_eq!(a.secret.0, b.secret.0);
    }

    #[test]
    fn different_phrases_different_keys() {
        let a = public_key_from_secret_phrase("phrase one");
        let b = public_key_from_secret_phrase("phrase two");
        assert_ne!(a, b);
    }

    #[test]
    fn account_id_nonzero_for_real_keys() {
        let key = public_key_from_secret_phrase("some account");
        assert!(!account_id_from_public_key(&key).is_zero());
    }

    #[test]
    fn account_id_deterministic() {
        let key = public_key_from_secret_phrase("stable");
        assert_eq!(
            account_id_from_public_key(&key),
            account_id_from_public_key(&key)
        );
    }
}
