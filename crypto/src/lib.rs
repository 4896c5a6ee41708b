//! Cryptographic primitives for the Ignis protocol: SHA-256 hashing,
//! Ed25519 signatures, and secret-phrase key derivation.

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{sha256, sha256_multi, Digest, Sha256};
pub use keys::{
    account_id_from_public_key, keypair_from_secret_phrase, keypair_from_seed,
    public_key_from_secret_phrase,
};
pub use sign::{sign_message, verify_signature};
