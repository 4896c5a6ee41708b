//! Fundamental types for the Ignis protocol.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: numeric block/transaction/account identities, hashes, keys,
//! epoch timestamps, and the per-network chain parameters.

pub mod amount;
pub mod hash;
pub mod id;
pub mod keys;
pub mod network;
pub mod params;
pub mod time;

pub use hash::FullHash;
pub use id::{AccountId, BlockId, TxId};
pub use keys::{KeyPair, PublicKey, SecretSeed, Signature};
pub use network::NetworkId;
pub use params::ChainParams;
pub use time::{EpochClock, SystemClock, Timestamp};
