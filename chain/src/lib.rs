//! Block and transaction domain model for the Ignis protocol.
//!
//! Canonical byte and JSON codecs, signing, proof-of-stake forging math,
//! genesis construction, and the height-versioned account and alias ledgers
//! that project chain state.

pub mod account;
pub mod alias;
pub mod appendix;
pub mod apply;
pub mod attachment;
pub mod block;
pub mod codec;
pub mod derived;
pub mod error;
pub mod forge;
pub mod genesis;
pub mod transaction;

pub use account::{AccountLedger, AccountState};
pub use alias::{AliasEntry, AliasLedger};
pub use apply::TransactionApplier;
pub use attachment::{Attachment, DuplicateTracker};
pub use block::{Block, GENESIS_BLOCK_VERSION};
pub use derived::DerivedTable;
pub use error::ValidationError;
pub use transaction::{Transaction, TransactionBuilder};
