//! Processor error types.
//!
//! `BlockNotAccepted` mirrors the three ways a candidate block can be
//! refused: it does not chain onto the head (`OutOfOrder` — try another
//! peer), it is structurally or cryptographically invalid (`Invalid` —
//! blame the peer that sent it), or one of its transactions is at fault
//! (`Transaction` — the offender rides along so the generator can evict it
//! from the unconfirmed pool).

use ignis_chain::{Transaction, ValidationError};
use ignis_types::TxId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockNotAccepted {
    #[error("block out of order: {0}")]
    OutOfOrder(String),

    #[error("block not accepted: {0}")]
    Invalid(String),

    #[error("transaction {id} not accepted: {reason}")]
    Transaction {
        reason: String,
        id: TxId,
        transaction: Box<Transaction>,
    },
}

impl BlockNotAccepted {
    pub fn transaction(reason: impl Into<String>, tx: &Transaction) -> Self {
        Self::Transaction {
            reason: reason.into(),
            id: tx.id(),
            transaction: Box::new(tx.clone()),
        }
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    BlockNotAccepted(#[from] BlockNotAccepted),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("scan height {requested} exceeds current blockchain height {current}")]
    ScanHeightTooHigh { requested: u32, current: u32 },

    #[error("rollback to height {0} not supported")]
    RollbackNotSupported(u32),

    #[error("no block at height {0}")]
    UnknownHeight(u32),

    #[error("configuration error: {0}")]
    Config(String),
}
