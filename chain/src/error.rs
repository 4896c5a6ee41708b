//! Validation errors.
//!
//! Validation failures are split into two kinds: permanent invalidity
//! (`NotValid`) and conditions that may resolve with more chain state or
//! the passage of time (`NotCurrentlyValid`). Callers branch on the kind:
//! a block generator removes permanently invalid transactions from its pool
//! but merely skips not-currently-valid ones, and the download loop retries
//! later instead of blacklisting when a peer sends a not-yet-valid block.

use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum ValidationError {
    #[error("invalid: {0}")]
    NotValid(String),

    #[error("not currently valid: {0}")]
    NotCurrentlyValid(String),
}

impl ValidationError {
    pub fn not_valid(msg: impl Into<String>) -> Self {
        Self::NotValid(msg.into())
    }

    pub fn not_currently_valid(msg: impl Into<String>) -> Self {
        Self::NotCurrentlyValid(msg.into())
    }

    /// Whether this failure can never resolve on its own.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::NotValid(_))
    }
}
