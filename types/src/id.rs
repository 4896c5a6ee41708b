//! Numeric identities for blocks, transactions, and accounts.
//!
//! Identities are 64-bit values taken from the first eight bytes
//! (little-endian) of the SHA-256 of an object's canonical bytes. On the wire
//! they travel as unsigned decimal strings. Zero is the "no id" sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const ZERO: Self = Self(0);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub fn value(&self) -> u64 {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == 0
            }

            /// Parse the unsigned decimal wire encoding.
            pub fn parse(s: &str) -> Result<Self, ParseIntError> {
                s.parse::<u64>().map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// Identity of a block, derived from the hash of its signed bytes.
    BlockId
}

id_type! {
    /// Identity of a transaction, derived from its full hash.
    TxId
}

id_type! {
    /// Identity of an account, derived from the hash of its public key.
    AccountId
}

/// Derive a 64-bit id from the leading bytes of a 32-byte hash.
pub fn id_from_hash_prefix(hash: &[u8; 32]) -> u64 {
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    u64::from_le_bytes(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_unsigned_decimal() {
        let id = BlockId::new(u64::MAX);
        assert_eq!(id.to_string(), "18446744073709551615");
    }

    #[test]
    fn parse_roundtrip() {
        let id = TxId::new(1234567890123456789);
        assert_eq!(TxId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn parse_rejects_negative() {
        assert!(BlockId::parse("-1").is_err());
    }

    #[test]
    fn id_from_hash_prefix_is_little_endian() {
        let mut hash = [0u8; 32];
        hash[0] = 0x01;
        hash[7] = 0x80;
        assert_eq!(id_from_hash_prefix(&hash), 0x8000_0000_0000_0001);
    }

    #[test]
    fn zero_is_sentinel() {
        assert!(BlockId::ZERO.is_zero());
        assert!(!BlockId::new(1).is_zero());
    }
}
