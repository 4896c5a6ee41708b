//! The 32-byte full hash of a transaction's signed bytes.

use crate::id::{id_from_hash_prefix, TxId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A full SHA-256 transaction hash. The numeric [`TxId`] is derived from its
/// first eight bytes; the full hash disambiguates id collisions when
/// transactions reference each other.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullHash([u8; 32]);

impl FullHash {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The numeric transaction id carried by this hash.
    pub fn to_tx_id(&self) -> TxId {
        TxId::new(id_from_hash_prefix(&self.0))
    }

    /// Parse the lower-hex wire encoding.
    pub fn parse_hex(s: &str) -> Option<Self> {
        if s.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Debug for FullHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FullHash(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "\u{2026})")
    }
}

impl fmt::Display for FullHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let hash = FullHash::new([0xAB; 32]);
        let parsed = FullHash::parse_hex(&hash.to_string()).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn parse_rejects_bad_length() {
        assert!(FullHash::parse_hex("abcd").is_none());
    }

    #[test]
    fn parse_rejects_non_hex() {
        let s = "zz".repeat(32);
        assert!(FullHash::parse_hex(&s).is_none());
    }

    #[test]
    fn tx_id_uses_hash_prefix() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x2A;
        let hash = FullHash::new(bytes);
        assert_eq!(hash.to_tx_id().value(), 0x2A);
    }
}
