//! Transaction attachments — the type-specific payload of a transaction.
//!
//! The attachment determines the transaction's type and subtype codes on the
//! wire and carries the rules for validation, in-block duplicate detection,
//! and state application.

use crate::codec::ByteReader;
use crate::error::ValidationError;
use ignis_types::AccountId;
use serde_json::{Map, Value};

/// Type code for payment transactions.
pub const TYPE_PAYMENT: u8 = 0;
/// Type code for messaging transactions (messages and alias assignments).
pub const TYPE_MESSAGING: u8 = 1;

const SUBTYPE_PAYMENT_ORDINARY: u8 = 0;
const SUBTYPE_MESSAGING_ARBITRARY_MESSAGE: u8 = 0;
const SUBTYPE_MESSAGING_ALIAS_ASSIGNMENT: u8 = 1;

/// Maximum alias name length in characters.
pub const MAX_ALIAS_LENGTH: usize = 100;
/// Maximum alias URI length in characters.
pub const MAX_ALIAS_URI_LENGTH: usize = 1000;

/// Attachment format version written before version-1 attachment bodies.
const ATTACHMENT_VERSION: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attachment {
    /// A plain value transfer.
    OrdinaryPayment,
    /// A transaction whose only payload is its message appendage.
    ArbitraryMessage,
    /// Claims or reassigns an alias name for the sender.
    AliasAssignment { alias: String, uri: String },
}

impl Attachment {
    pub fn type_code(&self) -> u8 {
        match self {
            Self::OrdinaryPayment => TYPE_PAYMENT,
            Self::ArbitraryMessage | Self::AliasAssignment { .. } => TYPE_MESSAGING,
        }
    }

    pub fn subtype_code(&self) -> u8 {
        match self {
            Self::OrdinaryPayment => SUBTYPE_PAYMENT_ORDINARY,
            Self::ArbitraryMessage => SUBTYPE_MESSAGING_ARBITRARY_MESSAGE,
            Self::AliasAssignment { .. } => SUBTYPE_MESSAGING_ALIAS_ASSIGNMENT,
        }
    }

    /// Whether this attachment writes any body bytes beyond its type codes.
    fn has_body(&self) -> bool {
        matches!(self, Self::AliasAssignment { .. })
    }

    pub fn size(&self, tx_version: u8) -> usize {
        match self {
            Self::OrdinaryPayment | Self::ArbitraryMessage => 0,
            Self::AliasAssignment { alias, uri } => {
                let version_byte = if tx_version > 0 { 1 } else { 0 };
                version_byte + 1 + alias.len() + 2 + uri.len()
            }
        }
    }

    pub fn put_bytes(&self, buffer: &mut Vec<u8>, tx_version: u8) {
        if !self.has_body() {
            return;
        }
        if tx_version > 0 {
            buffer.push(ATTACHMENT_VERSION);
        }
        if let Self::AliasAssignment { alias, uri } = self {
            buffer.push(alias.len() as u8);
            buffer.extend_from_slice(alias.as_bytes());
            buffer.extend_from_slice(&(uri.len() as u16).to_le_bytes());
            buffer.extend_from_slice(uri.as_bytes());
        }
    }

    /// Decode the attachment for given type/subtype codes.
    pub fn from_bytes(
        type_code: u8,
        subtype_code: u8,
        reader: &mut ByteReader<'_>,
        tx_version: u8,
    ) -> Result<Self, ValidationError> {
        match (type_code, subtype_code) {
            (TYPE_PAYMENT, SUBTYPE_PAYMENT_ORDINARY) => Ok(Self::OrdinaryPayment),
            (TYPE_MESSAGING, SUBTYPE_MESSAGING_ARBITRARY_MESSAGE) => Ok(Self::ArbitraryMessage),
            (TYPE_MESSAGING, SUBTYPE_MESSAGING_ALIAS_ASSIGNMENT) => {
                if tx_version > 0 {
                    let version = reader.u8()?;
                    if version != ATTACHMENT_VERSION {
                        return Err(ValidationError::not_valid(format!(
                            "unsupported attachment version {version}"
                        )));
                    }
                }
                let alias_len = reader.u8()? as usize;
                let alias = String::from_utf8(reader.take(alias_len)?.to_vec())
                    .map_err(|_| ValidationError::not_valid("alias is not UTF-8"))?;
                let uri_len = reader.u16()? as usize;
                let uri = String::from_utf8(reader.take(uri_len)?.to_vec())
                    .map_err(|_| ValidationError::not_valid("alias URI is not UTF-8"))?;
                Ok(Self::AliasAssignment { alias, uri })
            }
            _ => Err(ValidationError::not_valid(format!(
                "unknown transaction type {type_code}.{subtype_code}"
            ))),
        }
    }

    pub fn put_json(&self, attachment: &mut Map<String, Value>) {
        if let Self::AliasAssignment { alias, uri } = self {
            attachment.insert("alias".into(), Value::String(alias.clone()));
            attachment.insert("uri".into(), Value::String(uri.clone()));
        }
    }

    pub fn from_json(
        type_code: u8,
        subtype_code: u8,
        attachment: &Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        match (type_code, subtype_code) {
            (TYPE_PAYMENT, SUBTYPE_PAYMENT_ORDINARY) => Ok(Self::OrdinaryPayment),
            (TYPE_MESSAGING, SUBTYPE_MESSAGING_ARBITRARY_MESSAGE) => Ok(Self::ArbitraryMessage),
            (TYPE_MESSAGING, SUBTYPE_MESSAGING_ALIAS_ASSIGNMENT) => {
                let alias = attachment
                    .get("alias")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ValidationError::not_valid("missing alias name"))?;
                let uri = attachment
                    .get("uri")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok(Self::AliasAssignment {
                    alias: alias.to_string(),
                    uri: uri.to_string(),
                })
            }
            _ => Err(ValidationError::not_valid(format!(
                "unknown transaction type {type_code}.{subtype_code}"
            ))),
        }
    }

    /// Type-specific validation rules.
    pub fn validate(&self, amount_nqt: u64, recipient: AccountId) -> Result<(), ValidationError> {
        match self {
            Self::OrdinaryPayment => {
                if amount_nqt == 0 {
                    return Err(ValidationError::not_valid("payment of zero amount"));
                }
                if recipient.is_zero() {
                    return Err(ValidationError::not_valid("payment without recipient"));
                }
                Ok(())
            }
            Self::ArbitraryMessage => {
                if amount_nqt != 0 {
                    return Err(ValidationError::not_valid("message carries an amount"));
                }
                Ok(())
            }
            Self::AliasAssignment { alias, uri } => {
                if amount_nqt != 0 {
                    return Err(ValidationError::not_valid("alias assignment carries an amount"));
                }
                if !recipient.is_zero() {
                    return Err(ValidationError::not_valid("alias assignment has a recipient"));
                }
                if alias.is_empty() || alias.len() > MAX_ALIAS_LENGTH {
                    return Err(ValidationError::not_valid("alias length out of range"));
                }
                if !alias.chars().all(|c| c.is_ascii_alphanumeric()) {
                    return Err(ValidationError::not_valid("alias has non-alphanumeric characters"));
                }
                if uri.len() > MAX_ALIAS_URI_LENGTH {
                    return Err(ValidationError::not_valid("alias URI too long"));
                }
                Ok(())
            }
        }
    }

    /// Key that must be unique within a block for this attachment's type
    /// bucket, or `None` when the type has no in-block uniqueness rule.
    pub fn duplicate_key(&self) -> Option<String> {
        match self {
            Self::AliasAssignment { alias, .. } => Some(alias.to_lowercase()),
            _ => None,
        }
    }
}

/// Tracks per-block duplicate transactions by type bucket.
///
/// Each transaction type contributes discriminating keys (e.g. the alias
/// name); a second transaction hitting the same key in the same block is a
/// duplicate and the block is rejected.
#[derive(Default)]
pub struct DuplicateTracker {
    seen: std::collections::HashMap<(u8, u8), std::collections::HashSet<String>>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the attachment collides with one already admitted.
    pub fn is_duplicate(&mut self, attachment: &Attachment) -> bool {
        let Some(key) = attachment.duplicate_key() else {
            return false;
        };
        let bucket = (attachment.type_code(), attachment.subtype_code());
        !self.seen.entry(bucket).or_default().insert(key)
    }
}
