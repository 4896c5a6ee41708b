//! Optional transaction appendages.
//!
//! A version-1 transaction may carry up to four appendages after its
//! attachment: a plain message, an encrypted message, a public-key
//! announcement for the recipient, and a message encrypted to the sender
//! itself. Appendages serialize in that fixed order, each prefixed with a
//! one-byte appendix version. Version-0 transactions carry no appendages.

use crate::codec::ByteReader;
use crate::error::ValidationError;
use ignis_types::PublicKey;
use serde_json::{json, Map, Value};

/// Appendix format version written before each appendage body.
const APPENDIX_VERSION: u8 = 1;

/// Maximum plain or encrypted message length in bytes.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Length flag bit marking a message as UTF-8 text rather than binary.
const TEXT_FLAG: u32 = 0x8000_0000;

fn read_flagged_bytes(reader: &mut ByteReader<'_>) -> Result<(Vec<u8>, bool), ValidationError> {
    let flagged = reader.u32()?;
    let is_text = flagged & TEXT_FLAG != 0;
    let length = (flagged & !TEXT_FLAG) as usize;
    if length > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::not_valid(format!(
            "message length {length} exceeds maximum"
        )));
    }
    Ok((reader.take(length)?.to_vec(), is_text))
}

fn put_flagged_bytes(buffer: &mut Vec<u8>, data: &[u8], is_text: bool) {
    let mut flagged = data.len() as u32;
    if is_text {
        flagged |= TEXT_FLAG;
    }
    buffer.extend_from_slice(&flagged.to_le_bytes());
    buffer.extend_from_slice(data);
}

fn read_appendix_version(reader: &mut ByteReader<'_>) -> Result<(), ValidationError> {
    let version = reader.u8()?;
    if version != APPENDIX_VERSION {
        return Err(ValidationError::not_valid(format!(
            "unsupported appendix version {version}"
        )));
    }
    Ok(())
}

fn message_json(data: &[u8], is_text: bool) -> Value {
    if is_text {
        Value::String(String::from_utf8_lossy(data).into_owned())
    } else {
        Value::String(hex::encode(data))
    }
}

fn message_from_json(value: &Value, is_text: bool) -> Result<Vec<u8>, ValidationError> {
    let s = value
        .as_str()
        .ok_or_else(|| ValidationError::not_valid("message must be a string"))?;
    if is_text {
        Ok(s.as_bytes().to_vec())
    } else {
        hex::decode(s).map_err(|_| ValidationError::not_valid("message is not valid hex"))
    }
}

/// A plain (unencrypted) message attached to a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageAppendix {
    pub message: Vec<u8>,
    pub is_text: bool,
}

impl MessageAppendix {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into_bytes(),
            is_text: true,
        }
    }

    pub fn size(&self) -> usize {
        1 + 4 + self.message.len()
    }

    pub fn put_bytes(&self, buffer: &mut Vec<u8>) {
        buffer.push(APPENDIX_VERSION);
        put_flagged_bytes(buffer, &self.message, self.is_text);
    }

    pub fn from_bytes(reader: &mut ByteReader<'_>) -> Result<Self, ValidationError> {
        read_appendix_version(reader)?;
        let (message, is_text) = read_flagged_bytes(reader)?;
        Ok(Self { message, is_text })
    }

    pub fn put_json(&self, attachment: &mut Map<String, Value>) {
        attachment.insert("message".into(), message_json(&self.message, self.is_text));
        attachment.insert("messageIsText".into(), Value::Bool(self.is_text));
    }

    pub fn from_json(attachment: &Map<String, Value>) -> Result<Option<Self>, ValidationError> {
        let Some(value) = attachment.get("message") else {
            return Ok(None);
        };
        let is_text = attachment
            .get("messageIsText")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        Ok(Some(Self {
            message: message_from_json(value, is_text)?,
            is_text,
        }))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.message.len() > MAX_MESSAGE_LENGTH {
            return Err(ValidationError::not_valid("message too long"));
        }
        Ok(())
    }
}

/// Ciphertext plus the nonce it was sealed with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedData {
    pub data: Vec<u8>,
    pub nonce: [u8; 32],
    pub is_text: bool,
}

impl EncryptedData {
    fn size(&self) -> usize {
        4 + self.data.len() + 32
    }

    fn put_bytes(&self, buffer: &mut Vec<u8>) {
        put_flagged_bytes(buffer, &self.data, self.is_text);
        buffer.extend_from_slice(&self.nonce);
    }

    fn from_bytes(reader: &mut ByteReader<'_>) -> Result<Self, ValidationError> {
        let (data, is_text) = read_flagged_bytes(reader)?;
        let nonce = reader.array_32()?;
        Ok(Self { data, nonce, is_text })
    }

    fn to_json(&self) -> Value {
        json!({
            "data": hex::encode(&self.data),
            "nonce": hex::encode(self.nonce),
            "isText": self.is_text,
        })
    }

    fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValidationError::not_valid("encrypted data must be an object"))?;
        let data = obj
            .get("data")
            .and_then(Value::as_str)
            .and_then(|s| hex::decode(s).ok())
            .ok_or_else(|| ValidationError::not_valid("missing encrypted data"))?;
        let nonce_bytes = obj
            .get("nonce")
            .and_then(Value::as_str)
            .and_then(|s| hex::decode(s).ok())
            .ok_or_else(|| ValidationError::not_valid("missing encryption nonce"))?;
        let nonce: [u8; 32] = nonce_bytes
            .try_into()
            .map_err(|_| ValidationError::not_valid("nonce must be 32 bytes"))?;
        let is_text = obj.get("isText").and_then(Value::as_bool).unwrap_or(false);
        Ok(Self { data, nonce, is_text })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.data.len() > MAX_MESSAGE_LENGTH {
            return Err(ValidationError::not_valid("encrypted message too long"));
        }
        Ok(())
    }
}

/// A message encrypted to the transaction recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedMessageAppendix(pub EncryptedData);

/// A message encrypted by the sender to itself (a note-to-self).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptToSelfMessageAppendix(pub EncryptedData);

macro_rules! encrypted_appendix {
    ($name:ident, $json_key:literal) => {
        impl $name {
            pub fn size(&self) -> usize {
                1 + self.0.size()
            }

            pub fn put_bytes(&self, buffer: &mut Vec<u8>) {
                buffer.push(APPENDIX_VERSION);
                self.0.put_bytes(buffer);
            }

            pub fn from_bytes(reader: &mut ByteReader<'_>) -> Result<Self, ValidationError> {
                read_appendix_version(reader)?;
                Ok(Self(EncryptedData::from_bytes(reader)?))
            }

            pub fn put_json(&self, attachment: &mut Map<String, Value>) {
                attachment.insert($json_key.into(), self.0.to_json());
            }

            pub fn from_json(
                attachment: &Map<String, Value>,
            ) -> Result<Option<Self>, ValidationError> {
                match attachment.get($json_key) {
                    Some(value) => Ok(Some(Self(EncryptedData::from_json(value)?))),
                    None => Ok(None),
                }
            }

            pub fn validate(&self) -> Result<(), ValidationError> {
                self.0.validate()
            }
        }
    };
}

encrypted_appendix!(EncryptedMessageAppendix, "encryptedMessage");
encrypted_appendix!(EncryptToSelfMessageAppendix, "encryptToSelfMessage");

/// Announces the recipient account's public key so it can be bound on apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyAnnouncementAppendix {
    pub public_key: PublicKey,
}

impl PublicKeyAnnouncementAppendix {
    pub fn size(&self) -> usize {
        1 + 32
    }

    pub fn put_bytes(&self, buffer: &mut Vec<u8>) {
        buffer.push(APPENDIX_VERSION);
        buffer.extend_from_slice(&self.public_key.0);
    }

    pub fn from_bytes(reader: &mut ByteReader<'_>) -> Result<Self, ValidationError> {
        read_appendix_version(reader)?;
        Ok(Self {
            public_key: PublicKey(reader.array_32()?),
        })
    }

    pub fn put_json(&self, attachment: &mut Map<String, Value>) {
        attachment.insert(
            "recipientPublicKey".into(),
            Value::String(self.public_key.to_string()),
        );
    }

    pub fn from_json(attachment: &Map<String, Value>) -> Result<Option<Self>, ValidationError> {
        let Some(value) = attachment.get("recipientPublicKey") else {
            return Ok(None);
        };
        let key = value
            .as_str()
            .and_then(PublicKey::parse_hex)
            .ok_or_else(|| ValidationError::not_valid("malformed recipient public key"))?;
        Ok(Some(Self { public_key: key }))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.public_key == PublicKey::EMPTY {
            return Err(ValidationError::not_valid("empty announced public key"));
        }
        Ok(())
    }
}
