//! Transactions: canonical bytes, JSON codec, signing, and validation.
//!
//! A transaction is immutable once included in an accepted block. Its
//! identity is derived from the full hash of its signed bytes. The canonical
//! byte encoding is version-aware: version 0 (pre-NQT) uses whole-coin
//! amounts and an 8-byte referenced-transaction id; version 1 uses NQT
//! amounts, a 32-byte referenced full hash, appendage flags, and the
//! EC-block reference. Byte round trips are stable for every transaction at
//! heights above the NQT milestone.

use crate::appendix::{
    EncryptToSelfMessageAppendix, EncryptedMessageAppendix, MessageAppendix,
    PublicKeyAnnouncementAppendix,
};
use crate::attachment::Attachment;
use crate::codec::ByteReader;
use crate::error::ValidationError;
use ignis_crypto::{account_id_from_public_key, sha256, sha256_multi, sign_message, verify_signature};
use ignis_types::amount::{nqt_to_coins, MAX_BALANCE_NQT, ONE_IGNIS};
use ignis_types::{AccountId, BlockId, FullHash, PublicKey, SecretSeed, Signature, Timestamp, TxId};
use serde_json::{Map, Value};

/// Maximum transaction deadline in minutes.
pub const MAX_DEADLINE_MINUTES: u16 = 1440;

const FLAG_MESSAGE: u32 = 1;
const FLAG_ENCRYPTED_MESSAGE: u32 = 1 << 1;
const FLAG_PUBLIC_KEY_ANNOUNCEMENT: u32 = 1 << 2;
const FLAG_ENCRYPT_TO_SELF: u32 = 1 << 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u8,
    pub timestamp: Timestamp,
    pub deadline: u16,
    pub sender_public_key: PublicKey,
    pub recipient_id: AccountId,
    pub amount_nqt: u64,
    pub fee_nqt: u64,
    pub referenced_transaction_full_hash: Option<FullHash>,
    pub attachment: Attachment,
    pub message: Option<MessageAppendix>,
    pub encrypted_message: Option<EncryptedMessageAppendix>,
    pub public_key_announcement: Option<PublicKeyAnnouncementAppendix>,
    pub encrypt_to_self_message: Option<EncryptToSelfMessageAppendix>,
    pub ec_block_height: u32,
    pub ec_block_id: BlockId,
    pub signature: Option<Signature>,
}

/// Step-wise construction of a [`Transaction`], mirroring how the forging
/// and wallet layers assemble one before signing.
pub struct TransactionBuilder {
    tx: Transaction,
}

impl TransactionBuilder {
    pub fn new(
        version: u8,
        sender_public_key: PublicKey,
        amount_nqt: u64,
        fee_nqt: u64,
        timestamp: Timestamp,
        deadline: u16,
        attachment: Attachment,
    ) -> Self {
        Self {
            tx: Transaction {
                version,
                timestamp,
                deadline,
                sender_public_key,
                recipient_id: AccountId::ZERO,
                amount_nqt,
                fee_nqt,
                referenced_transaction_full_hash: None,
                attachment,
                message: None,
                encrypted_message: None,
                public_key_announcement: None,
                encrypt_to_self_message: None,
                ec_block_height: 0,
                ec_block_id: BlockId::ZERO,
                signature: None,
            },
        }
    }

    pub fn recipient_id(mut self, recipient: AccountId) -> Self {
        self.tx.recipient_id = recipient;
        self
    }

    pub fn referenced_transaction_full_hash(mut self, hash: FullHash) -> Self {
        self.tx.referenced_transaction_full_hash = Some(hash);
        self
    }

    pub fn message(mut self, message: MessageAppendix) -> Self {
        self.tx.message = Some(message);
        self
    }

    pub fn encrypted_message(mut self, message: EncryptedMessageAppendix) -> Self {
        self.tx.encrypted_message = Some(message);
        self
    }

    pub fn public_key_announcement(mut self, ann: PublicKeyAnnouncementAppendix) -> Self {
        self.tx.public_key_announcement = Some(ann);
        self
    }

    pub fn encrypt_to_self_message(mut self, message: EncryptToSelfMessageAppendix) -> Self {
        self.tx.encrypt_to_self_message = Some(message);
        self
    }

    pub fn ec_block(mut self, height: u32, id: BlockId) -> Self {
        self.tx.ec_block_height = height;
        self.tx.ec_block_id = id;
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.tx.signature = Some(signature);
        self
    }

    pub fn build(self) -> Transaction {
        self.tx
    }
}

impl Transaction {
    /// Canonical signed bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes_internal(true)
    }

    /// Canonical bytes with the signature zeroed, the signing payload.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        self.bytes_internal(false)
    }

    fn bytes_internal(&self, include_signature: bool) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(176);
        buffer.push(self.attachment.type_code());
        buffer.push(self.attachment.subtype_code() | (self.version << 4));
        buffer.extend_from_slice(&self.timestamp.as_secs().to_le_bytes());
        buffer.extend_from_slice(&self.deadline.to_le_bytes());
        buffer.extend_from_slice(&self.sender_public_key.0);
        buffer.extend_from_slice(&self.recipient_id.value().to_le_bytes());
        if self.version == 0 {
            buffer.extend_from_slice(&(nqt_to_coins(self.amount_nqt) as u32).to_le_bytes());
            buffer.extend_from_slice(&(nqt_to_coins(self.fee_nqt) as u32).to_le_bytes());
            let referenced_id = self
                .referenced_transaction_full_hash
                .map(|h| h.to_tx_id().value())
                .unwrap_or(0);
            buffer.extend_from_slice(&referenced_id.to_le_bytes());
        } else {
            buffer.extend_from_slice(&self.amount_nqt.to_le_bytes());
            buffer.extend_from_slice(&self.fee_nqt.to_le_bytes());
            let referenced = self
                .referenced_transaction_full_hash
                .unwrap_or(FullHash::ZERO);
            buffer.extend_from_slice(referenced.as_bytes());
        }
        match self.signature {
            Some(sig) if include_signature => buffer.extend_from_slice(&sig.0),
            _ => buffer.extend_from_slice(&[0u8; 64]),
        }
        if self.version > 0 {
            buffer.extend_from_slice(&self.flags().to_le_bytes());
            buffer.extend_from_slice(&self.ec_block_height.to_le_bytes());
            buffer.extend_from_slice(&self.ec_block_id.value().to_le_bytes());
            self.attachment.put_bytes(&mut buffer, self.version);
            if let Some(message) = &self.message {
                message.put_bytes(&mut buffer);
            }
            if let Some(encrypted) = &self.encrypted_message {
                encrypted.put_bytes(&mut buffer);
            }
            if let Some(announcement) = &self.public_key_announcement {
                announcement.put_bytes(&mut buffer);
            }
            if let Some(to_self) = &self.encrypt_to_self_message {
                to_self.put_bytes(&mut buffer);
            }
        } else {
            self.attachment.put_bytes(&mut buffer, self.version);
        }
        buffer
    }

    fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.message.is_some() {
            flags |= FLAG_MESSAGE;
        }
        if self.encrypted_message.is_some() {
            flags |= FLAG_ENCRYPTED_MESSAGE;
        }
        if self.public_key_announcement.is_some() {
            flags |= FLAG_PUBLIC_KEY_ANNOUNCEMENT;
        }
        if self.encrypt_to_self_message.is_some() {
            flags |= FLAG_ENCRYPT_TO_SELF;
        }
        flags
    }

    /// Full hash of the signed transaction: SHA-256 over the unsigned bytes
    /// followed by the hash of the signature.
    pub fn full_hash(&self) -> FullHash {
        let signature_hash = match self.signature {
            Some(sig) => sha256(&sig.0),
            None => sha256(&[0u8; 64]),
        };
        FullHash::new(sha256_multi(&[&self.unsigned_bytes(), &signature_hash]))
    }

    pub fn id(&self) -> TxId {
        self.full_hash().to_tx_id()
    }

    pub fn sender_id(&self) -> AccountId {
        account_id_from_public_key(&self.sender_public_key)
    }

    /// When this transaction expires: timestamp plus the deadline in minutes.
    pub fn expiration(&self) -> Timestamp {
        self.timestamp.saturating_add(u32::from(self.deadline) * 60)
    }

    /// Encoded size in bytes, counted against the block payload limit.
    pub fn size(&self) -> u32 {
        self.bytes().len() as u32
    }

    pub fn sign(&mut self, secret: &SecretSeed) {
        self.signature = Some(sign_message(&self.unsigned_bytes(), secret));
    }

    pub fn verify_signature(&self) -> bool {
        match &self.signature {
            Some(sig) => verify_signature(&self.unsigned_bytes(), sig, &self.sender_public_key),
            None => false,
        }
    }

    /// Structural and type-specific validation. Signature verification and
    /// chain-state checks (duplicates, references) are separate steps.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.deadline == 0 || self.deadline > MAX_DEADLINE_MINUTES {
            return Err(ValidationError::not_valid(format!(
                "deadline {} out of range",
                self.deadline
            )));
        }
        if self.fee_nqt < ONE_IGNIS {
            return Err(ValidationError::not_valid("fee below minimum"));
        }
        if self.amount_nqt > MAX_BALANCE_NQT {
            return Err(ValidationError::not_valid("amount exceeds total supply"));
        }
        match self.amount_nqt.checked_add(self.fee_nqt) {
            Some(total) if total <= MAX_BALANCE_NQT => {}
            _ => return Err(ValidationError::not_valid("amount plus fee overflows")),
        }
        if self.version == 0 && self.has_appendages() {
            return Err(ValidationError::not_valid(
                "version 0 transactions cannot carry appendages",
            ));
        }
        if self.version > 0
            && matches!(self.attachment, Attachment::ArbitraryMessage)
            && self.message.is_none()
            && self.encrypted_message.is_none()
        {
            return Err(ValidationError::not_valid("message transaction without message"));
        }
        self.attachment.validate(self.amount_nqt, self.recipient_id)?;
        if let Some(message) = &self.message {
            message.validate()?;
        }
        if let Some(encrypted) = &self.encrypted_message {
            encrypted.validate()?;
        }
        if let Some(announcement) = &self.public_key_announcement {
            announcement.validate()?;
            if self.recipient_id.is_zero() {
                return Err(ValidationError::not_valid(
                    "public key announcement without recipient",
                ));
            }
        }
        if let Some(to_self) = &self.encrypt_to_self_message {
            to_self.validate()?;
        }
        Ok(())
    }

    fn has_appendages(&self) -> bool {
        self.message.is_some()
            || self.encrypted_message.is_some()
            || self.public_key_announcement.is_some()
            || self.encrypt_to_self_message.is_some()
    }

    // ── JSON codec ─────────────────────────────────────────────────────

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), self.attachment.type_code().into());
        obj.insert("subtype".into(), self.attachment.subtype_code().into());
        obj.insert("version".into(), self.version.into());
        obj.insert("timestamp".into(), self.timestamp.as_secs().into());
        obj.insert("deadline".into(), self.deadline.into());
        obj.insert(
            "senderPublicKey".into(),
            Value::String(self.sender_public_key.to_string()),
        );
        obj.insert("recipient".into(), Value::String(self.recipient_id.to_string()));
        obj.insert("amountNQT".into(), self.amount_nqt.into());
        obj.insert("feeNQT".into(), self.fee_nqt.into());
        if let Some(referenced) = &self.referenced_transaction_full_hash {
            obj.insert(
                "referencedTransactionFullHash".into(),
                Value::String(referenced.to_string()),
            );
        }
        obj.insert("ecBlockHeight".into(), self.ec_block_height.into());
        obj.insert("ecBlockId".into(), Value::String(self.ec_block_id.to_string()));
        if let Some(sig) = &self.signature {
            obj.insert("signature".into(), Value::String(sig.to_string()));
        }
        let mut attachment = Map::new();
        self.attachment.put_json(&mut attachment);
        if let Some(message) = &self.message {
            message.put_json(&mut attachment);
        }
        if let Some(encrypted) = &self.encrypted_message {
            encrypted.put_json(&mut attachment);
        }
        if let Some(announcement) = &self.public_key_announcement {
            announcement.put_json(&mut attachment);
        }
        if let Some(to_self) = &self.encrypt_to_self_message {
            to_self.put_json(&mut attachment);
        }
        if !attachment.is_empty() {
            obj.insert("attachment".into(), Value::Object(attachment));
        }
        Value::Object(obj)
    }

    pub fn parse_json(value: &Value) -> Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValidationError::not_valid("transaction is not a JSON object"))?;
        let u64_field = |name: &str| -> Result<u64, ValidationError> {
            obj.get(name)
                .and_then(Value::as_u64)
                .ok_or_else(|| ValidationError::not_valid(format!("missing field {name}")))
        };
        let type_code = u64_field("type")? as u8;
        let subtype_code = u64_field("subtype")? as u8;
        let version = u64_field("version")? as u8;
        let timestamp = Timestamp::new(u64_field("timestamp")? as u32);
        let deadline = u64_field("deadline")? as u16;
        let sender_public_key = obj
            .get("senderPublicKey")
            .and_then(Value::as_str)
            .and_then(PublicKey::parse_hex)
            .ok_or_else(|| ValidationError::not_valid("malformed sender public key"))?;
        let recipient_id = obj
            .get("recipient")
            .and_then(Value::as_str)
            .map(|s| AccountId::parse(s).map_err(|_| ValidationError::not_valid("bad recipient id")))
            .transpose()?
            .unwrap_or(AccountId::ZERO);
        let amount_nqt = u64_field("amountNQT")?;
        let fee_nqt = u64_field("feeNQT")?;
        let referenced_transaction_full_hash = obj
            .get("referencedTransactionFullHash")
            .and_then(Value::as_str)
            .map(|s| {
                FullHash::parse_hex(s)
                    .ok_or_else(|| ValidationError::not_valid("malformed referenced hash"))
            })
            .transpose()?;
        let ec_block_height = obj
            .get("ecBlockHeight")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let ec_block_id = obj
            .get("ecBlockId")
            .and_then(Value::as_str)
            .map(|s| BlockId::parse(s).map_err(|_| ValidationError::not_valid("bad ecBlockId")))
            .transpose()?
            .unwrap_or(BlockId::ZERO);
        let signature = obj
            .get("signature")
            .and_then(Value::as_str)
            .map(|s| {
                Signature::parse_hex(s).ok_or_else(|| ValidationError::not_valid("malformed signature"))
            })
            .transpose()?;

        let empty = Map::new();
        let attachment_obj = obj
            .get("attachment")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let attachment = Attachment::from_json(type_code, subtype_code, attachment_obj)?;
        let message = MessageAppendix::from_json(attachment_obj)?;
        let encrypted_message = EncryptedMessageAppendix::from_json(attachment_obj)?;
        let public_key_announcement = PublicKeyAnnouncementAppendix::from_json(attachment_obj)?;
        let encrypt_to_self_message = EncryptToSelfMessageAppendix::from_json(attachment_obj)?;

        Ok(Transaction {
            version,
            timestamp,
            deadline,
            sender_public_key,
            recipient_id,
            amount_nqt,
            fee_nqt,
            referenced_transaction_full_hash,
            attachment,
            message,
            encrypted_message,
            public_key_announcement,
            encrypt_to_self_message,
            ec_block_height,
            ec_block_id,
            signature,
        })
    }

    // ── Byte codec ─────────────────────────────────────────────────────

    pub fn parse_bytes(data: &[u8]) -> Result<Self, ValidationError> {
        let mut reader = ByteReader::new(data);
        let type_code = reader.u8()?;
        let versioned_subtype = reader.u8()?;
        let subtype_code = versioned_subtype & 0x0F;
        let version = versioned_subtype >> 4;
        let timestamp = Timestamp::new(reader.u32()?);
        let deadline = reader.u16()?;
        let sender_public_key = PublicKey(reader.array_32()?);
        let recipient_id = AccountId::new(reader.u64()?);

        let (amount_nqt, fee_nqt, referenced) = if version == 0 {
            let amount = u64::from(reader.u32()?) * ONE_IGNIS;
            let fee = u64::from(reader.u32()?) * ONE_IGNIS;
            let referenced_id = reader.u64()?;
            let referenced = if referenced_id == 0 {
                None
            } else {
                // Legacy references carry only the 8-byte id; widen it into
                // the hash prefix so id-based lookups keep working.
                let mut bytes = [0u8; 32];
                bytes[..8].copy_from_slice(&referenced_id.to_le_bytes());
                Some(FullHash::new(bytes))
            };
            (amount, fee, referenced)
        } else {
            let amount = reader.u64()?;
            let fee = reader.u64()?;
            let hash = FullHash::new(reader.array_32()?);
            let referenced = if hash.is_zero() { None } else { Some(hash) };
            (amount, fee, referenced)
        };

        let signature_bytes = reader.array_64()?;
        let signature = if signature_bytes == [0u8; 64] {
            None
        } else {
            Some(Signature(signature_bytes))
        };

        let mut flags = 0u32;
        let mut ec_block_height = 0u32;
        let mut ec_block_id = BlockId::ZERO;
        if version > 0 {
            flags = reader.u32()?;
            ec_block_height = reader.u32()?;
            ec_block_id = BlockId::new(reader.u64()?);
        }

        let attachment = Attachment::from_bytes(type_code, subtype_code, &mut reader, version)?;

        let mut message = None;
        let mut encrypted_message = None;
        let mut public_key_announcement = None;
        let mut encrypt_to_self_message = None;
        if version > 0 {
            if flags & FLAG_MESSAGE != 0 {
                message = Some(MessageAppendix::from_bytes(&mut reader)?);
            }
            if flags & FLAG_ENCRYPTED_MESSAGE != 0 {
                encrypted_message = Some(EncryptedMessageAppendix::from_bytes(&mut reader)?);
            }
            if flags & FLAG_PUBLIC_KEY_ANNOUNCEMENT != 0 {
                public_key_announcement =
                    Some(PublicKeyAnnouncementAppendix::from_bytes(&mut reader)?);
            }
            if flags & FLAG_ENCRYPT_TO_SELF != 0 {
                encrypt_to_self_message =
                    Some(EncryptToSelfMessageAppendix::from_bytes(&mut reader)?);
            }
        }
        if reader.remaining() != 0 {
            return Err(ValidationError::not_valid("trailing bytes after transaction"));
        }

        Ok(Transaction {
            version,
            timestamp,
            deadline,
            sender_public_key,
            recipient_id,
            amount_nqt,
            fee_nqt,
            referenced_transaction_full_hash: referenced,
            attachment,
            message,
            encrypted_message,
            public_key_announcement,
            encrypt_to_self_message,
            ec_block_height,
            ec_block_id,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appendix::EncryptedData;
    use ignis_crypto::keypair_from_secret_phrase;

    fn signed_payment() -> Transaction {
        let kp = keypair_from_secret_phrase("transaction test sender");
        let mut tx = TransactionBuilder::new(
            1,
            kp.public,
            5 * ONE_IGNIS,
            ONE_IGNIS,
            Timestamp::new(7200),
            1440,
            Attachment::OrdinaryPayment,
        )
        .recipient_id(AccountId::new(0x1122_3344_5566_7788))
        .ec_block(12, BlockId::new(99))
        .build();
        tx.sign(&kp.secret);
        tx
    }

    #[test]
    fn byte_roundtrip_v1() {
        let tx = signed_payment();
        let bytes = tx.bytes();
        let parsed = Transaction::parse_bytes(&bytes).unwrap();
        assert_eq!(parsed, tx);
        assert_eq!(parsed.bytes(), bytes);
    }

    #[test]
    fn json_roundtrip_preserves_bytes() {
        let tx = signed_payment();
        let parsed = Transaction::parse_json(&tx.to_json()).unwrap();
        assert_eq!(parsed.bytes(), tx.bytes());
    }

    #[test]
    fn roundtrip_with_all_appendages() {
        let kp = keypair_from_secret_phrase("appendage sender");
        let mut tx = TransactionBuilder::new(
            1,
            kp.public,
            ONE_IGNIS,
            ONE_IGNIS,
            Timestamp::new(100),
            60,
            Attachment::OrdinaryPayment,
        )
        .recipient_id(AccountId::new(7))
        .message(MessageAppendix::text("invoice 42"))
        .encrypted_message(EncryptedMessageAppendix(EncryptedData {
            data: vec![1, 2, 3],
            nonce: [4u8; 32],
            is_text: false,
        }))
        .public_key_announcement(PublicKeyAnnouncementAppendix {
            public_key: PublicKey([8u8; 32]),
        })
        .encrypt_to_self_message(EncryptToSelfMessageAppendix(EncryptedData {
            data: vec![9, 9],
            nonce: [2u8; 32],
            is_text: true,
        }))
        .build();
        tx.sign(&kp.secret);

        let parsed = Transaction::parse_bytes(&tx.bytes()).unwrap();
        assert_eq!(parsed, tx);
        let parsed_json = Transaction::parse_json(&tx.to_json()).unwrap();
        assert_eq!(parsed_json.bytes(), tx.bytes());
    }

    #[test]
    fn signature_verifies_and_id_changes_with_signature() {
        let tx = signed_payment();
        assert!(tx.verify_signature());

        let mut unsigned = tx.clone();
        unsigned.signature = None;
        assert!(!unsigned.verify_signature());
        assert_ne!(unsigned.full_hash(), tx.full_hash());
    }

    #[test]
    fn tampered_bytes_fail_signature() {
        let mut tx = signed_payment();
        tx.amount_nqt += 1;
        assert!(!tx.verify_signature());
    }

    #[test]
    fn expiration_adds_deadline_minutes() {
        let tx = signed_payment();
        assert_eq!(
            tx.expiration(),
            Timestamp::new(7200 + u32::from(tx.deadline) * 60)
        );
    }

    #[test]
    fn validate_rejects_zero_deadline() {
        let mut tx = signed_payment();
        tx.deadline = 0;
        assert!(tx.validate().is_err());
    }

    #[test]
    fn validate_rejects_dust_fee() {
        let mut tx = signed_payment();
        tx.fee_nqt = ONE_IGNIS - 1;
        assert!(tx.validate().is_err());
    }

    #[test]
    fn validate_rejects_v0_appendages() {
        let kp = keypair_from_secret_phrase("legacy sender");
        let tx = TransactionBuilder::new(
            0,
            kp.public,
            ONE_IGNIS,
            ONE_IGNIS,
            Timestamp::new(50),
            30,
            Attachment::OrdinaryPayment,
        )
        .recipient_id(AccountId::new(1))
        .message(MessageAppendix::text("no room in v0"))
        .build();
        assert!(tx.validate().is_err());
    }

    #[test]
    fn unknown_trailing_bytes_rejected() {
        let tx = signed_payment();
        let mut bytes = tx.bytes();
        bytes.push(0xFF);
        assert!(Transaction::parse_bytes(&bytes).is_err());
    }
}
