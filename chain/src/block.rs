//! Blocks: canonical bytes, JSON codec, signing, and chain linkage.
//!
//! A block's wire identity is derived from the SHA-256 of its signed bytes.
//! The byte layout is version-dependent: version 1 blocks carry a 64-byte
//! generation signature and whole-coin totals; version 2 adds the previous
//! block hash and a 32-byte generation signature; version 3 switches the
//! totals to NQT. Height, base target, and cumulative difficulty are not
//! wire fields — they are derived when the block is linked to its
//! predecessor.

use crate::error::ValidationError;
use crate::forge;
use crate::transaction::Transaction;
use ignis_crypto::{account_id_from_public_key, sha256, sign_message, verify_signature};
use ignis_types::amount::nqt_to_coins;
use ignis_types::id::id_from_hash_prefix;
use ignis_types::params::{MAX_PAYLOAD_LENGTH, MAX_TRANSACTIONS_PER_BLOCK};
use ignis_types::{AccountId, BlockId, ChainParams, FullHash, PublicKey, SecretSeed, Signature, Timestamp};
use num_bigint::BigUint;
use serde_json::{Map, Value};

/// Version marker of the genesis block.
pub const GENESIS_BLOCK_VERSION: i32 = -1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub version: i32,
    pub timestamp: Timestamp,
    pub previous_block_id: BlockId,
    pub total_amount_nqt: u64,
    pub total_fee_nqt: u64,
    pub payload_length: u32,
    pub payload_hash: FullHash,
    pub generator_public_key: PublicKey,
    /// 64 bytes for version 1 (and genesis), 32 bytes for version ≥ 2.
    pub generation_signature: Vec<u8>,
    pub block_signature: Option<Signature>,
    /// Hash of the previous block's bytes; present from version 2 on.
    pub previous_block_hash: Option<FullHash>,
    pub transactions: Vec<Transaction>,

    // Derived chain state, set when the block is linked to its predecessor
    // (or loaded from the store).
    id: BlockId,
    pub height: u32,
    pub base_target: u64,
    pub cumulative_difficulty: BigUint,
}

impl Block {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: i32,
        timestamp: Timestamp,
        previous_block_id: BlockId,
        total_amount_nqt: u64,
        total_fee_nqt: u64,
        payload_length: u32,
        payload_hash: FullHash,
        generator_public_key: PublicKey,
        generation_signature: Vec<u8>,
        block_signature: Option<Signature>,
        previous_block_hash: Option<FullHash>,
        transactions: Vec<Transaction>,
    ) -> Result<Self, ValidationError> {
        if transactions.len() > MAX_TRANSACTIONS_PER_BLOCK {
            return Err(ValidationError::not_valid(format!(
                "attempted to create a block with {} transactions",
                transactions.len()
            )));
        }
        if payload_length > MAX_PAYLOAD_LENGTH {
            return Err(ValidationError::not_valid(format!(
                "attempted to create a block with payload length {payload_length}"
            )));
        }
        let expected_gen_sig_len = if version >= 2 { 32 } else { 64 };
        if generation_signature.len() != expected_gen_sig_len {
            return Err(ValidationError::not_valid("generation signature length mismatch"));
        }
        if version >= 2 && previous_block_hash.is_none() {
            return Err(ValidationError::not_valid("missing previous block hash"));
        }
        Ok(Self {
            version,
            timestamp,
            previous_block_id,
            total_amount_nqt,
            total_fee_nqt,
            payload_length,
            payload_hash,
            generator_public_key,
            generation_signature,
            block_signature,
            previous_block_hash,
            transactions,
            id: BlockId::ZERO,
            height: 0,
            base_target: 0,
            cumulative_difficulty: BigUint::from(0u8),
        })
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn string_id(&self) -> String {
        self.id.to_string()
    }

    pub fn generator_id(&self) -> AccountId {
        account_id_from_public_key(&self.generator_public_key)
    }

    /// Canonical signed bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes_internal(true)
    }

    /// Canonical bytes with the signature zeroed, the signing payload.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        self.bytes_internal(false)
    }

    fn bytes_internal(&self, include_signature: bool) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(224);
        buffer.extend_from_slice(&self.version.to_le_bytes());
        buffer.extend_from_slice(&self.timestamp.as_secs().to_le_bytes());
        buffer.extend_from_slice(&self.previous_block_id.value().to_le_bytes());
        buffer.extend_from_slice(&(self.transactions.len() as u32).to_le_bytes());
        if self.version < 3 {
            buffer.extend_from_slice(&(nqt_to_coins(self.total_amount_nqt) as u32).to_le_bytes());
            buffer.extend_from_slice(&(nqt_to_coins(self.total_fee_nqt) as u32).to_le_bytes());
        } else {
            buffer.extend_from_slice(&self.total_amount_nqt.to_le_bytes());
            buffer.extend_from_slice(&self.total_fee_nqt.to_le_bytes());
        }
        buffer.extend_from_slice(&self.payload_length.to_le_bytes());
        buffer.extend_from_slice(self.payload_hash.as_bytes());
        buffer.extend_from_slice(&self.generator_public_key.0);
        buffer.extend_from_slice(&self.generation_signature);
        if self.version >= 2 {
            let prev_hash = self.previous_block_hash.expect("checked at construction");
            buffer.extend_from_slice(prev_hash.as_bytes());
        }
        match self.block_signature {
            Some(sig) if include_signature => buffer.extend_from_slice(&sig.0),
            _ => buffer.extend_from_slice(&[0u8; 64]),
        }
        buffer
    }

    /// Sign with the generator's secret and fix the block's identity.
    pub fn sign(&mut self, secret: &SecretSeed) {
        self.block_signature = Some(sign_message(&self.unsigned_bytes(), secret));
        self.id = self.computed_id();
    }

    /// The id derived from the hash of the signed bytes.
    fn computed_id(&self) -> BlockId {
        BlockId::new(id_from_hash_prefix(&sha256(&self.bytes())))
    }

    /// Fix the block identity. The genesis block's id is assigned from the
    /// network constant instead of being recomputed.
    pub fn set_id(&mut self, id: BlockId) {
        self.id = id;
    }

    pub fn verify_block_signature(&self) -> bool {
        match &self.block_signature {
            Some(sig) => verify_signature(&self.unsigned_bytes(), sig, &self.generator_public_key),
            None => false,
        }
    }

    /// Verify the proof-of-stake generation signature against the
    /// predecessor, given the generator's effective balance.
    pub fn verify_generation_signature(&self, previous: &Block, effective_balance_coins: u64) -> bool {
        forge::verify_generation_signature(
            self.version,
            &self.generation_signature,
            &self.generator_public_key,
            effective_balance_coins,
            &previous.generation_signature,
            previous.base_target,
            previous.timestamp,
            self.timestamp,
        )
    }

    /// Link this block to its predecessor, deriving height, base target, and
    /// cumulative difficulty.
    pub fn set_previous(&mut self, previous: &Block, params: &ChainParams) {
        self.height = previous.height + 1;
        self.base_target =
            forge::next_base_target(previous.base_target, previous.timestamp, self.timestamp, params);
        self.cumulative_difficulty =
            forge::cumulative_difficulty_after(&previous.cumulative_difficulty, self.base_target);
    }

    // ── JSON codec ─────────────────────────────────────────────────────

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("version".into(), self.version.into());
        obj.insert("timestamp".into(), self.timestamp.as_secs().into());
        obj.insert(
            "previousBlock".into(),
            Value::String(self.previous_block_id.to_string()),
        );
        obj.insert("totalAmountNQT".into(), self.total_amount_nqt.into());
        obj.insert("totalFeeNQT".into(), self.total_fee_nqt.into());
        obj.insert("payloadLength".into(), self.payload_length.into());
        obj.insert("payloadHash".into(), Value::String(self.payload_hash.to_string()));
        obj.insert(
            "generatorPublicKey".into(),
            Value::String(self.generator_public_key.to_string()),
        );
        obj.insert(
            "generationSignature".into(),
            Value::String(hex::encode(&self.generation_signature)),
        );
        if let Some(prev_hash) = &self.previous_block_hash {
            obj.insert("previousBlockHash".into(), Value::String(prev_hash.to_string()));
        }
        if let Some(sig) = &self.block_signature {
            obj.insert("blockSignature".into(), Value::String(sig.to_string()));
        }
        obj.insert(
            "transactions".into(),
            Value::Array(self.transactions.iter().map(Transaction::to_json).collect()),
        );
        Value::Object(obj)
    }

    /// Parse a peer-supplied block.
    ///
    /// Blocks timestamped more than 15 seconds into the local future are
    /// `NotCurrentlyValid` — the download loop retries them later instead of
    /// blaming the peer.
    pub fn parse_json(value: &Value, now: Timestamp, params: &ChainParams) -> Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValidationError::not_valid("block is not a JSON object"))?;
        let u64_field = |name: &str| -> Result<u64, ValidationError> {
            obj.get(name)
                .and_then(Value::as_u64)
                .ok_or_else(|| ValidationError::not_valid(format!("missing field {name}")))
        };
        let version = obj
            .get("version")
            .and_then(Value::as_i64)
            .ok_or_else(|| ValidationError::not_valid("missing field version"))? as i32;
        let timestamp = Timestamp::new(u64_field("timestamp")? as u32);
        if timestamp > now.saturating_add(15) {
            return Err(ValidationError::not_currently_valid(format!(
                "block timestamp {} is ahead of local time {}",
                timestamp, now
            )));
        }
        let previous_block_id = obj
            .get("previousBlock")
            .and_then(Value::as_str)
            .and_then(|s| BlockId::parse(s).ok())
            .ok_or_else(|| ValidationError::not_valid("malformed previousBlock"))?;
        let total_amount_nqt = u64_field("totalAmountNQT")?;
        let total_fee_nqt = u64_field("totalFeeNQT")?;
        let payload_length = u64_field("payloadLength")? as u32;
        let payload_hash = obj
            .get("payloadHash")
            .and_then(Value::as_str)
            .and_then(FullHash::parse_hex)
            .ok_or_else(|| ValidationError::not_valid("malformed payloadHash"))?;
        let generator_public_key = obj
            .get("generatorPublicKey")
            .and_then(Value::as_str)
            .and_then(PublicKey::parse_hex)
            .ok_or_else(|| ValidationError::not_valid("malformed generatorPublicKey"))?;
        let generation_signature = obj
            .get("generationSignature")
            .and_then(Value::as_str)
            .and_then(|s| hex::decode(s).ok())
            .ok_or_else(|| ValidationError::not_valid("malformed generationSignature"))?;
        let previous_block_hash = obj
            .get("previousBlockHash")
            .and_then(Value::as_str)
            .map(|s| {
                FullHash::parse_hex(s)
                    .ok_or_else(|| ValidationError::not_valid("malformed previousBlockHash"))
            })
            .transpose()?;
        let block_signature = obj
            .get("blockSignature")
            .and_then(Value::as_str)
            .map(|s| {
                Signature::parse_hex(s)
                    .ok_or_else(|| ValidationError::not_valid("malformed blockSignature"))
            })
            .transpose()?;
        let transactions = obj
            .get("transactions")
            .and_then(Value::as_array)
            .ok_or_else(|| ValidationError::not_valid("missing transactions"))?
            .iter()
            .map(Transaction::parse_json)
            .collect::<Result<Vec<_>, _>>()?;

        let mut block = Self::new(
            version,
            timestamp,
            previous_block_id,
            total_amount_nqt,
            total_fee_nqt,
            payload_length,
            payload_hash,
            generator_public_key,
            generation_signature,
            block_signature,
            previous_block_hash,
            transactions,
        )?;
        block.id = if version == GENESIS_BLOCK_VERSION {
            params.genesis_block_id
        } else {
            block.computed_id()
        };
        Ok(block)
    }
}
