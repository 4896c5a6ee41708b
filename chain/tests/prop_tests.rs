use proptest::prelude::*;

use ignis_chain::{Attachment, Block, Transaction, TransactionBuilder};
use ignis_crypto::keypair_from_secret_phrase;
use ignis_types::amount::MAX_BALANCE_NQT;
use ignis_types::{AccountId, BlockId, ChainParams, FullHash, Timestamp};

fn signed_payment(
    amount_nqt: u64,
    fee_nqt: u64,
    timestamp: u32,
    deadline: u16,
    recipient: u64,
    referenced: Option<[u8; 32]>,
) -> Transaction {
    let kp = keypair_from_secret_phrase("prop test sender");
    let mut builder = TransactionBuilder::new(
        1,
        kp.public,
        amount_nqt,
        fee_nqt,
        Timestamp::new(timestamp),
        deadline,
        Attachment::OrdinaryPayment,
    )
    .recipient_id(AccountId::new(recipient));
    if let Some(hash) = referenced {
        builder = builder.referenced_transaction_full_hash(FullHash::new(hash));
    }
    let mut tx = builder.build();
    tx.sign(&kp.secret);
    tx
}

proptest! {
    /// Canonical bytes parse back to an identical transaction.
    #[test]
    fn transaction_bytes_roundtrip(
        amount_nqt in 0u64..MAX_BALANCE_NQT,
        fee_nqt in 0u64..MAX_BALANCE_NQT,
        timestamp in 0u32..u32::MAX / 2,
        deadline in 1u16..=1440,
        recipient in any::<u64>(),
        referenced in prop::option::of(prop::array::uniform32(1u8..)),
    ) {
        let tx = signed_payment(amount_nqt, fee_nqt, timestamp, deadline, recipient, referenced);
        let bytes = tx.bytes();
        let parsed = Transaction::parse_bytes(&bytes).unwrap();
        prop_assert_eq!(&parsed, &tx);
        prop_assert_eq!(parsed.bytes(), bytes);
    }

    /// The JSON wire form reproduces the exact canonical bytes.
    #[test]
    fn transaction_json_roundtrip(
        amount_nqt in 0u64..MAX_BALANCE_NQT,
        fee_nqt in 0u64..MAX_BALANCE_NQT,
        timestamp in 0u32..u32::MAX / 2,
        deadline in 1u16..=1440,
        recipient in any::<u64>(),
    ) {
        let tx = signed_payment(amount_nqt, fee_nqt, timestamp, deadline, recipient, None);
        let parsed = Transaction::parse_json(&tx.to_json()).unwrap();
        prop_assert_eq!(parsed.bytes(), tx.bytes());
        prop_assert_eq!(parsed.id(), tx.id());
    }

    /// The transaction id is stable across both wire forms.
    #[test]
    fn transaction_id_agrees_across_codecs(
        amount_nqt in 0u64..MAX_BALANCE_NQT,
        timestamp in 0u32..u32::MAX / 2,
    ) {
        let tx = signed_payment(amount_nqt, MAX_BALANCE_NQT / 2, timestamp, 720, 7, None);
        let from_bytes = Transaction::parse_bytes(&tx.bytes()).unwrap();
        let from_json = Transaction::parse_json(&tx.to_json()).unwrap();
        prop_assert_eq!(from_bytes.full_hash(), tx.full_hash());
        prop_assert_eq!(from_json.full_hash(), tx.full_hash());
    }

    /// Block JSON reproduces the signed bytes and the derived id.
    #[test]
    fn block_json_roundtrip(
        timestamp in 1u32..u32::MAX / 2,
        previous in 1u64..u64::MAX,
        total_amount in 0u64..MAX_BALANCE_NQT,
        total_fee in 0u64..MAX_BALANCE_NQT,
        payload_hash in prop::array::uniform32(0u8..),
        prev_hash in prop::array::uniform32(0u8..),
        gen_sig in prop::array::uniform32(0u8..),
    ) {
        let kp = keypair_from_secret_phrase("prop test forger");
        let mut block = Block::new(
            3,
            Timestamp::new(timestamp),
            BlockId::new(previous),
            total_amount,
            total_fee,
            0,
            FullHash::new(payload_hash),
            kp.public,
            gen_sig.to_vec(),
            None,
            Some(FullHash::new(prev_hash)),
            vec![],
        )
        .unwrap();
        block.sign(&kp.secret);

        let parsed = Block::parse_json(
            &block.to_json(),
            Timestamp::new(timestamp),
            &ChainParams::dev(),
        )
        .unwrap();
        prop_assert_eq!(parsed.bytes(), block.bytes());
        prop_assert_eq!(parsed.id(), block.id());
        prop_assert!(parsed.verify_block_signature());
    }
}
