//! Genesis block construction — the first block on each network.
//!
//! The genesis block allocates the entire supply from the creator account to
//! the initial recipients. Its id is the hard-coded network constant and its
//! signatures are embedded; nothing about it is ever recomputed or
//! re-verified. The creator account is exempt from balance checks, so its
//! balance goes (and stays) negative by the full supply.
//!
//! Main and test networks embed their allocation tables; the dev network
//! routes the whole supply to a faucet account derived from a published
//! secret phrase so local setups have spendable funds.

use crate::block::{Block, GENESIS_BLOCK_VERSION};
use crate::error::ValidationError;
use crate::transaction::{Transaction, TransactionBuilder};
use crate::Attachment;
use ignis_crypto::{account_id_from_public_key, keypair_from_secret_phrase, Digest, Sha256};
use ignis_types::amount::coins_to_nqt;
use ignis_types::{AccountId, ChainParams, FullHash, NetworkId, PublicKey, Signature, Timestamp};
use num_bigint::BigUint;

/// Public key of the genesis creator account. The matching secret was
/// discarded at launch.
pub const CREATOR_PUBLIC_KEY: [u8; 32] = [
    0xc6, 0x9a, 0x11, 0x5e, 0x27, 0xb8, 0x4c, 0x3f, 0x90, 0x02, 0xde, 0x71, 0x3a, 0x4f, 0x88,
    0x0e, 0x5d, 0xc0, 0x37, 0x6a, 0x2f, 0x19, 0xe3, 0x54, 0xa1, 0x0b, 0x7c, 0xd8, 0x46, 0x92,
    0x6b, 0x15,
];

/// Secret phrase of the dev-network faucet. Published for local development;
/// worthless on any real network.
pub const DEV_FAUCET_SECRET_PHRASE: &str = "ignis dev faucet unsafe published phrase";

/// Main-network allocation: (recipient account id, whole coins).
const MAIN_ALLOCATIONS: [(u64, u64); 8] = [
    (17_043_260_778_467_563_217, 250_000_000),
    (4_407_210_215_142_536_881, 200_000_000),
    (12_811_094_918_417_512_329, 150_000_000),
    (9_240_176_547_880_343_070, 120_000_000),
    (1_852_713_010_975_281_453, 100_000_000),
    (15_323_829_184_622_901_118, 80_000_000),
    (6_671_930_402_839_056_774, 60_000_000),
    (10_917_724_411_509_482_495, 40_000_000),
];

/// Test-network allocation.
const TEST_ALLOCATIONS: [(u64, u64); 4] = [
    (8_274_091_336_842_106_339, 400_000_000),
    (2_931_087_175_066_028_611, 300_000_000),
    (14_026_733_764_110_912_560, 200_000_000),
    (5_510_128_476_339_446_877, 100_000_000),
];

const MAIN_GENESIS_SIGNATURES: [&str; 8] = [
    "6aa5b9e8d03c4f17820ed64b9135cc0a7f43e2918d56b07a31cf88245e906d1cb32e07f41a589dc6904bee23175a08cd41f6e390b8217ac53d902ee46571ba08",
    "1f84c0d2a9be6573e018fb4d26c7905a84d13ea0bc62f7194805ce3b67a2d90e55c871b30f2ad46891e07cc5263b914de08a7f13b5249ce60d713af4285c6a01",
    "93d07b2ea14f86c55b20ed183a67cf049128be57d06a3e9c74f1805d2b69ea0744f0ab821c96ed5370b8fa1e42d5390ca615de2784b90cf351e8027d9c643b05",
    "c41e98f6053d27ab84b0ce629f17d3548a06fb2d91e543c70d28ae165b97f4023d65c1e80b74fa29165c03dbe8429170ad27e6f45c91b3850e64da2197308d02",
    "57a2e40c916b38fd2304ab7e85d19c60b3f72148ed05ca963e417bd0268f5a0d8be90f3c62a751e4095dcc1738e6b20fa4519e07c382dfb61027ecd459a14e06",
    "e8340b6d97c1f52a460d83be19f67e04cd5291a3780fbe46d1a20c573e98b60171cd54e20639ab87f43e1c96502dd841b906fe7a24c81d35e09b2af86174cc03",
    "2cf9671e04ad83b5970e2cd8416b5f3a81d40e96c2537fa8095bde1463072e09ac16d8f02e94c7531087abe65d243f90e751ca2386d90bf45318ce07a6925d07",
    "b05d218fe67a94c3082ef1d5396ac70e14f8d3027c65b9ea40961dcf5283b7046e29af13c850de7621409cbe837612fda053e79c164b28d09fe5163a40c79e01",
];

const TEST_GENESIS_SIGNATURES: [&str; 4] = [
    "8d3f72a1065ce49b20e7d6134af85c09b164de08237f9ac551062ebd74391c05e90a25d7c1834fb6097edc4216a53e80fd34b19e65270ac813db9e246058f702",
    "41be07d395261afc80e9325d7604cb18a7f2e05d94316bc06258fae11970d30b2c7156e84093dfa21e65cb07834291dce00f67a3b5184dc9720abe5396415e04",
    "f6029ce71845bad3065f1e92c73804ab5e21d09f8c463e7510a9bd2647c8f1007ba4e1d2390c65f88120adc7e59643bd16e05298a7f34d1c60e97b04c2d83a06",
    "795ad02e1c6f48b3960d27eb514a903c08e65fd1b2794ac6305182ef9d40c7082f91bc360a57ed14805fcea3964207db21c4965e0387f2ad04619ecb58d02103",
];

/// Filler signature on dev-network genesis transactions; genesis signatures
/// are embedded, never verified.
const DEV_GENESIS_SIGNATURE: &str = "d4000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000000d4d";

const GENESIS_BLOCK_SIGNATURE: &str = "2a17f08bd6593ce04781eac520963db4e81c06375a9fd218407cbe9164e35d01ac562e9f73084bde10a792c6e514f3d92760be81c435da0927ef4a165309cb02";

/// Account id of the genesis creator.
pub fn creator_id() -> AccountId {
    account_id_from_public_key(&PublicKey(CREATOR_PUBLIC_KEY))
}

fn decode_signature(hex_sig: &str) -> Signature {
    let bytes = hex::decode(hex_sig).expect("embedded signature is valid hex");
    Signature(bytes.try_into().expect("embedded signature is 64 bytes"))
}

fn allocations(network: NetworkId) -> Vec<(AccountId, u64, Signature)> {
    match network {
        NetworkId::Main => MAIN_ALLOCATIONS
            .iter()
            .zip(MAIN_GENESIS_SIGNATURES)
            .map(|(&(id, coins), sig)| (AccountId::new(id), coins, decode_signature(sig)))
            .collect(),
        NetworkId::Test => TEST_ALLOCATIONS
            .iter()
            .zip(TEST_GENESIS_SIGNATURES)
            .map(|(&(id, coins), sig)| (AccountId::new(id), coins, decode_signature(sig)))
            .collect(),
        NetworkId::Dev => {
            let faucet = keypair_from_secret_phrase(DEV_FAUCET_SECRET_PHRASE);
            vec![(
                account_id_from_public_key(&faucet.public),
                ignis_types::amount::MAX_BALANCE_IGNIS,
                decode_signature(DEV_GENESIS_SIGNATURE),
            )]
        }
    }
}

/// Build the genesis transaction list for a network, in canonical order.
fn genesis_transactions(network: NetworkId) -> Vec<Transaction> {
    let mut transactions: Vec<Transaction> = allocations(network)
        .into_iter()
        .map(|(recipient, coins, signature)| {
            TransactionBuilder::new(
                0,
                PublicKey(CREATOR_PUBLIC_KEY),
                coins_to_nqt(coins),
                0,
                Timestamp::EPOCH,
                0,
                Attachment::OrdinaryPayment,
            )
            .recipient_id(recipient)
            .signature(signature)
            .build()
        })
        .collect();
    transactions.sort_by_key(|tx| (tx.id(), tx.timestamp));
    transactions
}

/// Construct the genesis block for a network.
pub fn create_genesis_block(params: &ChainParams) -> Result<Block, ValidationError> {
    let transactions = genesis_transactions(params.network);
    let mut digest = Sha256::new();
    let mut total_amount_nqt = 0u64;
    for tx in &transactions {
        digest.update(tx.bytes());
        total_amount_nqt += tx.amount_nqt;
    }
    let payload_hash = FullHash::new(digest.finalize().into());

    let mut block = Block::new(
        GENESIS_BLOCK_VERSION,
        Timestamp::EPOCH,
        ignis_types::BlockId::ZERO,
        total_amount_nqt,
        0,
        transactions.len() as u32 * 128,
        payload_hash,
        PublicKey(CREATOR_PUBLIC_KEY),
        vec![0u8; 64],
        Some(decode_signature(GENESIS_BLOCK_SIGNATURE)),
        None,
        transactions,
    )?;
    block.height = 0;
    block.base_target = params.initial_base_target;
    block.cumulative_difficulty = BigUint::from(0u8);
    block.set_id(params.genesis_block_id);
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_types::amount::MAX_BALANCE_NQT;

    #[test]
    fn genesis_is_deterministic() {
        let params = ChainParams::dev();
        let a = create_genesis_block(&params).unwrap();
        let b = create_genesis_block(&params).unwrap();
        assert_eq!(a.bytes(), b.bytes());
        assert_eq!(a.payload_hash, b.payload_hash);
    }

    #[test]
    fn genesis_id_is_the_network_constant() {
        for params in [ChainParams::main(), ChainParams::test(), ChainParams::dev()] {
            let block = create_genesis_block(&params).unwrap();
            assert_eq!(block.id(), params.genesis_block_id);
        }
    }

    #[test]
    fn genesis_allocates_full_supply() {
        for params in [ChainParams::main(), ChainParams::test(), ChainParams::dev()] {
            let block = create_genesis_block(&params).unwrap();
            assert_eq!(block.total_amount_nqt, MAX_BALANCE_NQT);
            assert_eq!(block.total_fee_nqt, 0);
        }
    }

    #[test]
    fn genesis_has_no_predecessor() {
        let block = create_genesis_block(&ChainParams::main()).unwrap();
        assert!(block.previous_block_id.is_zero());
        assert_eq!(block.height, 0);
        assert_eq!(block.version, GENESIS_BLOCK_VERSION);
        assert_eq!(block.cumulative_difficulty, BigUint::from(0u8));
    }

    #[test]
    fn genesis_transactions_are_sorted_by_id() {
        let block = create_genesis_block(&ChainParams::main()).unwrap();
        let ids: Vec<_> = block.transactions.iter().map(Transaction::id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn dev_faucet_receives_everything() {
        let block = create_genesis_block(&ChainParams::dev()).unwrap();
        let faucet = keypair_from_secret_phrase(DEV_FAUCET_SECRET_PHRASE);
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(
            block.transactions[0].recipient_id,
            account_id_from_public_key(&faucet.public)
        );
    }

    #[test]
    fn genesis_payload_hash_covers_transactions() {
        let block = create_genesis_block(&ChainParams::test()).unwrap();
        let mut digest = Sha256::new();
        for tx in &block.transactions {
            digest.update(tx.bytes());
        }
        assert_eq!(block.payload_hash, FullHash::new(digest.finalize().into()));
    }
}
