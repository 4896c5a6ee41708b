//! Per-network chain parameters.
//!
//! Everything the consensus core needs to know about a network is collected
//! here: the genesis identity, protocol milestone heights, the embedded
//! transaction checksums verified at those milestones, forging targets, and
//! the hard limits on rollback, download, and block size.

use crate::id::BlockId;
use crate::network::NetworkId;

/// Maximum number of transactions in a block.
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 255;

/// Maximum total transaction payload per block, in bytes.
pub const MAX_PAYLOAD_LENGTH: u32 = 255 * 128;

/// Maximum height distance below the head from which rollback is supported.
pub const MAX_ROLLBACK: u32 = 1440;

/// Chain constants for one network.
#[derive(Clone, Debug)]
pub struct ChainParams {
    pub network: NetworkId,

    /// Hard-coded genesis block id. Never recomputed from signed bytes.
    pub genesis_block_id: BlockId,

    /// Height at which transparent forging activates; blocks switch from
    /// version 1 to version 2 after it.
    pub transparent_forging_height: u32,

    /// Height of the NQT money-unit switch; blocks switch to version 3 and
    /// transactions to version 1 after it.
    pub nqt_height: u32,

    /// Height from which referenced transactions are resolved by full hash
    /// and the whole reference chain must be present.
    pub referenced_full_hash_height: u32,

    /// Expected digest of all transactions when the chain reaches the
    /// transparent-forging milestone. `None` logs the computed value instead
    /// of enforcing.
    pub transparent_forging_checksum: Option<[u8; 32]>,

    /// Expected digest of all transactions at the NQT milestone.
    pub nqt_checksum: Option<[u8; 32]>,

    /// Base target of the genesis block.
    pub initial_base_target: u64,

    /// Upper clamp for base-target retargeting.
    pub max_base_target: u64,

    /// Forks deeper than this many blocks behind the head are not followed.
    pub max_fork_depth: u32,

    /// Maximum blocks accumulated per download tick.
    pub max_blocks_per_fetch: usize,

    /// Maximum `getNextBlocks` rounds per download tick.
    pub max_fetch_rounds: u32,

    /// A peer sending more milestone ids than this per response is rogue.
    pub max_milestone_ids: usize,

    /// A peer sending more block ids or blocks than this per response is rogue.
    pub max_next_ids: usize,

    /// Maximum depth of a referenced-transaction chain.
    pub max_referenced_depth: u32,

    /// Maximum age in seconds between a transaction and the oldest
    /// transaction its reference chain may reach.
    pub referenced_horizon_secs: u32,
}

const INITIAL_BASE_TARGET: u64 = 153_722_867;

impl ChainParams {
    pub fn for_network(network: NetworkId) -> Self {
        match network {
            NetworkId::Main => Self::main(),
            NetworkId::Test => Self::test(),
            NetworkId::Dev => Self::dev(),
        }
    }

    pub fn main() -> Self {
        Self {
            network: NetworkId::Main,
            genesis_block_id: BlockId::new(7_316_253_260_192_873_519),
            transparent_forging_height: 30_000,
            nqt_height: 132_000,
            referenced_full_hash_height: 140_000,
            transparent_forging_checksum: Some([
                0x1b, 0xca, 0xc5, 0x9e, 0x31, 0xd6, 0x30, 0xbc, 0x90, 0x31, 0x29, 0x5e, 0xd7,
                0x4e, 0xac, 0x1b, 0xa9, 0xea, 0xe4, 0x24, 0xde, 0xa6, 0x70, 0xce, 0xf7, 0x05,
                0x59, 0xdd, 0x50, 0x87, 0x80, 0x70,
            ]),
            nqt_checksum: Some([
                0x83, 0x11, 0x3f, 0xec, 0x5a, 0x9e, 0x34, 0x72, 0x07, 0x9c, 0xec, 0x99, 0xce,
                0x4c, 0x2e, 0xda, 0xe3, 0xd5, 0xd5, 0x2d, 0x51, 0x0c, 0xe2, 0x64, 0xbd, 0xce,
                0x90, 0xf1, 0x16, 0xc7, 0x54, 0x96,
            ]),
            ..Self::common(NetworkId::Main)
        }
    }

    pub fn test() -> Self {
        Self {
            network: NetworkId::Test,
            genesis_block_id: BlockId::new(2_577_710_164_107_706_621),
            transparent_forging_height: 2_880,
            nqt_height: 49_440,
            referenced_full_hash_height: 51_840,
            transparent_forging_checksum: Some([
                0x82, 0x8b, 0xa2, 0xf0, 0x7d, 0xa2, 0x26, 0x0a, 0x0b, 0x25, 0xdf, 0x04, 0xba,
                0xf8, 0xd8, 0xb0, 0x12, 0xeb, 0xca, 0x82, 0x6d, 0xb7, 0x3f, 0xc8, 0x43, 0x3b,
                0xe2, 0x53, 0xfa, 0xa5, 0xe8, 0x22,
            ]),
            nqt_checksum: Some([
                0x4d, 0x9f, 0x61, 0x0b, 0x2c, 0xe6, 0x7f, 0x3a, 0x85, 0x5b, 0x09, 0x2f, 0x6c,
                0xb2, 0x77, 0x41, 0xf8, 0x10, 0x97, 0x4c, 0x3e, 0x52, 0xd6, 0x15, 0xaa, 0x1f,
                0x08, 0xe0, 0x66, 0x92, 0x1d, 0x59,
            ]),
            ..Self::common(NetworkId::Test)
        }
    }

    /// Dev chain: every milestone is live from genesis and the checksums are
    /// log-only, so fresh chains accept blocks immediately.
    pub fn dev() -> Self {
        Self {
            network: NetworkId::Dev,
            genesis_block_id: BlockId::new(618_992_879_384_167_301),
            transparent_forging_height: 0,
            nqt_height: 0,
            referenced_full_hash_height: 0,
            transparent_forging_checksum: None,
            nqt_checksum: None,
            ..Self::common(NetworkId::Dev)
        }
    }

    fn common(network: NetworkId) -> Self {
        Self {
            network,
            genesis_block_id: BlockId::ZERO,
            transparent_forging_height: 0,
            nqt_height: 0,
            referenced_full_hash_height: 0,
            transparent_forging_checksum: None,
            nqt_checksum: None,
            initial_base_target: INITIAL_BASE_TARGET,
            max_base_target: INITIAL_BASE_TARGET * crate::amount::MAX_BALANCE_IGNIS,
            max_fork_depth: 720,
            max_blocks_per_fetch: 1440,
            max_fetch_rounds: 10,
            max_milestone_ids: 20,
            max_next_ids: 1440,
            max_referenced_depth: 10,
            referenced_horizon_secs: 60 * 1440 * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_ids_differ_per_network() {
        let main = ChainParams::main().genesis_block_id;
        let test = ChainParams::test().genesis_block_id;
        let dev = ChainParams::dev().genesis_block_id;
        assert_ne!(main, test);
        assert_ne!(main, dev);
        assert_ne!(test, dev);
    }

    #[test]
    fn dev_checksums_are_log_only() {
        let params = ChainParams::dev();
        assert!(params.transparent_forging_checksum.is_none());
        assert!(params.nqt_checksum.is_none());
    }

    #[test]
    fn milestone_ordering() {
        for params in [ChainParams::main(), ChainParams::test()] {
            assert!(params.transparent_forging_height < params.nqt_height);
            assert!(params.nqt_height < params.referenced_full_hash_height);
        }
    }

    #[test]
    fn max_base_target_covers_full_supply() {
        let params = ChainParams::main();
        assert_eq!(
            params.max_base_target,
            params.initial_base_target * crate::amount::MAX_BALANCE_IGNIS
        );
    }
}
