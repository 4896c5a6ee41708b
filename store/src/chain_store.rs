//! The chain store trait.

use ignis_chain::{Block, Transaction};
use ignis_types::{BlockId, FullHash, TxId};

/// Block and transaction storage with a unit-of-work surface.
///
/// Mutations between `begin_transaction` and `commit_transaction` become
/// durable together; `rollback_transaction` discards them. `end_transaction`
/// releases the unit of work unconditionally and must be called on every
/// exit path. Within a unit of work, `commit_transaction` may be called
/// repeatedly to advance the rollback point (the rescan engine commits once
/// per replayed block).
pub trait ChainStore: Send + Sync {
    // ── Unit of work ───────────────────────────────────────────────────

    fn begin_transaction(&self);
    fn commit_transaction(&self);
    fn rollback_transaction(&self);
    fn end_transaction(&self);
    fn is_in_transaction(&self) -> bool;

    // ── Blocks ─────────────────────────────────────────────────────────

    /// Append a block. The stored value carries its derived chain state
    /// (height, base target, cumulative difficulty).
    fn save_block(&self, block: &Block);

    fn has_block(&self, id: BlockId) -> bool;

    fn block(&self, id: BlockId) -> Option<Block>;

    fn block_at_height(&self, height: u32) -> Option<Block>;

    fn block_id_at_height(&self, height: u32) -> Option<BlockId>;

    /// The most recently stored block.
    fn last_block(&self) -> Option<Block>;

    /// All blocks at or above `height`, in insertion order.
    fn blocks_from_height(&self, height: u32) -> Vec<Block>;

    /// Delete the block with the given id and everything stored after it.
    /// Unknown ids are a no-op.
    fn delete_blocks_from(&self, id: BlockId);

    /// Drop every block and transaction.
    fn delete_all(&self);

    fn block_count(&self) -> u64;

    // ── Transactions ───────────────────────────────────────────────────

    fn has_transaction(&self, id: TxId) -> bool;

    fn transaction(&self, id: TxId) -> Option<Transaction>;

    fn transaction_by_full_hash(&self, hash: &FullHash) -> Option<Transaction>;

    /// Every stored transaction ordered by (id, timestamp) — the canonical
    /// order for milestone checksums.
    fn transactions_ordered(&self) -> Vec<Transaction>;

    fn transaction_count(&self) -> u64;

    // ── Maintenance ────────────────────────────────────────────────────

    /// Backend maintenance hook (statistics refresh, compaction).
    fn analyze(&self) {}
}
