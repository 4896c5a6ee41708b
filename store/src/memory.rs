//! In-memory chain store.
//!
//! The reference backend: blocks live in a `Vec` in insertion order, with a
//! transaction index maintained alongside. The unit of work snapshots the
//! whole state on `begin_transaction` and restores it on rollback — the
//! semantics a durable backend provides with real write batches.

use crate::chain_store::ChainStore;
use ignis_chain::{Block, Transaction};
use ignis_types::{BlockId, FullHash, Timestamp, TxId};
use std::sync::Mutex;
use tracing::debug;

#[derive(Clone)]
struct TxRecord {
    id: TxId,
    full_hash: FullHash,
    timestamp: Timestamp,
    block_pos: usize,
    tx_pos: usize,
}

#[derive(Clone, Default)]
struct Inner {
    blocks: Vec<Block>,
    tx_index: Vec<TxRecord>,
}

impl Inner {
    fn index_block(&mut self, block_pos: usize) {
        let block = &self.blocks[block_pos];
        for (tx_pos, tx) in block.transactions.iter().enumerate() {
            self.tx_index.push(TxRecord {
                id: tx.id(),
                full_hash: tx.full_hash(),
                timestamp: tx.timestamp,
                block_pos,
                tx_pos,
            });
        }
    }

    fn lookup(&self, record: &TxRecord) -> Transaction {
        self.blocks[record.block_pos].transactions[record.tx_pos].clone()
    }
}

#[derive(Default)]
struct State {
    inner: Inner,
    snapshot: Option<Inner>,
}

#[derive(Default)]
pub struct MemoryChainStore {
    state: Mutex<State>,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for MemoryChainStore {
    fn begin_transaction(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(
            state.snapshot.is_none(),
            "store transaction already in progress"
        );
        state.snapshot = Some(state.inner.clone());
    }

    fn commit_transaction(&self) {
        let mut state = self.state.lock().unwrap();
        assert!(state.snapshot.is_some(), "commit outside store transaction");
        state.snapshot = Some(state.inner.clone());
    }

    fn rollback_transaction(&self) {
        let mut state = self.state.lock().unwrap();
        let snapshot = state
            .snapshot
            .clone()
            .expect("rollback outside store transaction");
        state.inner = snapshot;
    }

    fn end_transaction(&self) {
        self.state.lock().unwrap().snapshot = None;
    }

    fn is_in_transaction(&self) -> bool {
        self.state.lock().unwrap().snapshot.is_some()
    }

    fn save_block(&self, block: &Block) {
        let mut state = self.state.lock().unwrap();
        let pos = state.inner.blocks.len();
        state.inner.blocks.push(block.clone());
        state.inner.index_block(pos);
    }

    fn has_block(&self, id: BlockId) -> bool {
        let state = self.state.lock().unwrap();
        state.inner.blocks.iter().any(|b| b.id() == id)
    }

    fn block(&self, id: BlockId) -> Option<Block> {
        let state = self.state.lock().unwrap();
        state.inner.blocks.iter().find(|b| b.id() == id).cloned()
    }

    fn block_at_height(&self, height: u32) -> Option<Block> {
        let state = self.state.lock().unwrap();
        state
            .inner
            .blocks
            .iter()
            .find(|b| b.height == height)
            .cloned()
    }

    fn block_id_at_height(&self, height: u32) -> Option<BlockId> {
        self.block_at_height(height).map(|b| b.id())
    }

    fn last_block(&self) -> Option<Block> {
        self.state.lock().unwrap().inner.blocks.last().cloned()
    }

    fn blocks_from_height(&self, height: u32) -> Vec<Block> {
        let state = self.state.lock().unwrap();
        state
            .inner
            .blocks
            .iter()
            .filter(|b| b.height >= height)
            .cloned()
            .collect()
    }

    fn delete_blocks_from(&self, id: BlockId) {
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state.inner.blocks.iter().position(|b| b.id() == id) else {
            return;
        };
        state.inner.blocks.truncate(pos);
        state.inner.tx_index.retain(|record| record.block_pos < pos);
    }

    fn delete_all(&self) {
        let mut state = self.state.lock().unwrap();
        state.inner = Inner::default();
    }

    fn block_count(&self) -> u64 {
        self.state.lock().unwrap().inner.blocks.len() as u64
    }

    fn has_transaction(&self, id: TxId) -> bool {
        let state = self.state.lock().unwrap();
        state.inner.tx_index.iter().any(|record| record.id == id)
    }

    fn transaction(&self, id: TxId) -> Option<Transaction> {
        let state = self.state.lock().unwrap();
        state
            .inner
            .tx_index
            .iter()
            .find(|record| record.id == id)
            .map(|record| state.inner.lookup(record))
    }

    fn transaction_by_full_hash(&self, hash: &FullHash) -> Option<Transaction> {
        let state = self.state.lock().unwrap();
        state
            .inner
            .tx_index
            .iter()
            .find(|record| record.full_hash == *hash)
            .map(|record| state.inner.lookup(record))
    }

    fn transactions_ordered(&self) -> Vec<Transaction> {
        let state = self.state.lock().unwrap();
        let mut records = state.inner.tx_index.clone();
        records.sort_by_key(|record| (record.id, record.timestamp));
        records
            .iter()
            .map(|record| state.inner.lookup(record))
            .collect()
    }

    fn transaction_count(&self) -> u64 {
        self.state.lock().unwrap().inner.tx_index.len() as u64
    }

    fn analyze(&self) {
        let state = self.state.lock().unwrap();
        debug!(
            blocks = state.inner.blocks.len(),
            transactions = state.inner.tx_index.len(),
            "memory store analyzed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignis_chain::genesis::create_genesis_block;
    use ignis_types::ChainParams;

    fn genesis() -> Block {
        create_genesis_block(&ChainParams::dev()).unwrap()
    }

    #[test]
    fn save_and_lookup_block() {
        let store = MemoryChainStore::new();
        let block = genesis();
        store.save_block(&block);

        assert!(store.has_block(block.id()));
        assert_eq!(store.block(block.id()).unwrap().id(), block.id());
        assert_eq!(store.block_at_height(0).unwrap().id(), block.id());
        assert_eq!(store.last_block().unwrap().id(), block.id());
        assert_eq!(store.block_count(), 1);
    }

    #[test]
    fn transactions_are_indexed() {
        let store = MemoryChainStore::new();
        let block = genesis();
        store.save_block(&block);

        let tx = &block.transactions[0];
        assert!(store.has_transaction(tx.id()));
        assert_eq!(
            store.transaction_by_full_hash(&tx.full_hash()).unwrap().id(),
            tx.id()
        );
        assert_eq!(store.transaction_count(), block.transactions.len() as u64);
    }

    #[test]
    fn rollback_restores_snapshot() {
        let store = MemoryChainStore::new();
        let block = genesis();

        store.begin_transaction();
        store.save_block(&block);
        assert_eq!(store.block_count(), 1);
        store.rollback_transaction();
        store.end_transaction();

        assert_eq!(store.block_count(), 0);
        assert!(!store.is_in_transaction());
    }

    #[test]
    fn commit_advances_rollback_point() {
        let store = MemoryChainStore::new();
        let block = genesis();

        store.begin_transaction();
        store.save_block(&block);
        store.commit_transaction();
        store.delete_all();
        store.rollback_transaction();
        store.end_transaction();

        // The commit made the save durable; only the delete was rolled back.
        assert_eq!(store.block_count(), 1);
    }

    #[test]
    fn delete_blocks_from_truncates_tail() {
        let store = MemoryChainStore::new();
        let block = genesis();
        store.save_block(&block);
        store.delete_blocks_from(block.id());

        assert_eq!(store.block_count(), 0);
        assert_eq!(store.transaction_count(), 0);
    }

    #[test]
    fn delete_unknown_id_is_noop() {
        let store = MemoryChainStore::new();
        store.save_block(&genesis());
        store.delete_blocks_from(BlockId::new(12345));
        assert_eq!(store.block_count(), 1);
    }

    #[test]
    fn ordered_transactions_sorted_by_id() {
        let store = MemoryChainStore::new();
        store.save_block(&create_genesis_block(&ChainParams::main()).unwrap());
        let ordered = store.transactions_ordered();
        let ids: Vec<_> = ordered.iter().map(Transaction::id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    #[should_panic(expected = "already in progress")]
    fn nested_begin_panics() {
        let store = MemoryChainStore::new();
        store.begin_transaction();
        store.begin_transaction();
    }
}
