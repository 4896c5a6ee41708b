//! The unconfirmed transaction pool.
//!
//! The slice of the transaction subsystem the blockchain processor talks
//! to: candidate transactions for block generation, wholesale requeueing
//! around block acceptance, and the "process later" queue that receives
//! transactions from popped or rejected blocks for deferred re-ingestion.

use ignis_chain::Transaction;
use ignis_types::{ChainParams, TxId};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    /// Unconfirmed transactions by id, iterated in id order.
    unconfirmed: BTreeMap<TxId, Transaction>,
    /// Deferred re-ingestion queue.
    pending: VecDeque<Transaction>,
}

pub struct UnconfirmedPool {
    params: ChainParams,
    inner: Mutex<Inner>,
}

impl UnconfirmedPool {
    pub fn new(params: ChainParams) -> Self {
        Self {
            params,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Expected transaction version for blocks following `prev_height`.
    pub fn transaction_version(&self, prev_height: u32) -> u8 {
        if prev_height < self.params.nqt_height {
            0
        } else {
            1
        }
    }

    /// Add a transaction to the unconfirmed pool. Duplicates by id are
    /// refused.
    pub fn add(&self, tx: Transaction) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let id = tx.id();
        if inner.unconfirmed.contains_key(&id) {
            return false;
        }
        inner.unconfirmed.insert(id, tx);
        true
    }

    pub fn all_unconfirmed(&self) -> Vec<Transaction> {
        self.inner
            .lock()
            .unwrap()
            .unconfirmed
            .values()
            .cloned()
            .collect()
    }

    /// Evict a transaction from the pool and the pending queue (used for
    /// permanently invalid transactions).
    pub fn remove(&self, id: TxId) -> Option<Transaction> {
        let mut inner = self.inner.lock().unwrap();
        inner.pending.retain(|pending| pending.id() != id);
        inner.unconfirmed.remove(&id)
    }

    pub fn contains(&self, id: TxId) -> bool {
        self.inner.lock().unwrap().unconfirmed.contains_key(&id)
    }

    /// Move every unconfirmed transaction back to the pending queue. Called
    /// before each block is applied; accepted transactions are dropped from
    /// the queue by [`Self::notify_confirmed`], the rest are re-ingested
    /// later.
    pub fn requeue_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        let requeued: Vec<Transaction> = inner.unconfirmed.values().cloned().collect();
        inner.unconfirmed.clear();
        inner.pending.extend(requeued);
    }

    /// Queue transactions from popped or rejected blocks for deferred
    /// re-ingestion.
    pub fn process_later(&self, transactions: impl IntoIterator<Item = Transaction>) {
        let mut inner = self.inner.lock().unwrap();
        inner.pending.extend(transactions);
    }

    /// Drop newly confirmed transactions from both the pool and the pending
    /// queue.
    pub fn notify_confirmed(&self, transactions: &[Transaction]) {
        let mut inner = self.inner.lock().unwrap();
        for tx in transactions {
            let id = tx.id();
            inner.unconfirmed.remove(&id);
            inner.pending.retain(|pending| pending.id() != id);
        }
    }

    /// Pull up to `limit` deferred transactions for re-ingestion.
    pub fn drain_pending(&self, limit: usize) -> Vec<Transaction> {
        let mut inner = self.inner.lock().unwrap();
        let take = limit.min(inner.pending.len());
        inner.pending.drain(..take).collect()
    }

    pub fn unconfirmed_count(&self) -> usize {
        self.inner.lock().unwrap().unconfirmed.len()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }
}
