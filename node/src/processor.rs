//! The blockchain processor.
//!
//! Owns the head of the chain and every mutating transition: pushing
//! candidate blocks through the validation pipeline, popping blocks off for
//! rollback, reconciling forks by cumulative difficulty, replaying the
//! persisted chain, and assembling new blocks from the unconfirmed pool.
//!
//! A single chain mutex serializes all mutations. Public entry points take
//! the lock; `*_locked` methods assume it is held — Rust mutexes are not
//! re-entrant, so the split is load-bearing. The head is published through
//! an `RwLock` snapshot so read paths never need the chain lock.
//!
//! Every mutating operation is bracketed by a store unit of work: commit on
//! success, rollback plus head restoration on any failure, and an
//! unconditional `end_transaction`.

use crate::error::{BlockNotAccepted, NodeError};
use crate::events::{BlockEvent, BlockListeners, ListenerId};
use crate::mempool::UnconfirmedPool;
use ignis_chain::{
    forge, genesis, AccountLedger, AliasLedger, Block, DerivedTable, DuplicateTracker,
    Transaction, TransactionApplier, ValidationError,
};
use ignis_crypto::{keypair_from_secret_phrase, sha256, Digest, Sha256};
use ignis_peers::{Peer, PeerRegistry, PeerRequest};
use ignis_store::ChainStore;
use ignis_types::params::{MAX_PAYLOAD_LENGTH, MAX_ROLLBACK, MAX_TRANSACTIONS_PER_BLOCK};
use ignis_types::{ChainParams, EpochClock, FullHash, PublicKey, Timestamp};
use num_bigint::BigUint;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info};

/// Blocks between derived-table trims.
const TRIM_FREQUENCY: u32 = 1440;

/// Blocks between progress log lines and store analyses.
const LOG_FREQUENCY: u32 = 5000;

/// Behavior switches, normally taken from the node configuration.
#[derive(Clone, Debug, Default)]
pub struct ProcessorOptions {
    /// Compact derived-table undo history below the rollback horizon.
    pub trim_derived_tables: bool,
    /// Run a full rescan during `init`.
    pub force_scan: bool,
    /// Re-validate blocks and transactions during the next scan.
    pub validate_at_scan: bool,
    /// Generator keys whose generation signatures are accepted unverified.
    pub allow_fake_forging: Vec<PublicKey>,
    /// Peers to gossip freshly accepted blocks to.
    pub gossip_fan_out: usize,
}

pub struct BlockchainProcessor {
    params: ChainParams,
    store: Arc<dyn ChainStore>,
    clock: Arc<dyn EpochClock>,
    pool: Arc<UnconfirmedPool>,
    applier: TransactionApplier,
    accounts: Arc<AccountLedger>,

    listeners: BlockListeners,
    derived_tables: Arc<RwLock<Vec<Arc<dyn DerivedTable>>>>,

    chain_lock: Mutex<()>,
    last_block: RwLock<Option<Arc<Block>>>,

    peers: RwLock<Option<Arc<PeerRegistry>>>,

    trim_derived_tables: bool,
    last_trim_height: Arc<AtomicU32>,
    force_scan: bool,
    validate_at_scan: AtomicBool,
    is_scanning: AtomicBool,
    get_more_blocks: AtomicBool,
    allow_fake_forging: Vec<PublicKey>,
    gossip_fan_out: usize,

    last_feeder: Mutex<Option<String>>,
    last_feeder_height: AtomicU32,
}

impl BlockchainProcessor {
    pub fn new(
        params: ChainParams,
        store: Arc<dyn ChainStore>,
        clock: Arc<dyn EpochClock>,
        pool: Arc<UnconfirmedPool>,
        accounts: Arc<AccountLedger>,
        aliases: Arc<AliasLedger>,
        options: ProcessorOptions,
    ) -> Self {
        let derived_tables: Arc<RwLock<Vec<Arc<dyn DerivedTable>>>> = Arc::new(RwLock::new(vec![
            accounts.clone() as Arc<dyn DerivedTable>,
            aliases.clone() as Arc<dyn DerivedTable>,
        ]));
        let last_trim_height = Arc::new(AtomicU32::new(0));

        let processor = Self {
            params,
            store: store.clone(),
            clock,
            pool,
            applier: TransactionApplier::new(accounts.clone(), aliases),
            accounts,
            listeners: BlockListeners::new(),
            derived_tables: derived_tables.clone(),
            chain_lock: Mutex::new(()),
            last_block: RwLock::new(None),
            peers: RwLock::new(None),
            trim_derived_tables: options.trim_derived_tables,
            last_trim_height: last_trim_height.clone(),
            force_scan: options.force_scan,
            validate_at_scan: AtomicBool::new(options.validate_at_scan),
            is_scanning: AtomicBool::new(false),
            get_more_blocks: AtomicBool::new(true),
            allow_fake_forging: options.allow_fake_forging,
            gossip_fan_out: options.gossip_fan_out,
            last_feeder: Mutex::new(None),
            last_feeder_height: AtomicU32::new(0),
        };

        processor.listeners.add(BlockEvent::BlockScanned, |block| {
            if block.height % LOG_FREQUENCY == 0 {
                info!("processed block {}", block.height);
            }
        });
        let analyze_store = store.clone();
        processor.listeners.add(BlockEvent::BlockPushed, move |block| {
            if block.height % LOG_FREQUENCY == 0 {
                info!("received block {}", block.height);
                analyze_store.analyze();
            }
        });
        if processor.trim_derived_tables {
            let tables = derived_tables;
            let trim_height = last_trim_height;
            processor
                .listeners
                .add(BlockEvent::AfterBlockApply, move |block| {
                    if block.height % TRIM_FREQUENCY == 0 {
                        let trim_to = block.height.saturating_sub(MAX_ROLLBACK);
                        trim_height.store(trim_to, Ordering::SeqCst);
                        if trim_to > 0 {
                            for table in tables.read().unwrap().iter() {
                                table.trim(trim_to);
                            }
                        }
                    }
                });
        }
        let rescan_store = store;
        processor.listeners.add(BlockEvent::RescanEnd, move |_| {
            rescan_store.analyze();
        });

        processor
    }

    /// Bootstrap the chain: adopt the stored chain or commit genesis, then
    /// run the startup rescan if configured.
    pub fn init(&self) -> Result<(), NodeError> {
        {
            let _guard = self.chain_lock.lock().unwrap();
            self.add_genesis_block_locked()?;
        }
        if self.force_scan {
            self.scan(0)?;
        }
        Ok(())
    }

    // ── Head accessors ─────────────────────────────────────────────────

    /// Snapshot of the current head.
    pub fn last_block(&self) -> Arc<Block> {
        self.last_block
            .read()
            .unwrap()
            .clone()
            .expect("blockchain not yet initialized")
    }

    pub fn height(&self) -> u32 {
        self.last_block().height
    }

    pub fn cumulative_difficulty(&self) -> BigUint {
        self.last_block().cumulative_difficulty.clone()
    }

    fn set_last_block(&self, block: Arc<Block>) {
        *self.last_block.write().unwrap() = Some(block);
    }

    // ── Control surface ────────────────────────────────────────────────

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn store(&self) -> &Arc<dyn ChainStore> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<UnconfirmedPool> {
        &self.pool
    }

    pub fn accounts(&self) -> &Arc<AccountLedger> {
        &self.accounts
    }

    pub fn set_peers(&self, peers: Arc<PeerRegistry>) {
        *self.peers.write().unwrap() = Some(peers);
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning.load(Ordering::SeqCst)
    }

    pub fn validate_at_next_scan(&self) {
        self.validate_at_scan.store(true, Ordering::SeqCst);
    }

    pub fn set_get_more_blocks(&self, get_more_blocks: bool) {
        self.get_more_blocks.store(get_more_blocks, Ordering::SeqCst);
    }

    pub fn get_more_blocks(&self) -> bool {
        self.get_more_blocks.load(Ordering::SeqCst)
    }

    pub fn register_derived_table(&self, table: Arc<dyn DerivedTable>) {
        self.derived_tables.write().unwrap().push(table);
    }

    pub fn add_listener(
        &self,
        event: BlockEvent,
        listener: impl Fn(&Block) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.add(event, listener)
    }

    pub fn remove_listener(&self, event: BlockEvent, id: ListenerId) -> bool {
        self.listeners.remove(event, id)
    }

    /// Lowest height the chain can be rewound to given current trimming.
    pub fn min_rollback_height(&self) -> u32 {
        if !self.trim_derived_tables {
            return 0;
        }
        let last_trim = self.last_trim_height.load(Ordering::SeqCst);
        if last_trim > 0 {
            last_trim
        } else {
            self.height().saturating_sub(MAX_ROLLBACK)
        }
    }

    pub fn last_blockchain_feeder(&self) -> Option<String> {
        self.last_feeder.lock().unwrap().clone()
    }

    pub fn last_blockchain_feeder_height(&self) -> u32 {
        self.last_feeder_height.load(Ordering::SeqCst)
    }

    pub(crate) fn set_last_blockchain_feeder(&self, address: &str, height: u32) {
        *self.last_feeder.lock().unwrap() = Some(address.to_string());
        self.last_feeder_height.store(height, Ordering::SeqCst);
    }

    pub(crate) fn allows_fake_forging(&self, key: &PublicKey) -> bool {
        self.allow_fake_forging.contains(key)
    }

    pub(crate) fn chain_guard(&self) -> MutexGuard<'_, ()> {
        self.chain_lock.lock().unwrap()
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // ── Genesis bootstrap ──────────────────────────────────────────────

    fn add_genesis_block_locked(&self) -> Result<(), NodeError> {
        if self.store.has_block(self.params.genesis_block_id) {
            let last = self
                .store
                .last_block()
                .expect("store with genesis has a last block");
            info!("genesis block already in database, last block height {}", last.height);
            self.set_last_block(Arc::new(last));
            return Ok(());
        }
        info!("genesis block not in database, starting from scratch");
        let genesis_block = genesis::create_genesis_block(&self.params)?;
        self.store.save_block(&genesis_block);
        self.applier.apply_genesis(&genesis_block);
        self.set_last_block(Arc::new(genesis_block));
        Ok(())
    }

    // ── Push pipeline ──────────────────────────────────────────────────

    /// Validate a candidate block against the head and commit it.
    pub fn push_block(&self, block: Block) -> Result<(), BlockNotAccepted> {
        let _guard = self.chain_lock.lock().unwrap();
        self.push_block_locked(block)
    }

    /// Parse and push a block received on the peer API.
    pub fn process_peer_block(&self, request: &Value) -> Result<(), NodeError> {
        let block = Block::parse_json(request, self.clock.now(), &self.params)?;
        self.push_block(block)?;
        Ok(())
    }

    pub(crate) fn push_block_locked(&self, mut block: Block) -> Result<(), BlockNotAccepted> {
        let cur_time = self.clock.now();
        let previous = self.last_block();

        self.store.begin_transaction();
        let result = self.apply_push(&mut block, &previous, cur_time);
        match &result {
            Ok(()) => self.store.commit_transaction(),
            Err(_) => {
                self.store.rollback_transaction();
                self.set_last_block(previous);
            }
        }
        self.store.end_transaction();
        result?;

        let head = self.last_block();
        self.listeners.notify(BlockEvent::BlockPushed, &head);
        if head.timestamp >= self.clock.now().saturating_sub(15) {
            self.gossip(&head);
        }
        Ok(())
    }

    fn apply_push(
        &self,
        block: &mut Block,
        previous: &Arc<Block>,
        cur_time: Timestamp,
    ) -> Result<(), BlockNotAccepted> {
        if previous.id() != block.previous_block_id {
            return Err(BlockNotAccepted::OutOfOrder(
                "previous block id doesn't match".into(),
            ));
        }
        let expected_version = forge::block_version(previous.height, &self.params);
        if block.version != expected_version {
            return Err(BlockNotAccepted::Invalid(format!(
                "invalid version {}",
                block.version
            )));
        }
        if previous.height == self.params.transparent_forging_height
            && !self.verify_checksum(&self.params.transparent_forging_checksum)
        {
            return Err(BlockNotAccepted::Invalid("checksum failed".into()));
        }
        if previous.height == self.params.nqt_height
            && !self.verify_checksum(&self.params.nqt_checksum)
        {
            return Err(BlockNotAccepted::Invalid("checksum failed".into()));
        }
        if block.version != 1 {
            let prev_hash = FullHash::new(sha256(&previous.bytes()));
            if block.previous_block_hash != Some(prev_hash) {
                return Err(BlockNotAccepted::Invalid(
                    "previous block hash doesn't match".into(),
                ));
            }
        }
        if block.timestamp > cur_time.saturating_add(15) || block.timestamp <= previous.timestamp {
            return Err(BlockNotAccepted::OutOfOrder(format!(
                "invalid timestamp {}, current time is {}, previous block timestamp is {}",
                block.timestamp, cur_time, previous.timestamp
            )));
        }
        if block.id().is_zero() || self.store.has_block(block.id()) {
            return Err(BlockNotAccepted::Invalid("duplicate block or invalid id".into()));
        }
        let effective_balance = self.accounts.effective_balance_coins(block.generator_id());
        if !block.verify_generation_signature(previous, effective_balance)
            && !self.allows_fake_forging(&block.generator_public_key)
        {
            return Err(BlockNotAccepted::Invalid(
                "generation signature verification failed".into(),
            ));
        }
        if !block.verify_block_signature() {
            return Err(BlockNotAccepted::Invalid(
                "block signature verification failed".into(),
            ));
        }

        let mut duplicates = DuplicateTracker::new();
        let mut calculated_total_amount: u64 = 0;
        let mut calculated_total_fee: u64 = 0;
        let mut digest = Sha256::new();

        for tx in &block.transactions {
            if tx.timestamp > cur_time.saturating_add(15) {
                return Err(BlockNotAccepted::OutOfOrder(format!(
                    "invalid transaction timestamp {}, current time is {}",
                    tx.timestamp, cur_time
                )));
            }
            // Block 303 contains a transaction which expired before the
            // block timestamp.
            if tx.timestamp > block.timestamp.saturating_add(15)
                || (tx.expiration() < block.timestamp && previous.height != 303)
            {
                return Err(BlockNotAccepted::transaction(
                    format!(
                        "invalid transaction timestamp {}, block timestamp is {}",
                        tx.timestamp, block.timestamp
                    ),
                    tx,
                ));
            }
            if self.store.has_transaction(tx.id()) {
                return Err(BlockNotAccepted::transaction(
                    "transaction is already in the blockchain",
                    tx,
                ));
            }
            if let Some(referenced) = &tx.referenced_transaction_full_hash {
                let satisfied = if previous.height < self.params.referenced_full_hash_height {
                    self.store.has_transaction(referenced.to_tx_id())
                } else {
                    self.has_all_referenced_transactions(tx, tx.timestamp, 0)
                };
                if !satisfied {
                    return Err(BlockNotAccepted::transaction(
                        format!("missing or invalid referenced transaction {referenced}"),
                        tx,
                    ));
                }
            }
            if tx.version != self.pool.transaction_version(previous.height) {
                return Err(BlockNotAccepted::transaction(
                    format!("invalid transaction version {}", tx.version),
                    tx,
                ));
            }
            if !tx.verify_signature() {
                return Err(BlockNotAccepted::transaction(
                    "signature verification failed",
                    tx,
                ));
            }
            if tx.id().is_zero() {
                return Err(BlockNotAccepted::transaction("invalid transaction id", tx));
            }
            if duplicates.is_duplicate(&tx.attachment) {
                return Err(BlockNotAccepted::transaction("transaction is a duplicate", tx));
            }
            if let Err(e) = tx.validate() {
                return Err(BlockNotAccepted::transaction(e.to_string(), tx));
            }

            calculated_total_amount += tx.amount_nqt;
            calculated_total_fee += tx.fee_nqt;
            digest.update(tx.bytes());
        }

        if calculated_total_amount != block.total_amount_nqt
            || calculated_total_fee != block.total_fee_nqt
        {
            return Err(BlockNotAccepted::Invalid(
                "total amount or fee don't match transaction totals".into(),
            ));
        }
        let payload_hash = FullHash::new(digest.finalize().into());
        if payload_hash != block.payload_hash {
            return Err(BlockNotAccepted::Invalid("payload hash doesn't match".into()));
        }

        block.set_previous(previous, &self.params);
        self.listeners.notify(BlockEvent::BeforeBlockAccept, block);
        self.pool.requeue_all();
        self.store.save_block(block);
        let accepted = Arc::new(block.clone());
        self.set_last_block(accepted.clone());
        self.accept(&accepted)
    }

    /// Apply an accepted block: unconfirmed reservations (double-spend
    /// check), the confirmed state transition, and pool notification.
    fn accept(&self, block: &Block) -> Result<(), BlockNotAccepted> {
        for tx in &block.transactions {
            if !self.applier.apply_unconfirmed(tx, block.height) {
                return Err(BlockNotAccepted::transaction("double spending transaction", tx));
            }
        }
        self.listeners.notify(BlockEvent::BeforeBlockApply, block);
        self.applier.apply_block(block);
        self.listeners.notify(BlockEvent::AfterBlockApply, block);
        if !block.transactions.is_empty() {
            self.pool.notify_confirmed(&block.transactions);
        }
        Ok(())
    }

    fn gossip(&self, block: &Block) {
        if let Some(peers) = self.peers.read().unwrap().as_ref() {
            let request = PeerRequest::ProcessBlock {
                block: block.to_json(),
            };
            peers.send_to_some(&request, self.gossip_fan_out);
        }
    }

    // ── Checksums ──────────────────────────────────────────────────────

    fn calculate_transactions_checksum(&self) -> [u8; 32] {
        let mut digest = Sha256::new();
        for tx in self.store.transactions_ordered() {
            digest.update(tx.bytes());
        }
        digest.finalize().into()
    }

    fn verify_checksum(&self, expected: &Option<[u8; 32]>) -> bool {
        let checksum = self.calculate_transactions_checksum();
        match expected {
            None => {
                info!("checksum calculated: {}", hex::encode(checksum));
                true
            }
            Some(valid) if checksum != *valid => {
                error!(
                    "checksum failed at block {}: {}",
                    self.height(),
                    hex::encode(checksum)
                );
                false
            }
            Some(_) => {
                info!("checksum passed at block {}", self.height());
                true
            }
        }
    }

    // ── Referenced transactions ────────────────────────────────────────

    /// Whether the whole referenced-transaction chain of `tx` is present,
    /// within depth and age bounds.
    pub(crate) fn has_all_referenced_transactions(
        &self,
        tx: &Transaction,
        timestamp: Timestamp,
        depth: u32,
    ) -> bool {
        let Some(referenced) = &tx.referenced_transaction_full_hash else {
            return timestamp.delta(tx.timestamp) < i64::from(self.params.referenced_horizon_secs)
                && depth < self.params.max_referenced_depth;
        };
        match self.store.transaction_by_full_hash(referenced) {
            Some(referenced_tx) => {
                self.has_all_referenced_transactions(&referenced_tx, timestamp, depth + 1)
            }
            None => false,
        }
    }

    // ── Rollback ───────────────────────────────────────────────────────

    /// Pop blocks off until the head is at `height`. Returns the popped
    /// blocks, head first.
    pub fn pop_off_to(&self, height: u32) -> Result<Vec<Block>, NodeError> {
        let _guard = self.chain_lock.lock().unwrap();
        let common = self
            .store
            .block_at_height(height)
            .ok_or(NodeError::UnknownHeight(height))?;
        self.pop_off_to_locked(&common)
    }

    pub(crate) fn pop_off_to_locked(&self, common: &Block) -> Result<Vec<Block>, NodeError> {
        if common.height < self.min_rollback_height() {
            return Err(NodeError::RollbackNotSupported(common.height));
        }
        if !self.store.has_block(common.id()) {
            debug!("block {} not found in blockchain, nothing to pop off", common.id());
            return Ok(Vec::new());
        }
        let mut popped = Vec::new();
        self.store.begin_transaction();
        let mut block = self.last_block();
        debug!("rollback from {} to {}", block.height, common.height);
        while block.id() != common.id() && block.id() != self.params.genesis_block_id {
            popped.push((*block).clone());
            block = Arc::new(self.pop_last_block_locked());
        }
        for table in self.derived_tables.read().unwrap().iter() {
            table.rollback(common.height);
        }
        self.store.commit_transaction();
        self.store.end_transaction();
        Ok(popped)
    }

    /// Remove the head block, returning the new head.
    fn pop_last_block_locked(&self) -> Block {
        let block = self.last_block();
        if block.id() == self.params.genesis_block_id {
            panic!("cannot pop off genesis block");
        }
        let previous = self
            .store
            .block(block.previous_block_id)
            .expect("previous block missing from store");
        self.set_last_block(Arc::new(previous.clone()));
        self.store.delete_blocks_from(block.id());
        self.listeners.notify(BlockEvent::BlockPopped, &block);
        previous
    }

    // ── Fork reconciliation ────────────────────────────────────────────

    /// Try an alternative branch delivered by `peer`: roll back to the
    /// common ancestor, push the fork, and keep whichever branch ends up
    /// with more cumulative difficulty. The loser's transactions go to the
    /// deferred queue.
    pub fn process_fork(
        &self,
        peer: &dyn Peer,
        fork_blocks: Vec<Block>,
        common_block: &Block,
    ) -> Result<(), NodeError> {
        let _guard = self.chain_lock.lock().unwrap();

        let cur_cumulative_difficulty = self.last_block().cumulative_difficulty.clone();
        let mut my_popped_blocks = self.pop_off_to_locked(common_block)?;

        let mut pushed_fork_blocks = 0;
        if self.last_block().id() == common_block.id() {
            for block in fork_blocks {
                if self.last_block().id() == block.previous_block_id {
                    match self.push_block_locked(block) {
                        Ok(()) => pushed_fork_blocks += 1,
                        Err(e) => {
                            peer.blacklist(&e.to_string());
                            break;
                        }
                    }
                }
            }
        }

        if pushed_fork_blocks > 0
            && self.last_block().cumulative_difficulty < cur_cumulative_difficulty
        {
            debug!("pop off caused by peer {}, blacklisting", peer.address());
            peer.blacklist("fork with lower cumulative difficulty");
            let peer_popped_blocks = self.pop_off_to_locked(common_block)?;
            pushed_fork_blocks = 0;
            for block in peer_popped_blocks {
                self.pool.process_later(block.transactions);
            }
        }

        if pushed_fork_blocks == 0 {
            for block in my_popped_blocks.drain(..).rev() {
                if let Err(e) = self.push_block_locked(block) {
                    error!("popped off block no longer acceptable: {e}");
                    break;
                }
            }
        } else {
            for block in my_popped_blocks {
                self.pool.process_later(block.transactions);
            }
        }
        Ok(())
    }

    // ── Rescan ─────────────────────────────────────────────────────────

    /// Replay persisted blocks from `height`, rebuilding derived state.
    pub fn scan(&self, height: u32) -> Result<(), NodeError> {
        let _guard = self.chain_lock.lock().unwrap();
        self.scan_locked(height)
    }

    /// Rescan the most recent `num_blocks` blocks.
    pub fn scan_by_num_blocks(&self, num_blocks: u32) -> Result<(), NodeError> {
        let height = self
            .height()
            .saturating_sub(num_blocks.saturating_sub(1));
        self.scan(height)
    }

    fn scan_locked(&self, requested_height: u32) -> Result<(), NodeError> {
        let blockchain_height = self.height();
        if requested_height > blockchain_height + 1 {
            return Err(NodeError::ScanHeightTooHigh {
                requested: requested_height,
                current: blockchain_height,
            });
        }
        let mut height = requested_height;
        if height > 0 && height < self.min_rollback_height() {
            info!("rollback of more than {MAX_ROLLBACK} blocks not supported, will do a full scan");
            height = 0;
        }
        info!("scanning blockchain starting from height {height}...");
        let validate = self.validate_at_scan.load(Ordering::SeqCst);
        if validate {
            debug!("also verifying signatures and validating transactions...");
        }

        self.is_scanning.store(true, Ordering::SeqCst);
        self.store.begin_transaction();
        self.pool.requeue_all();
        for table in self.derived_tables.read().unwrap().iter() {
            if height == 0 {
                table.truncate();
            } else {
                table.rollback(height - 1);
            }
        }

        let blocks = self.store.blocks_from_height(height);
        let Some(first) = blocks.first() else {
            // Nothing at or above the requested height; the head stays.
            self.store.end_transaction();
            self.validate_at_scan.store(false, Ordering::SeqCst);
            self.is_scanning.store(false, Ordering::SeqCst);
            return Ok(());
        };
        self.listeners.notify(BlockEvent::RescanBegin, first);
        if height == 0 {
            // Special-cased so there is never a missing head: the genesis
            // block is both the starting head and the first replayed block.
            self.set_last_block(Arc::new(first.clone()));
            self.applier.bootstrap_creator();
        } else {
            let predecessor = self
                .store
                .block_at_height(height - 1)
                .expect("scan start has a stored predecessor");
            self.set_last_block(Arc::new(predecessor));
        }

        let mut current = first.clone();
        for (pos, stored) in blocks.iter().enumerate() {
            current = stored.clone();
            let head = self.last_block();
            let result = self.replay_block(&current, &head, pos == 0, height, validate);
            match result {
                Ok(()) => {
                    self.store.commit_transaction();
                    self.listeners.notify(BlockEvent::BlockScanned, &current);
                }
                Err(e) => {
                    self.store.rollback_transaction();
                    debug!(
                        "applying block {} at height {} failed, deleting from database: {e}",
                        current.id(),
                        current.height
                    );
                    self.pool.process_later(current.transactions.clone());
                    for later in &blocks[pos + 1..] {
                        self.pool.process_later(later.transactions.clone());
                    }
                    self.store.delete_blocks_from(current.id());
                    let last = self
                        .store
                        .last_block()
                        .expect("store retains at least the genesis block");
                    self.set_last_block(Arc::new(last));
                    self.listeners.notify(BlockEvent::BlockScanned, &current);
                    break;
                }
            }
        }

        self.store.end_transaction();
        self.listeners.notify(BlockEvent::RescanEnd, &current);
        self.validate_at_scan.store(false, Ordering::SeqCst);
        info!("...done at height {}", self.height());
        self.is_scanning.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn replay_block(
        &self,
        current: &Block,
        head: &Arc<Block>,
        is_first: bool,
        start_height: u32,
        validate: bool,
    ) -> Result<(), NodeError> {
        let in_order = if is_first {
            current.height == start_height
        } else {
            current.previous_block_id == head.id() && current.height == head.height + 1
        };
        if !in_order {
            return Err(ValidationError::not_valid("database blocks in the wrong order").into());
        }

        let is_genesis = current.id() == self.params.genesis_block_id;
        if validate && !is_genesis {
            self.validate_stored_block(current, head)?;
        }

        self.listeners.notify(BlockEvent::BeforeBlockAccept, current);
        let accepted = Arc::new(current.clone());
        self.set_last_block(accepted.clone());
        self.accept(&accepted)?;
        Ok(())
    }

    fn validate_stored_block(&self, current: &Block, head: &Arc<Block>) -> Result<(), NodeError> {
        if !current.verify_block_signature() {
            return Err(ValidationError::not_valid("invalid block signature").into());
        }
        let effective_balance = self.accounts.effective_balance_coins(current.generator_id());
        if !current.verify_generation_signature(head, effective_balance)
            && !self.allows_fake_forging(&current.generator_public_key)
        {
            return Err(ValidationError::not_valid("invalid block generation signature").into());
        }
        if current.version != forge::block_version(head.height, &self.params) {
            return Err(ValidationError::not_valid("invalid block version").into());
        }
        let reparsed = Block::parse_json(&current.to_json(), self.clock.now(), &self.params)?;
        if reparsed.bytes() != current.bytes() {
            return Err(
                ValidationError::not_valid("block JSON cannot be parsed back to the same block")
                    .into(),
            );
        }
        for tx in &current.transactions {
            if !tx.verify_signature() {
                return Err(ValidationError::not_valid("invalid transaction signature").into());
            }
            if tx.version != self.pool.transaction_version(head.height) {
                return Err(ValidationError::not_valid("invalid transaction version").into());
            }
            tx.validate()?;
            let tx_bytes = tx.bytes();
            if current.height > self.params.nqt_height
                && Transaction::parse_bytes(&tx_bytes)?.bytes() != tx_bytes
            {
                return Err(ValidationError::not_valid(
                    "transaction bytes cannot be parsed back to the same transaction",
                )
                .into());
            }
            if Transaction::parse_json(&tx.to_json())?.bytes() != tx_bytes {
                return Err(ValidationError::not_valid(
                    "transaction JSON cannot be parsed back to the same transaction",
                )
                .into());
            }
        }
        Ok(())
    }

    // ── Full reset ─────────────────────────────────────────────────────

    /// Wipe the store, re-bootstrap genesis, and rebuild derived state.
    pub fn full_reset(&self) -> Result<(), NodeError> {
        let _guard = self.chain_lock.lock().unwrap();
        self.store.delete_all();
        self.add_genesis_block_locked()?;
        let _download_pause = GetMoreBlocksPause::new(&self.get_more_blocks);
        self.scan_locked(0)
    }

    // ── Block generation ───────────────────────────────────────────────

    /// Assemble, sign, and push a new block on top of the current head.
    pub fn generate_block(
        &self,
        secret_phrase: &str,
        block_timestamp: Timestamp,
    ) -> Result<(), NodeError> {
        let candidates: Vec<Transaction> = self
            .pool
            .all_unconfirmed()
            .into_iter()
            .filter(|tx| self.has_all_referenced_transactions(tx, tx.timestamp, 0))
            .collect();

        let previous = self.last_block();
        let mut selected: BTreeMap<(u64, u32), Transaction> = BTreeMap::new();
        let mut duplicates = DuplicateTracker::new();
        let mut payload_length: u32 = 0;
        let mut total_amount_nqt: u64 = 0;
        let mut total_fee_nqt: u64 = 0;

        loop {
            let selected_before = selected.len();
            for tx in &candidates {
                if selected.len() >= MAX_TRANSACTIONS_PER_BLOCK {
                    break;
                }
                let key = (tx.id().value(), tx.timestamp.as_secs());
                let size = tx.size();
                if selected.contains_key(&key) || payload_length + size > MAX_PAYLOAD_LENGTH {
                    continue;
                }
                if tx.version != self.pool.transaction_version(previous.height) {
                    continue;
                }
                if tx.timestamp > block_timestamp.saturating_add(15)
                    || tx.expiration() < block_timestamp
                {
                    continue;
                }
                if duplicates.is_duplicate(&tx.attachment) {
                    continue;
                }
                match tx.validate() {
                    Ok(()) => {}
                    Err(e) if e.is_permanent() => {
                        self.pool.remove(tx.id());
                        continue;
                    }
                    Err(_) => continue,
                }
                payload_length += size;
                total_amount_nqt += tx.amount_nqt;
                total_fee_nqt += tx.fee_nqt;
                selected.insert(key, tx.clone());
            }
            if selected.len() == selected_before {
                break;
            }
        }

        let keypair = keypair_from_secret_phrase(secret_phrase);
        let mut digest = Sha256::new();
        for tx in selected.values() {
            digest.update(tx.bytes());
        }
        let payload_hash = FullHash::new(digest.finalize().into());

        let version = forge::block_version(previous.height, &self.params);
        let generation_signature = if version == 1 {
            ignis_crypto::sign_message(&previous.generation_signature, &keypair.secret)
                .0
                .to_vec()
        } else {
            forge::generation_signature_hash(&previous.generation_signature, &keypair.public).to_vec()
        };
        let previous_block_hash =
            (version >= 2).then(|| FullHash::new(sha256(&previous.bytes())));

        let mut block = Block::new(
            version,
            block_timestamp,
            previous.id(),
            total_amount_nqt,
            total_fee_nqt,
            payload_length,
            payload_hash,
            keypair.public,
            generation_signature,
            None,
            previous_block_hash,
            selected.into_values().collect(),
        )
        .map_err(|e| {
            // Shouldn't happen: all selected transactions were validated.
            error!("error generating block: {e}");
            NodeError::Validation(e)
        })?;
        block.sign(&keypair.secret);

        match self.push_block(block) {
            Ok(()) => {
                let head = self.last_block();
                self.listeners.notify(BlockEvent::BlockGenerated, &head);
                debug!(
                    "account {} generated block {} at height {}",
                    head.generator_id(),
                    head.string_id(),
                    head.height
                );
                Ok(())
            }
            Err(e) => {
                debug!("generate block failed: {e}");
                if let BlockNotAccepted::Transaction { id, .. } = &e {
                    debug!("removing invalid transaction {id}");
                    self.pool.remove(*id);
                }
                Err(e.into())
            }
        }
    }
}

/// Scoped pause of the download loop: clears `get_more_blocks` and restores
/// it on every exit path.
struct GetMoreBlocksPause<'a> {
    flag: &'a AtomicBool,
}

impl<'a> GetMoreBlocksPause<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(false, Ordering::SeqCst);
        Self { flag }
    }
}

impl Drop for GetMoreBlocksPause<'_> {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}
