//! The block download loop.
//!
//! A dedicated thread ticks once a second. Each tick picks one random
//! connected peer and, when the peer claims more cumulative difficulty than
//! the local head, negotiates a common ancestor (milestone walk, then a
//! forward walk over block ids), fetches forward blocks in bounded rounds,
//! pushes the ones that extend the head directly, and hands any remaining
//! fork candidates to the fork reconciler.
//!
//! The chain lock is held only while parsed blocks are pushed, never during
//! network I/O. A panic out of the tick is unrecoverable chain state; it is
//! reported and the process exits.

use crate::processor::BlockchainProcessor;
use ignis_chain::Block;
use ignis_peers::{
    CumulativeDifficultyResponse, MilestoneBlockIdsResponse, NextBlockIdsResponse,
    NextBlocksResponse, Peer, PeerRegistry, PeerRequest,
};
use ignis_types::BlockId;
use num_bigint::BigUint;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

pub struct DownloadTask {
    processor: Arc<BlockchainProcessor>,
    peers: Arc<PeerRegistry>,
}

impl DownloadTask {
    pub fn new(processor: Arc<BlockchainProcessor>, peers: Arc<PeerRegistry>) -> Self {
        Self { processor, peers }
    }

    /// One download tick.
    pub fn run_once(&self) {
        if !self.processor.get_more_blocks() {
            return;
        }
        let mut peer_has_more = true;

        let Some(peer) = self.peers.any_connected_peer() else {
            return;
        };
        let Some(response) = peer.send(&PeerRequest::GetCumulativeDifficulty) else {
            return;
        };
        let Ok(difficulty) = serde_json::from_value::<CumulativeDifficultyResponse>(response)
        else {
            return;
        };
        let cur_cumulative_difficulty = self.processor.cumulative_difficulty();
        let Some(better_cumulative_difficulty) =
            BigUint::parse_bytes(difficulty.cumulative_difficulty.as_bytes(), 10)
        else {
            return;
        };
        if better_cumulative_difficulty < cur_cumulative_difficulty {
            return;
        }
        if let Some(height) = difficulty.blockchain_height {
            self.processor.set_last_blockchain_feeder(peer.address(), height);
        }
        if better_cumulative_difficulty == cur_cumulative_difficulty {
            return;
        }

        let params = self.processor.params();
        let mut common_block_id = params.genesis_block_id;
        if self.processor.last_block().id() != params.genesis_block_id {
            match self.common_milestone_block_id(&*peer, &mut peer_has_more) {
                Some(id) => common_block_id = id,
                None => return,
            }
        }
        if common_block_id.is_zero() || !peer_has_more {
            return;
        }
        common_block_id = match self.common_block_id(&*peer, common_block_id) {
            Some(id) => id,
            None => return,
        };
        if common_block_id.is_zero() || !peer_has_more {
            return;
        }

        let Some(common_block) = self.processor.store().block(common_block_id) else {
            return;
        };
        if self.processor.height().saturating_sub(common_block.height) >= params.max_fork_depth {
            return;
        }

        let mut current_block_id = common_block_id;
        let mut fork_blocks: Vec<Block> = Vec::new();
        let mut processed_all = true;
        let mut request_count = 0;

        'outer: while fork_blocks.len() < params.max_blocks_per_fetch
            && request_count < params.max_fetch_rounds
        {
            request_count += 1;
            let Some(next_blocks) = self.next_blocks(&*peer, current_block_id) else {
                break;
            };
            if next_blocks.is_empty() {
                break;
            }

            let _guard = self.processor.chain_guard();
            for block_json in next_blocks {
                let block =
                    match Block::parse_json(&block_json, self.processor.now(), params) {
                        Ok(block) => block,
                        Err(e) if !e.is_permanent() => {
                            debug!("cannot validate block: {e}, will try again later");
                            processed_all = false;
                            break 'outer;
                        }
                        Err(e) => {
                            debug!("failed to parse block: {e}");
                            peer.blacklist(&e.to_string());
                            return;
                        }
                    };
                current_block_id = block.id();

                if self.processor.last_block().id() == block.previous_block_id {
                    if let Err(e) = self.processor.push_block_locked(block) {
                        peer.blacklist(&e.to_string());
                        return;
                    }
                } else if !self.processor.store().has_block(block.id()) {
                    fork_blocks.push(block);
                }
            }
        }

        if !fork_blocks.is_empty() {
            processed_all = false;
        }
        if !processed_all
            && self.processor.height().saturating_sub(common_block.height) < params.max_fork_depth
        {
            if let Err(e) = self.processor.process_fork(&*peer, fork_blocks, &common_block) {
                debug!("fork processing failed: {e}");
            }
        }
    }

    /// Milestone walk: bisect toward a common ancestor using the peer's
    /// sparse milestone id lists. Returns the first milestone id that exists
    /// locally.
    fn common_milestone_block_id(
        &self,
        peer: &dyn Peer,
        peer_has_more: &mut bool,
    ) -> Option<BlockId> {
        let mut last_milestone_block_id: Option<String> = None;
        loop {
            let request = PeerRequest::GetMilestoneBlockIds {
                last_block_id: last_milestone_block_id
                    .is_none()
                    .then(|| self.processor.last_block().string_id()),
                last_milestone_block_id: last_milestone_block_id.clone(),
            };
            let response = peer.send(&request)?;
            let Ok(milestones) = serde_json::from_value::<MilestoneBlockIdsResponse>(response)
            else {
                return None;
            };
            if milestones.milestone_block_ids.is_empty() {
                return Some(self.processor.params().genesis_block_id);
            }
            // prevent overloading with block ids
            if milestones.milestone_block_ids.len() > self.processor.params().max_milestone_ids {
                debug!(
                    "obsolete or rogue peer {} sends too many milestoneBlockIds, blacklisting",
                    peer.address()
                );
                peer.blacklist("too many milestone block ids");
                return None;
            }
            if milestones.last == Some(true) {
                *peer_has_more = false;
            }
            for milestone_id in &milestones.milestone_block_ids {
                let Ok(block_id) = BlockId::parse(milestone_id) else {
                    debug!("peer {} sent malformed milestone id", peer.address());
                    return None;
                };
                if self.processor.store().has_block(block_id) {
                    return Some(block_id);
                }
                last_milestone_block_id = Some(milestone_id.clone());
            }
        }
    }

    /// Forward walk: refine the common ancestor by walking the peer's block
    /// ids forward until one is missing locally.
    fn common_block_id(&self, peer: &dyn Peer, mut common_block_id: BlockId) -> Option<BlockId> {
        loop {
            let request = PeerRequest::GetNextBlockIds {
                block_id: common_block_id.to_string(),
            };
            let response = peer.send(&request)?;
            let Ok(next) = serde_json::from_value::<NextBlockIdsResponse>(response) else {
                return None;
            };
            if next.next_block_ids.is_empty() {
                return None;
            }
            // prevent overloading with block ids
            if next.next_block_ids.len() > self.processor.params().max_next_ids {
                debug!(
                    "obsolete or rogue peer {} sends too many nextBlockIds, blacklisting",
                    peer.address()
                );
                peer.blacklist("too many next block ids");
                return None;
            }
            for next_id in &next.next_block_ids {
                let Ok(block_id) = BlockId::parse(next_id) else {
                    debug!("peer {} sent malformed block id", peer.address());
                    return None;
                };
                if !self.processor.store().has_block(block_id) {
                    return Some(common_block_id);
                }
                common_block_id = block_id;
            }
        }
    }

    /// Fetch the next batch of blocks after `block_id`.
    fn next_blocks(&self, peer: &dyn Peer, block_id: BlockId) -> Option<Vec<Value>> {
        let request = PeerRequest::GetNextBlocks {
            block_id: block_id.to_string(),
        };
        let response = peer.send(&request)?;
        let Ok(next) = serde_json::from_value::<NextBlocksResponse>(response) else {
            return None;
        };
        // prevent overloading with blocks
        if next.next_blocks.len() > self.processor.params().max_next_ids {
            debug!(
                "obsolete or rogue peer {} sends too many nextBlocks, blacklisting",
                peer.address()
            );
            peer.blacklist("too many next blocks");
            return None;
        }
        Some(next.next_blocks)
    }
}

/// Spawn the download thread at a one-second cadence.
///
/// A panic out of a tick means the chain state can no longer be trusted:
/// it is reported and the process exits.
pub fn spawn_download_thread(
    processor: Arc<BlockchainProcessor>,
    peers: Arc<PeerRegistry>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    let task = DownloadTask::new(processor, peers);
    thread::Builder::new()
        .name("blockchain-download".into())
        .spawn(move || {
            info!("blockchain download thread started");
            while !shutdown.load(Ordering::SeqCst) {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.run_once())) {
                    let message = panic_message(&payload);
                    error!("CRITICAL ERROR. PLEASE REPORT TO THE DEVELOPERS.\n{message}");
                    process::exit(1);
                }
                thread::sleep(Duration::from_secs(1));
            }
            info!("blockchain download thread stopped");
        })
        .expect("failed to spawn download thread")
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
