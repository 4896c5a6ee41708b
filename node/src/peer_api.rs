//! Serving side of the peer block-synchronization protocol.
//!
//! The transport layer hands incoming requests to [`PeerApi::handle`];
//! everything here is a read of chain state except `processBlock`, which
//! prechecks the announced predecessor against the local head before any
//! validation work, then delegates to the processor.

use crate::processor::BlockchainProcessor;
use ignis_peers::{
    CumulativeDifficultyResponse, MilestoneBlockIdsResponse, NextBlockIdsResponse,
    NextBlocksResponse, Peer, PeerRequest, ProcessBlockResponse,
};
use ignis_types::BlockId;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Milestone ids per response.
const MILESTONE_LIMIT: usize = 10;

pub struct PeerApi {
    processor: Arc<BlockchainProcessor>,
}

impl PeerApi {
    pub fn new(processor: Arc<BlockchainProcessor>) -> Self {
        Self { processor }
    }

    /// Dispatch a raw peer request.
    pub fn handle(&self, raw: &Value, peer: Option<&dyn Peer>) -> Value {
        let request = match serde_json::from_value::<PeerRequest>(raw.clone()) {
            Ok(request) => request,
            Err(e) => {
                debug!("unsupported peer request: {e}");
                return json!({ "error": "unsupported request" });
            }
        };
        match request {
            PeerRequest::GetCumulativeDifficulty => {
                serde_json::to_value(self.cumulative_difficulty()).expect("serializable")
            }
            PeerRequest::GetMilestoneBlockIds {
                last_block_id,
                last_milestone_block_id,
            } => serde_json::to_value(
                self.milestone_block_ids(last_block_id.as_deref(), last_milestone_block_id.as_deref()),
            )
            .expect("serializable"),
            PeerRequest::GetNextBlockIds { block_id } => {
                serde_json::to_value(self.next_block_ids(&block_id)).expect("serializable")
            }
            PeerRequest::GetNextBlocks { block_id } => {
                serde_json::to_value(self.next_blocks(&block_id)).expect("serializable")
            }
            PeerRequest::ProcessBlock { block } => {
                serde_json::to_value(self.process_block(&block, peer)).expect("serializable")
            }
        }
    }

    pub fn cumulative_difficulty(&self) -> CumulativeDifficultyResponse {
        let head = self.processor.last_block();
        CumulativeDifficultyResponse {
            cumulative_difficulty: head.cumulative_difficulty.to_string(),
            blockchain_height: Some(head.height),
        }
    }

    /// Sparse descending id list used by peers to bisect toward a common
    /// ancestor. When the caller's anchor is a block we know, the answer is
    /// just that id with `last` set.
    pub fn milestone_block_ids(
        &self,
        last_block_id: Option<&str>,
        last_milestone_block_id: Option<&str>,
    ) -> MilestoneBlockIdsResponse {
        let store = self.processor.store();
        if let Some(anchor) = last_block_id {
            if let Ok(id) = BlockId::parse(anchor) {
                if store.has_block(id) {
                    // `last` only when the caller's head IS our head: the
                    // chains are identical and the walk can stop for good.
                    let last = (id == self.processor.last_block().id()).then_some(true);
                    return MilestoneBlockIdsResponse {
                        milestone_block_ids: vec![anchor.to_string()],
                        last,
                    };
                }
            }
        }

        let blockchain_height = self.processor.height();
        let (mut height, jump) = match last_milestone_block_id.and_then(|s| BlockId::parse(s).ok())
        {
            Some(id) => match store.block(id) {
                Some(block) => {
                    let jump = (blockchain_height.saturating_sub(block.height)).clamp(1, 1440);
                    (block.height.saturating_sub(jump), jump)
                }
                None => return MilestoneBlockIdsResponse {
                    milestone_block_ids: Vec::new(),
                    last: None,
                },
            },
            None => (blockchain_height, 10),
        };

        let mut milestone_block_ids = Vec::new();
        while milestone_block_ids.len() < MILESTONE_LIMIT {
            if let Some(id) = store.block_id_at_height(height) {
                milestone_block_ids.push(id.to_string());
            }
            if height == 0 {
                break;
            }
            height = height.saturating_sub(jump);
        }
        MilestoneBlockIdsResponse {
            milestone_block_ids,
            last: None,
        }
    }

    pub fn next_block_ids(&self, block_id: &str) -> NextBlockIdsResponse {
        let mut next_block_ids = Vec::new();
        self.walk_successors(block_id, |block| {
            next_block_ids.push(block.id().to_string());
        });
        NextBlockIdsResponse { next_block_ids }
    }

    pub fn next_blocks(&self, block_id: &str) -> NextBlocksResponse {
        let mut next_blocks = Vec::new();
        self.walk_successors(block_id, |block| {
            next_blocks.push(block.to_json());
        });
        NextBlocksResponse { next_blocks }
    }

    fn walk_successors(&self, block_id: &str, mut visit: impl FnMut(&ignis_chain::Block)) {
        let store = self.processor.store();
        let limit = self.processor.params().max_next_ids;
        let Some(start) = BlockId::parse(block_id).ok().and_then(|id| store.block(id)) else {
            return;
        };
        let mut height = start.height + 1;
        for _ in 0..limit {
            match store.block_at_height(height) {
                Some(block) => {
                    visit(&block);
                    height += 1;
                }
                None => break,
            }
        }
    }

    /// Handle a gossiped block. The `previousBlock` precheck rejects blocks
    /// that do not extend the local head before any validation work.
    pub fn process_block(&self, request: &Value, peer: Option<&dyn Peer>) -> ProcessBlockResponse {
        let head_id = self.processor.last_block().string_id();
        if request.get("previousBlock").and_then(Value::as_str) != Some(head_id.as_str()) {
            return ProcessBlockResponse { accepted: false };
        }
        match self.processor.process_peer_block(request) {
            Ok(()) => ProcessBlockResponse { accepted: true },
            Err(e) => {
                if let Some(peer) = peer {
                    peer.blacklist(&e.to_string());
                }
                ProcessBlockResponse { accepted: false }
            }
        }
    }
}
