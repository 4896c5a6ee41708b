//! Peer abstraction and wire messages.
//!
//! The blockchain core consumes peers behind a narrow trait — `send` a JSON
//! request, `blacklist` on misbehavior — and never touches sockets itself.
//! This crate defines that trait, the typed request/response messages of the
//! block-synchronization protocol, and the registry used for random peer
//! selection and block gossip.

pub mod messages;
pub mod peer;
pub mod registry;

pub use messages::{
    CumulativeDifficultyResponse, MilestoneBlockIdsResponse, NextBlockIdsResponse,
    NextBlocksResponse, PeerRequest, ProcessBlockResponse,
};
pub use peer::Peer;
pub use registry::PeerRegistry;
