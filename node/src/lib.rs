//! The Ignis blockchain processor and node wiring.
//!
//! The processor ingests candidate blocks from local forging and from
//! peers, validates them against the chain, commits accepted blocks to the
//! store, maintains fork choice by cumulative difficulty, and drives
//! recovery via rollback, fork reconciliation, and full-chain rescans.

pub mod config;
pub mod download;
pub mod error;
pub mod events;
pub mod logging;
pub mod mempool;
pub mod metrics;
pub mod node;
pub mod peer_api;
pub mod processor;

pub use config::NodeConfig;
pub use download::{spawn_download_thread, DownloadTask};
pub use error::{BlockNotAccepted, NodeError};
pub use events::{BlockEvent, BlockListeners, ListenerId};
pub use logging::{init_logging, LogFormat};
pub use mempool::UnconfirmedPool;
pub use metrics::NodeMetrics;
pub use node::IgnisNode;
pub use peer_api::PeerApi;
pub use processor::{BlockchainProcessor, ProcessorOptions};
