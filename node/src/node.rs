//! Node wiring: store, ledgers, processor, peers, and the download thread.

use crate::config::NodeConfig;
use crate::download::spawn_download_thread;
use crate::error::NodeError;
use crate::mempool::UnconfirmedPool;
use crate::metrics::NodeMetrics;
use crate::peer_api::PeerApi;
use crate::processor::{BlockchainProcessor, ProcessorOptions};
use ignis_chain::{genesis, AccountLedger, AliasLedger};
use ignis_store::{ChainStore, MemoryChainStore};
use ignis_types::{ChainParams, EpochClock, SystemClock};
use ignis_peers::PeerRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

/// A running Ignis node: the blockchain processor plus its download thread.
pub struct IgnisNode {
    pub config: NodeConfig,
    pub processor: Arc<BlockchainProcessor>,
    pub peers: Arc<PeerRegistry>,
    pub peer_api: Arc<PeerApi>,
    pub metrics: Arc<NodeMetrics>,
    shutdown: Arc<AtomicBool>,
    download_handle: Option<JoinHandle<()>>,
}

impl IgnisNode {
    /// Assemble a node from configuration with the in-memory store.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let params = ChainParams::for_network(config.network);
        let store: Arc<dyn ChainStore> = Arc::new(MemoryChainStore::new());
        let clock: Arc<dyn EpochClock> = Arc::new(SystemClock::new(
            config.network.epoch_anchor_unix_secs(),
        ));
        Self::with_collaborators(config, params, store, clock)
    }

    /// Assemble a node with explicit collaborators (tests inject a manual
    /// clock and pre-seeded stores here).
    pub fn with_collaborators(
        config: NodeConfig,
        params: ChainParams,
        store: Arc<dyn ChainStore>,
        clock: Arc<dyn EpochClock>,
    ) -> Result<Self, NodeError> {
        let pool = Arc::new(UnconfirmedPool::new(params.clone()));
        let accounts = Arc::new(AccountLedger::new(genesis::creator_id()));
        let aliases = Arc::new(AliasLedger::new());

        let options = ProcessorOptions {
            trim_derived_tables: config.trim_derived_tables,
            force_scan: config.force_scan,
            validate_at_scan: config.force_validate,
            allow_fake_forging: config.fake_forging_keys()?,
            gossip_fan_out: config.gossip_fan_out,
        };
        let processor = Arc::new(BlockchainProcessor::new(
            params, store, clock, pool, accounts, aliases, options,
        ));

        let peers = Arc::new(PeerRegistry::new());
        processor.set_peers(peers.clone());

        let metrics = Arc::new(NodeMetrics::new());
        if config.enable_metrics {
            metrics.attach(&processor);
        }

        let peer_api = Arc::new(PeerApi::new(processor.clone()));

        Ok(Self {
            config,
            processor,
            peers,
            peer_api,
            metrics,
            shutdown: Arc::new(AtomicBool::new(false)),
            download_handle: None,
        })
    }

    /// Bootstrap the chain and start the download thread.
    pub fn start(&mut self) -> Result<(), NodeError> {
        self.processor.init()?;
        info!(
            network = self.config.network.as_str(),
            height = self.processor.height(),
            "node started"
        );
        self.download_handle = Some(spawn_download_thread(
            self.processor.clone(),
            self.peers.clone(),
            self.shutdown.clone(),
        ));
        Ok(())
    }

    /// Signal the download thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.download_handle.take() {
            let _ = handle.join();
        }
        info!("node stopped");
    }

    /// Block until the download thread exits.
    pub fn join(&mut self) {
        if let Some(handle) = self.download_handle.take() {
            let _ = handle.join();
        }
    }
}
