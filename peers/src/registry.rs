//! Peer registry: random selection and gossip fan-out.

use crate::messages::PeerRequest;
use crate::peer::Peer;
use rand::seq::SliceRandom;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Holds every known peer and answers the two questions the core asks:
/// "give me a random connected peer to download from" and "gossip this
/// block to a few peers".
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<Vec<Arc<dyn Peer>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, peer: Arc<dyn Peer>) {
        self.peers.write().unwrap().push(peer);
    }

    pub fn peers(&self) -> Vec<Arc<dyn Peer>> {
        self.peers.read().unwrap().clone()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().unwrap().len()
    }

    /// A random connected peer with an announced address, if any.
    pub fn any_connected_peer(&self) -> Option<Arc<dyn Peer>> {
        let peers = self.peers.read().unwrap();
        let candidates: Vec<&Arc<dyn Peer>> = peers
            .iter()
            .filter(|p| p.is_connected() && p.announced_address().is_some())
            .collect();
        candidates
            .choose(&mut rand::thread_rng())
            .map(|p| Arc::clone(*p))
    }

    /// Send a request to up to `fan_out` random connected peers. Returns the
    /// number of peers that answered.
    pub fn send_to_some(&self, request: &PeerRequest, fan_out: usize) -> usize {
        let mut candidates: Vec<Arc<dyn Peer>> = self
            .peers
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.is_connected())
            .cloned()
            .collect();
        candidates.shuffle(&mut rand::thread_rng());

        let mut successes = 0;
        for peer in candidates {
            if successes >= fan_out {
                break;
            }
            if peer.send(request).is_some() {
                successes += 1;
            } else {
                debug!(peer = peer.address(), "peer did not answer gossip");
            }
        }
        successes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubPeer {
        address: String,
        announced: bool,
        connected: bool,
        sends: AtomicUsize,
    }

    impl StubPeer {
        fn new(address: &str, announced: bool, connected: bool) -> Arc<Self> {
            Arc::new(Self {
                address: address.into(),
                announced,
                connected,
                sends: AtomicUsize::new(0),
            })
        }
    }

    impl Peer for StubPeer {
        fn address(&self) -> &str {
            &self.address
        }

        fn announced_address(&self) -> Option<&str> {
            self.announced.then_some(self.address.as_str())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn send(&self, _request: &PeerRequest) -> Option<Value> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Some(json!({}))
        }

        fn blacklist(&self, _cause: &str) {}
    }

    #[test]
    fn selection_requires_connected_and_announced() {
        let registry = PeerRegistry::new();
        registry.add(StubPeer::new("a", false, true));
        registry.add(StubPeer::new("b", true, false));
        assert!(registry.any_connected_peer().is_none());

        registry.add(StubPeer::new("c", true, true));
        let chosen = registry.any_connected_peer().unwrap();
        assert_eq!(chosen.address(), "c");
    }

    #[test]
    fn gossip_respects_fan_out() {
        let registry = PeerRegistry::new();
        let peers: Vec<_> = (0..5)
            .map(|i| StubPeer::new(&format!("peer-{i}"), true, true))
            .collect();
        for peer in &peers {
            registry.add(Arc::clone(peer) as Arc<dyn Peer>);
        }

        let sent = registry.send_to_some(&PeerRequest::GetCumulativeDifficulty, 3);
        assert_eq!(sent, 3);
        let total: usize = peers.iter().map(|p| p.sends.load(Ordering::SeqCst)).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn empty_registry_sends_nothing() {
        let registry = PeerRegistry::new();
        assert_eq!(
            registry.send_to_some(&PeerRequest::GetCumulativeDifficulty, 10),
            0
        );
    }
}
