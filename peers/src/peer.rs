//! The peer trait.

use crate::messages::PeerRequest;
use serde_json::Value;

/// A remote node as seen by the blockchain core.
///
/// Transport, handshakes, and blacklist bookkeeping live behind this trait;
/// the core only sends requests and assigns blame.
pub trait Peer: Send + Sync {
    /// Transport address, for logs.
    fn address(&self) -> &str;

    /// The address the peer announced for inbound connections, if any.
    /// Download candidates must have one.
    fn announced_address(&self) -> Option<&str>;

    fn is_connected(&self) -> bool;

    /// Send a request and wait for the JSON response. `None` covers
    /// transport failures, timeouts, and unparseable responses alike.
    fn send(&self, request: &PeerRequest) -> Option<Value>;

    /// Blame this peer for a protocol violation.
    fn blacklist(&self, cause: &str);
}
