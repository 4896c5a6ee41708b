//! Prometheus metrics fed by the block listener bus.

use crate::events::BlockEvent;
use crate::processor::BlockchainProcessor;
use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Registry,
};
use std::sync::Arc;

/// Node-level chain metrics. Owns its [`Registry`] so embedders can encode
/// it wherever they expose metrics.
pub struct NodeMetrics {
    pub registry: Registry,

    /// Blocks accepted onto the chain.
    pub blocks_pushed: IntCounter,
    /// Blocks removed by rollback or fork resolution.
    pub blocks_popped: IntCounter,
    /// Blocks replayed by the rescan engine.
    pub blocks_scanned: IntCounter,
    /// Blocks forged locally.
    pub blocks_generated: IntCounter,
    /// Current height of the head.
    pub chain_height: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let blocks_pushed = register_int_counter_with_registry!(
            "ignis_blocks_pushed_total",
            "Blocks accepted onto the chain",
            registry
        )
        .expect("metric registration");
        let blocks_popped = register_int_counter_with_registry!(
            "ignis_blocks_popped_total",
            "Blocks removed by rollback or fork resolution",
            registry
        )
        .expect("metric registration");
        let blocks_scanned = register_int_counter_with_registry!(
            "ignis_blocks_scanned_total",
            "Blocks replayed by the rescan engine",
            registry
        )
        .expect("metric registration");
        let blocks_generated = register_int_counter_with_registry!(
            "ignis_blocks_generated_total",
            "Blocks forged locally",
            registry
        )
        .expect("metric registration");
        let chain_height = register_int_gauge_with_registry!(
            "ignis_chain_height",
            "Current height of the head",
            registry
        )
        .expect("metric registration");

        Self {
            registry,
            blocks_pushed,
            blocks_popped,
            blocks_scanned,
            blocks_generated,
            chain_height,
        }
    }

    /// Subscribe this collection to a processor's lifecycle events.
    pub fn attach(self: &Arc<Self>, processor: &BlockchainProcessor) {
        let metrics = Arc::clone(self);
        processor.add_listener(BlockEvent::BlockPushed, move |block| {
            metrics.blocks_pushed.inc();
            metrics.chain_height.set(i64::from(block.height));
        });
        let metrics = Arc::clone(self);
        processor.add_listener(BlockEvent::BlockPopped, move |block| {
            metrics.blocks_popped.inc();
            metrics
                .chain_height
                .set(i64::from(block.height.saturating_sub(1)));
        });
        let metrics = Arc::clone(self);
        processor.add_listener(BlockEvent::BlockScanned, move |_| {
            metrics.blocks_scanned.inc();
        });
        let metrics = Arc::clone(self);
        processor.add_listener(BlockEvent::BlockGenerated, move |_| {
            metrics.blocks_generated.inc();
        });
    }

    /// Encode every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> String {
        use prometheus::Encoder;
        let mut buffer = Vec::new();
        let encoder = prometheus::TextEncoder::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .expect("metrics encoding");
        String::from_utf8(buffer).expect("metrics are UTF-8")
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_encode() {
        let metrics = NodeMetrics::new();
        metrics.blocks_pushed.inc();
        metrics.chain_height.set(42);
        let text = metrics.encode_text();
        assert!(text.contains("ignis_blocks_pushed_total 1"));
        assert!(text.contains("ignis_chain_height 42"));
    }
}
