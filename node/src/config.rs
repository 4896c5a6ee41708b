//! Node configuration with TOML file support.

use crate::error::NodeError;
use ignis_types::{NetworkId, PublicKey};
use serde::{Deserialize, Serialize};

/// Configuration for an Ignis node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Which network to connect to.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Compact derived-table undo history below the rollback horizon.
    #[serde(default)]
    pub trim_derived_tables: bool,

    /// Run a full rescan at startup.
    #[serde(default)]
    pub force_scan: bool,

    /// Re-validate every block and transaction during the next scan.
    #[serde(default)]
    pub force_validate: bool,

    /// Generator public keys (hex) whose generation signatures are accepted
    /// without proof-of-stake verification. Dev and test networks only.
    #[serde(default)]
    pub allow_fake_forging: Vec<String>,

    /// How many peers freshly accepted blocks are gossiped to.
    #[serde(default = "default_gossip_fan_out")]
    pub gossip_fan_out: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to register Prometheus metrics listeners.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Dev
}

fn default_gossip_fan_out() -> usize {
    10
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// Decode the fake-forging allow list.
    pub fn fake_forging_keys(&self) -> Result<Vec<PublicKey>, NodeError> {
        self.allow_fake_forging
            .iter()
            .map(|hex_key| {
                PublicKey::parse_hex(hex_key)
                    .ok_or_else(|| NodeError::Config(format!("malformed public key {hex_key}")))
            })
            .collect()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            trim_derived_tables: false,
            force_scan: false,
            force_validate: false,
            allow_fake_forging: Vec::new(),
            gossip_fan_out: default_gossip_fan_out(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.network, config.network);
        assert_eq!(parsed.gossip_fan_out, config.gossip_fan_out);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.network, NetworkId::Dev);
        assert!(!config.trim_derived_tables);
        assert_eq!(config.log_format, "human");
        assert_eq!(config.gossip_fan_out, 10);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            network = "main"
            trim_derived_tables = true
            gossip_fan_out = 4
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.network, NetworkId::Main);
        assert!(config.trim_derived_tables);
        assert_eq!(config.gossip_fan_out, 4);
        assert_eq!(config.log_level, "info"); // default
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/ignis.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn malformed_fake_forging_key_is_config_error() {
        let config = NodeConfig {
            allow_fake_forging: vec!["zz".into()],
            ..Default::default()
        };
        assert!(config.fake_forging_keys().is_err());
    }
}
