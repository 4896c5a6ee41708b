//! Network identifier.

use serde::{Deserialize, Serialize};

/// Identifies which Ignis network a node is connected to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    Main,
    /// The public test network.
    Test,
    /// Local development network.
    Dev,
}

impl NetworkId {
    /// Default P2P port for this network.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Main => 7874,
            Self::Test => 17874,
            Self::Dev => 27874,
        }
    }

    /// Unix second at which this network's epoch begins. Protocol timestamps
    /// count from here.
    pub fn epoch_anchor_unix_secs(&self) -> u64 {
        match self {
            // 2024-01-01 00:00:00 UTC
            Self::Main => 1_704_067_200,
            // 2023-07-01 00:00:00 UTC
            Self::Test => 1_688_169_600,
            // Dev runs on raw Unix time.
            Self::Dev => 0,
        }
    }

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
            Self::Dev => "dev",
        }
    }
}
