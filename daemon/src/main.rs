//! Ignis daemon — entry point for running an Ignis node.

use clap::Parser;
use ignis_node::{init_logging, IgnisNode, LogFormat, NodeConfig};
use ignis_types::NetworkId;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ignis-daemon", about = "Ignis proof-of-stake node daemon")]
struct Cli {
    /// Network to connect to: "main", "test", or "dev".
    /// When a config file is provided, defaults to the file's network value.
    #[arg(long, env = "IGNIS_NETWORK")]
    network: Option<String>,

    /// Path to a TOML configuration file. CLI flags and env vars override
    /// file settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Trim derived-table history below the rollback horizon.
    #[arg(long, env = "IGNIS_TRIM_DERIVED_TABLES")]
    trim_derived_tables: bool,

    /// Run a full rescan at startup.
    #[arg(long, env = "IGNIS_FORCE_SCAN")]
    force_scan: bool,

    /// Re-validate every block and transaction during the startup rescan.
    #[arg(long, env = "IGNIS_FORCE_VALIDATE")]
    force_validate: bool,

    /// Register Prometheus metrics listeners.
    #[arg(long, env = "IGNIS_ENABLE_METRICS")]
    metrics: bool,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "IGNIS_LOG_LEVEL")]
    log_level: String,

    /// Log format: "human" or "json".
    #[arg(long, default_value = "human", env = "IGNIS_LOG_FORMAT")]
    log_format: String,
}

fn parse_network(s: &str) -> NetworkId {
    match s.to_lowercase().as_str() {
        "main" => NetworkId::Main,
        "test" => NetworkId::Test,
        _ => NetworkId::Dev,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => Some(
            NodeConfig::from_toml_file(&path.display().to_string())
                .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?,
        ),
        None => None,
    };

    let base = file_config.unwrap_or_default();
    let config = NodeConfig {
        network: cli
            .network
            .as_deref()
            .map(parse_network)
            .unwrap_or(base.network),
        trim_derived_tables: cli.trim_derived_tables || base.trim_derived_tables,
        force_scan: cli.force_scan || base.force_scan,
        force_validate: cli.force_validate || base.force_validate,
        enable_metrics: cli.metrics || base.enable_metrics,
        log_level: cli.log_level,
        log_format: cli.log_format,
        ..base
    };

    init_logging(
        LogFormat::from_str(&config.log_format),
        &config.log_level,
    );
    tracing::info!(
        network = config.network.as_str(),
        "starting Ignis node daemon"
    );

    let mut node = IgnisNode::new(config)?;
    node.start()?;
    node.join();

    tracing::info!("Ignis daemon exited");
    Ok(())
}
