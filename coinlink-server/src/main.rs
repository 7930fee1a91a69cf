//! coinlink connector server.
//!
//! # Usage
//!
//! ```bash
//! # Run every configured connector (config.toml in current directory)
//! cargo run -p coinlink-server --release -- run
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p coinlink-server -- run
//!
//! # Check an address offline
//! cargo run -p coinlink-server -- validate-address BTC mainnet bc1q...
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `config.toml`)
//! - `DATA_DIR` - Override the state directory
//! - `RUST_LOG` - Log level filter (default: `info`)

use std::sync::Arc;

use clap::{Parser, Subcommand};
use coinlink::Asset;
use coinlink::address::validate_address;
use coinlink::metrics::MetricsBackend;
use tracing_subscriber::EnvFilter;

use coinlink_server::util::SigDown;
use coinlink_server::{Runner, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "coinlink-server", version, about = "Runs coinlink blockchain connectors")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start every configured connector and run until SIGINT or SIGTERM
    Run,
    /// Check that an address is valid for an asset on a network
    ValidateAddress {
        /// Asset ticker, e.g. BTC
        asset: Asset,
        /// Network name, e.g. mainnet or simnet
        net: String,
        /// Address to check
        address: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run().await,
        Command::ValidateAddress {
            asset,
            net,
            address,
        } => validate_address(asset, &address, &net)
            .map(|()| tracing::info!(asset = %asset, net = %net, address = %address, "Address is valid"))
            .map_err(Into::into),
    };

    if let Err(e) = result {
        tracing::error!("coinlink-server failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        connectors = config.connectors.len(),
        "Loaded configuration"
    );
    if config.connectors.is_empty() {
        tracing::warn!("No connectors configured");
    }

    #[cfg(feature = "telemetry")]
    let provider = coinlink_server::telemetry::init_meter_provider(&config.telemetry)?;
    #[cfg(feature = "telemetry")]
    let metrics: Arc<dyn MetricsBackend> = {
        let otel = coinlink_server::telemetry::OtelMetrics::global();
        otel.install_panic_hook();
        Arc::new(otel)
    };
    #[cfg(not(feature = "telemetry"))]
    let metrics: Arc<dyn MetricsBackend> = Arc::new(coinlink::metrics::NoopMetrics);

    let sig_down = SigDown::try_new()?;
    let runner = Runner::from_config(&config, metrics).await?;
    runner.start().await?;

    sig_down.recv().await;
    runner.stop("shutdown signal").await;

    #[cfg(feature = "telemetry")]
    if let Err(e) = provider.shutdown() {
        tracing::warn!("Metric provider shutdown failed: {e}");
    }

    tracing::info!("coinlink-server shut down gracefully");
    Ok(())
}
