//! Telemetry collector entry point.
//!
//! ```text
//! telem-server [--config FILE] PORT
//! ```
//!
//! # Startup
//!
//! 1. CLI arguments are parsed with `clap`; a missing or invalid port prints
//!    usage to stderr and exits nonzero before any socket is created.
//! 2. The optional TOML config is loaded (defaults if absent).
//! 3. `tracing` is initialised; `RUST_LOG` wins over `[logging] level`.
//! 4. The listener is bound and the single-task loop runs until Ctrl+C.
//! 5. The tally is printed to stdout, one line per device identifier.
//!
//! Setup and accept failures exit nonzero without printing a tally.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use telem_server::infrastructure::network::Multiplexer;
use telem_server::infrastructure::storage::config::{load_config, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Telemetry collector.
///
/// Accepts connections from emulated devices, decodes their frames, and
/// counts frames per device identifier.  The counts are printed on Ctrl+C.
#[derive(Debug, Parser)]
#[command(name = "telem-server", version)]
struct Cli {
    /// TCP port to listen on.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Optional TOML configuration file.
    #[arg(long, env = "TELEM_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Loads the config file and applies the port from the command line.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = load_config(self.config.as_deref()).context("failed to load configuration")?;
        config.network.port = self.port;
        Ok(config)
    }
}

fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_server_config()?;

    init_logging(&config.logging.level);

    let multiplexer = Multiplexer::bind(&config.network).context("failed to start listener")?;
    info!(
        port = config.network.port,
        backlog = config.network.backlog,
        "telemetry collector starting"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                signal_token.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let tally = multiplexer.run(shutdown).await?;

    for line in tally.report_lines() {
        println!("{line}");
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
