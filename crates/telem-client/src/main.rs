//! Device emulator entry point.
//!
//! ```text
//! telem-client [--config FILE] SERVER_ADDRESS SERVER_PORT [DEVICE_TYPE DEVICE_ID]...
//! ```
//!
//! Arguments are validated before any connection is attempted: a bad port,
//! an unknown device type, or a type without an identifier prints usage to
//! stderr and exits nonzero.  A failed connect or send is fatal too.  On
//! Ctrl+C the loop finishes its current iteration and the socket is closed.

use std::path::PathBuf;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use telem_client::application::emit_telemetry::EmitTelemetryUseCase;
use telem_client::infrastructure::devices::{build_device, parse_device_specs, supported_type_names};
use telem_client::infrastructure::network::ServerConnection;
use telem_client::infrastructure::storage::config::load_config;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Telemetry device emulator.
///
/// Connects to a collector and sends one frame per emulated device every
/// send period.
#[derive(Debug, Parser)]
#[command(
    name = "telem-client",
    version,
    after_help = format!("Supported device types: {}", supported_type_names())
)]
struct Cli {
    /// IP address of the collector.
    server_address: String,

    /// TCP port of the collector.
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    server_port: u16,

    /// Device type and identifier pairs, e.g. `temp-monitor sensor-1`.
    #[arg(value_name = "DEVICE_TYPE DEVICE_ID", num_args = 0..)]
    devices: Vec<String>,

    /// Optional TOML configuration file.
    #[arg(long, env = "TELEM_CONFIG")]
    config: Option<PathBuf>,
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
    let specs = match parse_device_specs(&cli.devices) {
        Ok(specs) => specs,
        Err(e) => Cli::command().error(ErrorKind::InvalidValue, e).exit(),
    };
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    init_logging(&config.logging.level);

    let connection = ServerConnection::connect(&cli.server_address, cli.server_port)
        .await
        .context("could not reach the collector")?;

    let mut use_case = EmitTelemetryUseCase::new(connection, config.telemetry.send_period());
    for (device_type, identifier) in specs {
        use_case.attach_device(build_device(device_type, identifier));
    }
    for entry in config.devices {
        use_case.attach_device(build_device(entry.device_type, entry.id));
    }
    if use_case.device_count() == 0 {
        warn!("no devices attached; nothing will be sent");
    }

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

    let result = use_case.run(shutdown).await;
    use_case.shutdown().await;
    result.context("lost connection to the collector")?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
