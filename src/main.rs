//! daap-send: deliver one instrumentation message to the local relay.
//!
//! This is the CLI front end for the transport library: parse flags, load
//! configuration, build the client, ship the message, exit. The exit code
//! identifies the failure kind so scripts can dispatch without parsing
//! stderr (see `TransportError::exit_code`).

use anyhow::{Context, Result};
use clap::Parser;
use daap_transport::{cli::Cli, config::TransportConfig, transport::RelayClient};
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;
    debug!("Parsed CLI arguments: {:?}", cli);

    // Config hierarchy: defaults <- file <- environment <- CLI flags.
    let mut config = TransportConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    debug!("Effective transport config: {:?}", config);

    let client = match RelayClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    match client.send(cli.message.as_bytes()) {
        Ok(written) => {
            info!("Delivered {} bytes to relay at {}", written, config.endpoint);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Initialize the tracing subscriber for debug logging on stderr.
///
/// # Verbosity Levels
/// - 0 (default): Only warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
