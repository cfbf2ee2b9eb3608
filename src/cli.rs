//! Command-line interface definitions for daap-send.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::TransportConfig;

/// Ship one instrumentation message to the local relay.
///
/// daap-send reads transport settings from an optional config file, the
/// DAAP_CERT_DIR environment variable, and CLI flags (highest priority),
/// then delivers the message over a TLS connection to the relay and exits.
/// The exit code identifies the failure kind (2=config, 3=TLS config,
/// 4=socket, 5=connect, 6=handshake, 7=send).
#[derive(Parser, Debug)]
#[command(name = "daap-send")]
#[command(author, version, about)]
pub struct Cli {
    /// Message to deliver, sent as-is (no framing is added).
    pub message: String,

    /// Path to a TOML config file.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory containing client_cert.pem and client_key.pem.
    ///
    /// Overrides the config file and the DAAP_CERT_DIR environment
    /// variable.
    #[arg(long = "cert-dir", value_name = "DIR")]
    pub cert_dir: Option<PathBuf>,

    /// Relay endpoint to connect to (default 127.0.0.1:5555).
    #[arg(long = "endpoint", value_name = "ADDR:PORT")]
    pub endpoint: Option<SocketAddr>,

    /// Verify the relay's certificate against system trust roots.
    ///
    /// Off by default: the relay presents a self-managed certificate on a
    /// closed network.
    #[arg(long = "verify-peer")]
    pub verify_peer: bool,

    /// TCP connect timeout in milliseconds (0 = no timeout).
    #[arg(long = "connect-timeout-ms", value_name = "MS")]
    pub connect_timeout_ms: Option<u64>,

    /// Socket read/write timeout in milliseconds (0 = no timeout).
    #[arg(long = "io-timeout-ms", value_name = "MS")]
    pub io_timeout_ms: Option<u64>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Apply CLI flags on top of an already-loaded configuration.
    ///
    /// Flags have the highest priority in the configuration hierarchy.
    pub fn apply_overrides(&self, config: &mut TransportConfig) {
        if let Some(dir) = &self.cert_dir {
            config.cert_dir = Some(dir.clone());
        }
        if let Some(endpoint) = self.endpoint {
            config.endpoint = endpoint;
        }
        if self.verify_peer {
            config.verify_peer = true;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = self.io_timeout_ms {
            config.io_timeout_ms = ms;
        }
    }
}
