//! Configuration schema for the relay transport.
//!
//! All fields have sensible defaults matching the historical behavior of the
//! transport: loopback relay on port 5555, peer verification off, and no
//! timeouts. Every default can be overridden from a TOML file, the
//! environment, or CLI flags.

use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ConfigError;

/// Environment variable naming the credential directory.
pub const CERT_DIR_ENV: &str = "DAAP_CERT_DIR";

/// Default relay port on loopback.
pub const DEFAULT_RELAY_PORT: u16 = 5555;

/// Transport configuration.
///
/// The relay always lives on the local host; the actual off-box transfer is
/// performed by the relay process, never by this library. `endpoint` is
/// configurable mostly so tests can point at an ephemeral port.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Directory containing `client_cert.pem` and `client_key.pem`.
    ///
    /// When unset here, the `DAAP_CERT_DIR` environment variable is
    /// consulted at load time.
    pub cert_dir: Option<PathBuf>,

    /// Relay endpoint to connect to.
    pub endpoint: SocketAddr,

    /// Verify the relay's certificate against system trust roots.
    ///
    /// Defaults to `false`: the relay runs on a closed network and presents
    /// a certificate no public CA signed. This is a deliberate policy knob,
    /// not an oversight.
    pub verify_peer: bool,

    /// TCP connect timeout in milliseconds. 0 = no timeout.
    pub connect_timeout_ms: u64,

    /// Read/write timeout on the established socket in milliseconds.
    /// 0 = no timeout.
    pub io_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            cert_dir: None,
            endpoint: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_RELAY_PORT)),
            verify_peer: false,
            connect_timeout_ms: 0,
            io_timeout_ms: 0,
        }
    }
}

impl TransportConfig {
    /// Load configuration, merging file, environment, and defaults.
    ///
    /// When `path` is `None` the built-in defaults are used as the base.
    /// The `DAAP_CERT_DIR` environment variable fills in `cert_dir` only if
    /// the file didn't set it (explicit config wins over ambient
    /// environment).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Loaded transport config from {:?}", path);
        Ok(config)
    }

    /// Fill unset fields from the environment.
    fn apply_env(&mut self) {
        if self.cert_dir.is_none() {
            if let Some(dir) = std::env::var_os(CERT_DIR_ENV) {
                debug!("Using credential directory from {}", CERT_DIR_ENV);
                self.cert_dir = Some(PathBuf::from(dir));
            }
        }
    }

    /// The configured credential directory.
    ///
    /// Fails with [`ConfigError::MissingCertDir`] when neither the config
    /// file, the CLI, nor the environment provided one.
    pub fn cert_dir(&self) -> Result<&Path, ConfigError> {
        self.cert_dir.as_deref().ok_or(ConfigError::MissingCertDir)
    }

    /// Connect timeout as a `Duration`, `None` when disabled.
    pub fn connect_timeout(&self) -> Option<Duration> {
        nonzero_millis(self.connect_timeout_ms)
    }

    /// Socket read/write timeout as a `Duration`, `None` when disabled.
    pub fn io_timeout(&self) -> Option<Duration> {
        nonzero_millis(self.io_timeout_ms)
    }
}

fn nonzero_millis(ms: u64) -> Option<Duration> {
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}
