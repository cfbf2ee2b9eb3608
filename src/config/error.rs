//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading configuration or resolving the
/// client credential pair.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file {path:?}: {source}")]
    ReadError {
        /// Path to the file that couldn't be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse a TOML configuration file.
    #[error("failed to parse config file {path:?}: {source}")]
    ParseError {
        /// Path to the file that couldn't be parsed.
        path: PathBuf,
        /// The underlying TOML parse error.
        source: toml::de::Error,
    },

    /// No credential directory was configured.
    #[error("credential directory not set: use --cert-dir, set cert_dir in the config file, or export DAAP_CERT_DIR")]
    MissingCertDir,

    /// A joined credential path exceeds the path-length budget.
    #[error("credential path exceeds {limit} bytes: {path:?}")]
    PathTooLong {
        /// The over-long path that was rejected.
        path: PathBuf,
        /// The maximum accepted length in bytes.
        limit: usize,
    },

    /// A credential file is missing or not readable.
    #[error("credential file {path:?} is not readable: {source}")]
    Unreadable {
        /// Path to the certificate or key file.
        path: PathBuf,
        /// The underlying I/O error (not found, permission denied, ...).
        source: std::io::Error,
    },
}
