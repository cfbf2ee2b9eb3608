//! Transport error types.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while establishing a session or transmitting a
/// message.
///
/// No failure is retried internally; every variant is returned to the
/// immediate caller of [`RelayClient::send`](super::RelayClient::send), and
/// session teardown has already run by the time the caller sees it.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Bad or missing credential configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Building the shared TLS client configuration failed.
    #[error("TLS configuration failed: {0}")]
    TlsConfig(String),

    /// Configuring the connected socket (timeouts) failed.
    #[error("socket configuration failed: {0}")]
    Socket(#[source] io::Error),

    /// TCP connection to the relay failed.
    #[error("connection to relay at {endpoint} failed: {source}")]
    Connect {
        /// The relay endpoint that refused or timed out.
        endpoint: SocketAddr,
        /// The underlying OS error.
        source: io::Error,
    },

    /// The TLS handshake with the relay failed.
    #[error("TLS handshake with relay failed: {0}")]
    Handshake(String),

    /// The message was not (fully) delivered.
    ///
    /// `written` is the number of bytes the relay accepted before the
    /// failure; callers wrapping this library with a retry policy can use it
    /// for diagnostics. It is always strictly less than the message length.
    #[error("send failed after {written} of {total} bytes: {source}")]
    Send {
        /// Bytes written before the hard error.
        written: usize,
        /// Total length of the message that was being sent.
        total: usize,
        /// The underlying I/O error.
        source: io::Error,
    },
}

impl TransportError {
    /// Stable process exit code for this error kind.
    ///
    /// Used by the `daap-send` binary; scripts can dispatch on the code
    /// without parsing stderr.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::TlsConfig(_) => 3,
            Self::Socket(_) => 4,
            Self::Connect { .. } => 5,
            Self::Handshake(_) => 6,
            Self::Send { .. } => 7,
        }
    }
}
