//! Configuration for the relay transport.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. Built-in defaults (loopback relay endpoint, no peer verification,
//!    no timeouts)
//! 2. Optional TOML config file (via `--config` flag)
//! 3. `DAAP_CERT_DIR` environment variable (credential directory only)
//! 4. CLI flags (highest priority)
//!
//! A missing config file is only an error when one was explicitly requested;
//! invalid TOML always fails fast with a clear message.
//!
//! # Example
//!
//! ```toml
//! cert_dir = "/etc/daap/certs"
//! endpoint = "127.0.0.1:5555"
//! verify_peer = false
//! connect_timeout_ms = 2000
//! io_timeout_ms = 5000
//! ```

mod error;
mod schema;

pub use error::ConfigError;
pub use schema::{TransportConfig, CERT_DIR_ENV, DEFAULT_RELAY_PORT};
