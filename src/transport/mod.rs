//! TLS transport to the local relay.
//!
//! One message, one session: each call to [`RelayClient::send`] opens a
//! fresh TLS connection to the relay, writes the caller's bytes as-is (no
//! framing; the relay delimits messages by connection boundary), performs a
//! graceful two-step close-notify shutdown, and returns the byte count.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   resolve    ┌──────────────────┐
//! │ TransportConfig│─────────────→│ CredentialPair   │
//! └───────┬───────┘              └────────┬─────────┘
//!         │ build once                    │ PEM cert/key
//!         ▼                               ▼
//! ┌───────────────┐  connect()   ┌──────────────────┐
//! │  RelayClient  │─────────────→│  TlsSession      │  (one per message)
//! │  (write lock) │   send loop  │  close-notify ×2 │
//! └───────────────┘              └──────────────────┘
//! ```
//!
//! The shared `rustls::ClientConfig` is built once per client and reused by
//! every connection attempt; only the per-message session is short-lived.

mod client;
mod credentials;
mod error;
mod session;
mod tls;

pub use client::{Connector, RelayClient, TlsConnector};
pub use credentials::{CredentialPair, CLIENT_CERT_FILE, CLIENT_KEY_FILE, MAX_CREDENTIAL_PATH_LEN};
pub use error::TransportError;
pub use session::{SessionStream, TlsSession};
pub use tls::build_client_config;
