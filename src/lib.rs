//! daap-transport: TLS client transport for instrumentation messages
//!
//! This crate delivers caller-formatted instrumentation messages to a
//! co-located relay process over a TLS-wrapped TCP connection. The relay
//! (message broker, point-to-point forwarder, or whatever else runs on the
//! box) performs the actual off-box transfer; this library only covers the
//! local hop.
//!
//! # Design
//!
//! - **One session per message**: every `send` opens a fresh TLS connection,
//!   writes the whole buffer, and performs a graceful two-step close-notify
//!   shutdown. The receiver delimits messages by connection boundary, so
//!   there is no application-level framing.
//! - **Serialized transmissions**: a per-client write lock guarantees that
//!   at most one session is in flight and each message's bytes are
//!   contiguous on the wire.
//! - **Client authentication**: the client presents a certificate/key pair
//!   resolved from a configured credential directory. Peer verification is
//!   off by default (the relay lives on a closed network) and can be enabled
//!   with `verify_peer`.
//! - **No retries, no timeouts by default**: failures propagate to the
//!   caller with enough detail (bytes already written) for a caller-level
//!   retry wrapper; connect/IO timeouts are opt-in configuration.
//!
//! # I/O Architecture
//!
//! All calls are synchronous and blocking on the calling thread. There is no
//! internal thread pool and no async runtime. Debug logging goes to
//! `tracing`; the library never writes to stdout or stderr itself.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod transport;
