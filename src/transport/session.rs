//! Per-message TLS session and its teardown.
//!
//! A session owns the TCP socket and the TLS connection state for exactly
//! one outbound message. It is never reused: the transmitter tears it down
//! unconditionally after each send attempt, success or failure.
//!
//! # Teardown Invariants
//!
//! - Two-step close-notify: send the local alert, then wait briefly for the
//!   peer's. A peer that already hung up is a no-op, not an error.
//! - Idempotent: calling [`SessionStream::shutdown`] more than once is safe;
//!   the underlying state is released exactly once.
//! - Defensive: `Drop` shuts the session down if the caller didn't.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use rustls::{ClientConnection, StreamOwned};
use tracing::{debug, trace};

/// Upper bound on reads performed while waiting for the peer's
/// close-notify, so a misbehaving peer cannot stall teardown forever.
const MAX_SHUTDOWN_READS: usize = 8;

/// One transport session: something a single message can be written to and
/// that can be shut down gracefully.
///
/// The production implementation is [`TlsSession`]; tests substitute mock
/// streams to exercise the write loop without a network.
pub trait SessionStream: Write + Send {
    /// Tear the session down: close-notify exchange, then release the
    /// connection state and socket. Idempotent.
    fn shutdown(&mut self);
}

/// An established TLS session over a TCP socket.
///
/// Constructed by [`TlsConnector`](super::TlsConnector) after the handshake
/// has completed. Does not implement `Clone`: a session's socket belongs to
/// exactly one transmission.
pub struct TlsSession {
    /// `None` once the session has been shut down.
    stream: Option<StreamOwned<ClientConnection, TcpStream>>,
}

impl TlsSession {
    pub(super) fn new(stream: StreamOwned<ClientConnection, TcpStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Close-notify exchange and resource release. Taking the stream out of
    /// the `Option` is what makes repeated calls (and `Drop` after an
    /// explicit shutdown) a no-op.
    fn shutdown_inner(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        // Step one: queue our close-notify and flush it out. The peer may
        // already be gone; failures here are expected and ignored.
        stream.conn.send_close_notify();
        let _ = stream.conn.complete_io(&mut stream.sock);

        // Step two: wait for the peer's close-notify, which surfaces as a
        // clean EOF on the plaintext stream. Unexpected data is discarded;
        // an error means the peer skipped the alert, which is fine.
        let mut scratch = [0u8; 256];
        for _ in 0..MAX_SHUTDOWN_READS {
            match stream.read(&mut scratch) {
                Ok(0) => {
                    trace!("Peer acknowledged close-notify");
                    break;
                }
                Ok(n) => {
                    trace!("Discarding {} unexpected bytes during shutdown", n);
                }
                Err(_) => break,
            }
        }

        debug!("TLS session closed");
        // Dropping the stream closes the socket descriptor.
    }
}

impl Write for TlsSession {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stream.as_mut() {
            Some(stream) => stream.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "session already shut down",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.flush(),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "session already shut down",
            )),
        }
    }
}

impl SessionStream for TlsSession {
    fn shutdown(&mut self) {
        self.shutdown_inner();
    }
}

impl Drop for TlsSession {
    fn drop(&mut self) {
        // Defensive teardown if the caller never shut the session down.
        self.shutdown_inner();
    }
}

impl std::fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSession")
            .field("open", &self.stream.is_some())
            .finish()
    }
}
