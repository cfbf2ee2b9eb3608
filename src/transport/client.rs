//! Relay client: session establishment and the transmit loop.
//!
//! [`RelayClient`] owns the shared TLS context and a write lock, and is the
//! single public entry point for shipping a message. Session establishment
//! sits behind the [`Connector`] trait so tests can substitute mock
//! transports for the real TLS dial.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::{ClientConfig, ClientConnection, StreamOwned};
use rustls_pki_types::ServerName;
use tracing::{debug, trace};

use super::credentials::CredentialPair;
use super::error::TransportError;
use super::session::{SessionStream, TlsSession};
use super::tls::build_client_config;
use crate::config::TransportConfig;

/// Establishes one session per call.
///
/// The production implementation is [`TlsConnector`]. Implementations must
/// not retry internally; retry policy belongs to the caller of
/// [`RelayClient::send`].
pub trait Connector: Send + Sync {
    /// Open a fresh session to the relay.
    fn connect(&self) -> Result<Box<dyn SessionStream>, TransportError>;
}

/// Production connector: TCP to the relay endpoint, then a TLS client
/// handshake using the shared context.
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    endpoint: SocketAddr,
    connect_timeout: Option<Duration>,
    io_timeout: Option<Duration>,
}

impl TlsConnector {
    /// Create a connector over an already-built TLS context.
    pub fn new(
        config: Arc<ClientConfig>,
        endpoint: SocketAddr,
        connect_timeout: Option<Duration>,
        io_timeout: Option<Duration>,
    ) -> Self {
        Self {
            config,
            endpoint,
            connect_timeout,
            io_timeout,
        }
    }
}

impl Connector for TlsConnector {
    fn connect(&self) -> Result<Box<dyn SessionStream>, TransportError> {
        // TCP connect; the socket is dropped (closed) on every error path.
        let tcp = match self.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&self.endpoint, timeout),
            None => TcpStream::connect(&self.endpoint),
        }
        .map_err(|source| TransportError::Connect {
            endpoint: self.endpoint,
            source,
        })?;

        tcp.set_read_timeout(self.io_timeout)
            .map_err(TransportError::Socket)?;
        tcp.set_write_timeout(self.io_timeout)
            .map_err(TransportError::Socket)?;

        // The relay is addressed by IP, and with verify_peer off the name is
        // only used for SNI; the endpoint address is the honest choice.
        let server_name = ServerName::from(self.endpoint.ip());
        let conn = ClientConnection::new(self.config.clone(), server_name)
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let mut stream = StreamOwned::new(conn, tcp);

        // Drive the handshake to completion now so establishment failures
        // are reported as such, not as write errors later.
        while stream.conn.is_handshaking() {
            if let Err(e) = stream.conn.complete_io(&mut stream.sock) {
                // Tear down the partially-established state before failing.
                stream.conn.send_close_notify();
                let _ = stream.conn.complete_io(&mut stream.sock);
                return Err(TransportError::Handshake(e.to_string()));
            }
        }

        debug!("TLS session established with relay at {}", self.endpoint);
        Ok(Box::new(TlsSession::new(stream)))
    }
}

/// Client for shipping instrumentation messages to the local relay.
///
/// The TLS context (credential pair, protocol policy, verification policy)
/// is built once at construction and reused by every connection attempt.
/// `send` may be called from any number of threads; transmissions are
/// serialized by an internal write lock.
pub struct RelayClient {
    connector: Box<dyn Connector>,
    /// Serializes transmissions: at most one session in flight, each
    /// message's bytes contiguous on the wire.
    write_lock: Mutex<()>,
}

impl RelayClient {
    /// Build a client from configuration.
    ///
    /// Resolves the credential pair and builds the shared TLS context up
    /// front; a misconfigured client fails here, before any socket is
    /// opened.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let credentials = CredentialPair::resolve(config.cert_dir()?)?;
        let tls_config = build_client_config(&credentials, config.verify_peer)?;
        let connector = TlsConnector::new(
            tls_config,
            config.endpoint,
            config.connect_timeout(),
            config.io_timeout(),
        );
        Ok(Self::with_connector(Box::new(connector)))
    }

    /// Build a client over a custom connector.
    ///
    /// Used by tests to substitute mock transports; also the seam for
    /// callers that tunnel through something other than the stock TLS dial.
    pub fn with_connector(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            write_lock: Mutex::new(()),
        }
    }

    /// Deliver one message to the relay.
    ///
    /// Establishes a fresh session, writes the whole buffer (tolerating
    /// partial writes), tears the session down, and returns the byte count,
    /// which on success always equals `message.len()`. An empty message
    /// still opens and closes a session and returns 0.
    ///
    /// # Errors
    ///
    /// Connection and handshake failures propagate without any write being
    /// attempted. A hard error mid-write yields
    /// [`TransportError::Send`] carrying the bytes already accepted.
    /// Teardown runs on every exit path; nothing is retried internally.
    pub fn send(&self, message: &[u8]) -> Result<usize, TransportError> {
        let _guard = self.write_lock.lock().unwrap();

        let mut session = self.connector.connect()?;
        let result = write_fully(session.as_mut(), message);
        session.shutdown();

        if let Ok(written) = result {
            trace!("Delivered {} bytes to relay", written);
        }
        result
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient").finish_non_exhaustive()
    }
}

/// Write `message` to the session, looping over partial writes.
///
/// Each underlying write may accept fewer bytes than offered; the loop
/// continues until the running total equals the message length. A write
/// that returns zero bytes or a hard error aborts immediately with the
/// partial count — which is always strictly less than the total.
fn write_fully(
    session: &mut dyn SessionStream,
    message: &[u8],
) -> Result<usize, TransportError> {
    let total = message.len();
    let mut written = 0;

    while written < total {
        match session.write(&message[written..]) {
            Ok(0) => {
                return Err(TransportError::Send {
                    written,
                    total,
                    source: io::Error::new(
                        io::ErrorKind::WriteZero,
                        "relay closed the connection mid-message",
                    ),
                });
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(TransportError::Send {
                    written,
                    total,
                    source,
                });
            }
        }
    }

    session
        .flush()
        .map_err(|source| TransportError::Send {
            written,
            total,
            source,
        })?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock session writing into a shared capture buffer, `chunk` bytes per
    /// call, yielding between writes to invite interleaving.
    struct MockSession {
        capture: Arc<Mutex<Vec<u8>>>,
        chunk: usize,
        shutdowns: Arc<AtomicUsize>,
        /// Accept this many bytes, then report `Ok(0)` forever.
        accept_limit: Option<usize>,
        accepted: usize,
    }

    impl Write for MockSession {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut n = self.chunk.min(buf.len());
            if let Some(limit) = self.accept_limit {
                n = n.min(limit - self.accepted);
                if n == 0 {
                    return Ok(0);
                }
            }
            self.capture.lock().unwrap().extend_from_slice(&buf[..n]);
            self.accepted += n;
            std::thread::yield_now();
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SessionStream for MockSession {
        fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockConnector {
        capture: Arc<Mutex<Vec<u8>>>,
        chunk: usize,
        connects: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
        accept_limit: Option<usize>,
        fail_connect: bool,
    }

    impl MockConnector {
        fn new(chunk: usize) -> Self {
            Self {
                capture: Arc::new(Mutex::new(Vec::new())),
                chunk,
                connects: Arc::new(AtomicUsize::new(0)),
                shutdowns: Arc::new(AtomicUsize::new(0)),
                accept_limit: None,
                fail_connect: false,
            }
        }
    }

    impl Connector for MockConnector {
        fn connect(&self) -> Result<Box<dyn SessionStream>, TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_connect {
                return Err(TransportError::Connect {
                    endpoint: "127.0.0.1:5555".parse().unwrap(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                });
            }
            Ok(Box::new(MockSession {
                capture: self.capture.clone(),
                chunk: self.chunk,
                shutdowns: self.shutdowns.clone(),
                accept_limit: self.accept_limit,
                accepted: 0,
            }))
        }
    }

    #[test]
    fn test_send_full_message() {
        let connector = MockConnector::new(usize::MAX);
        let capture = connector.capture.clone();
        let shutdowns = connector.shutdowns.clone();
        let client = RelayClient::with_connector(Box::new(connector));

        let n = client.send(b"daap,host=x value=1").unwrap();
        assert_eq!(n, 19);
        assert_eq!(capture.lock().unwrap().as_slice(), b"daap,host=x value=1");
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_empty_message() {
        let connector = MockConnector::new(usize::MAX);
        let connects = connector.connects.clone();
        let shutdowns = connector.shutdowns.clone();
        let client = RelayClient::with_connector(Box::new(connector));

        assert_eq!(client.send(b"").unwrap(), 0);
        // Even a zero-length message opens and tears down a session.
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_one_byte_per_write_still_delivers_in_order() {
        let connector = MockConnector::new(1);
        let capture = connector.capture.clone();
        let client = RelayClient::with_connector(Box::new(connector));

        let message: Vec<u8> = (0u8..=255).collect();
        let n = client.send(&message).unwrap();
        assert_eq!(n, message.len());
        assert_eq!(*capture.lock().unwrap(), message);
    }

    #[test]
    fn test_connect_failure_writes_nothing() {
        let mut connector = MockConnector::new(usize::MAX);
        connector.fail_connect = true;
        let capture = connector.capture.clone();
        let shutdowns = connector.shutdowns.clone();
        let client = RelayClient::with_connector(Box::new(connector));

        let result = client.send(b"payload");
        assert!(matches!(result, Err(TransportError::Connect { .. })));
        assert!(capture.lock().unwrap().is_empty());
        // No session existed, so nothing to tear down.
        assert_eq!(shutdowns.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_peer_closing_mid_message_reports_partial_count() {
        let mut connector = MockConnector::new(usize::MAX);
        connector.accept_limit = Some(7);
        let shutdowns = connector.shutdowns.clone();
        let client = RelayClient::with_connector(Box::new(connector));

        match client.send(b"daap,host=x value=1") {
            Err(TransportError::Send { written, total, .. }) => {
                assert_eq!(written, 7);
                assert_eq!(total, 19);
                assert!(written < total);
            }
            other => panic!("expected Send error, got {:?}", other),
        }
        // Teardown still ran on the failure path.
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_sends_never_interleave() {
        // 1-byte writes with thread yields make interleaving all but
        // certain if the write lock were missing.
        let connector = MockConnector::new(1);
        let capture = connector.capture.clone();
        let client = Arc::new(RelayClient::with_connector(Box::new(connector)));

        let a = vec![b'A'; 64];
        let b = vec![b'B'; 64];

        let handles: Vec<_> = [a.clone(), b.clone()]
            .into_iter()
            .map(|msg| {
                let client = client.clone();
                std::thread::spawn(move || client.send(&msg).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 64);
        }

        let wire = capture.lock().unwrap();
        assert_eq!(wire.len(), 128);
        let (first, second) = wire.split_at(64);
        // Each message's bytes are contiguous: one full run of one letter,
        // then one full run of the other.
        assert!(first.iter().all(|&c| c == first[0]));
        assert!(second.iter().all(|&c| c == second[0]));
        assert_ne!(first[0], second[0]);
    }

    #[test]
    fn test_missing_credentials_fail_before_any_connection() {
        let dir = tempfile::tempdir().unwrap();
        // Cert present, key missing.
        std::fs::write(dir.path().join("client_cert.pem"), "cert").unwrap();

        let config = TransportConfig {
            cert_dir: Some(dir.path().to_path_buf()),
            ..TransportConfig::default()
        };

        let result = RelayClient::new(&config);
        assert!(matches!(result, Err(TransportError::Config(_))));
    }
}
