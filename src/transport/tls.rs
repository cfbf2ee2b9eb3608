//! Shared TLS client configuration.
//!
//! Builds the one `rustls::ClientConfig` a [`RelayClient`](super::RelayClient)
//! reuses for every connection attempt:
//!
//! - TLS 1.3 and 1.2 only; older protocol versions are never negotiated.
//! - The client certificate/key pair from [`CredentialPair`] is always
//!   presented.
//! - Peer verification follows the `verify_peer` policy flag: off by
//!   default (the relay is on a closed network with a self-managed
//!   certificate), system trust roots when enabled.
//!
//! Crypto-provider installation is a one-time idempotent step guarded by a
//! [`Once`], so constructing many clients neither leaks nor races.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Once};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use tracing::{debug, warn};

use super::credentials::CredentialPair;
use super::error::TransportError;

/// Protocol policy: never negotiate anything older than TLS 1.2.
static PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

static PROVIDER_INIT: Once = Once::new();

/// Install the process-wide crypto provider exactly once.
///
/// Safe to call from every client constructor; losing the race to another
/// installer (including one outside this crate) is fine.
fn init_crypto_provider() {
    PROVIDER_INIT.call_once(|| {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Build the shared TLS client configuration.
///
/// The returned config is read-only after construction and safe to share
/// across threads; connections borrow it through the `Arc`.
pub fn build_client_config(
    credentials: &CredentialPair,
    verify_peer: bool,
) -> Result<Arc<ClientConfig>, TransportError> {
    init_crypto_provider();

    let cert_chain = load_certs(credentials.cert_path())?;
    let key = load_private_key(credentials.key_path())?;

    let builder = ClientConfig::builder_with_protocol_versions(PROTOCOL_VERSIONS);

    let config = if verify_peer {
        let roots = system_roots()?;
        builder
            .with_root_certificates(roots)
            .with_client_auth_cert(cert_chain, key)
    } else {
        debug!("Peer certificate verification disabled by policy");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert::new()))
            .with_client_auth_cert(cert_chain, key)
    }
    .map_err(|e| TransportError::TlsConfig(format!("failed to load client credentials: {}", e)))?;

    Ok(Arc::new(config))
}

/// Parse the PEM certificate chain.
fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    let file = File::open(path).map_err(|e| {
        TransportError::TlsConfig(format!("failed to open certificate {:?}: {}", path, e))
    })?;

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            TransportError::TlsConfig(format!("failed to parse certificate {:?}: {}", path, e))
        })?;

    if certs.is_empty() {
        return Err(TransportError::TlsConfig(format!(
            "no certificates found in {:?}",
            path
        )));
    }

    Ok(certs)
}

/// Parse the PEM private key.
fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TransportError> {
    let file = File::open(path)
        .map_err(|e| TransportError::TlsConfig(format!("failed to open key {:?}: {}", path, e)))?;

    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| TransportError::TlsConfig(format!("failed to parse key {:?}: {}", path, e)))?
        .ok_or_else(|| TransportError::TlsConfig(format!("no private key found in {:?}", path)))
}

/// Load system trust roots for the `verify_peer = true` policy.
fn system_roots() -> Result<RootCertStore, TransportError> {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for err in native.errors {
        warn!("Error loading native cert: {}", err);
    }
    for cert in native.certs {
        if let Err(e) = roots.add(cert) {
            debug!("Skipping unusable root certificate: {}", e);
        }
    }

    if roots.is_empty() {
        return Err(TransportError::TlsConfig(
            "verify_peer is enabled but no system root certificates were found".into(),
        ));
    }

    debug!("Loaded {} system root certificates", roots.len());
    Ok(roots)
}

/// Verifier that accepts any peer certificate.
///
/// Signatures are still validated so a broken handshake is caught; only the
/// chain-of-trust check is skipped, matching the transport's closed-network
/// policy.
#[derive(Debug)]
struct AcceptAnyServerCert {
    supported: WebPkiSupportedAlgorithms,
}

impl AcceptAnyServerCert {
    fn new() -> Self {
        Self {
            supported: rustls::crypto::aws_lc_rs::default_provider()
                .signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.supported)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.supported)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_test_credentials(dir: &Path) -> CredentialPair {
        let signed = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        fs::write(dir.join(super::super::CLIENT_CERT_FILE), signed.cert.pem()).unwrap();
        fs::write(
            dir.join(super::super::CLIENT_KEY_FILE),
            signed.key_pair.serialize_pem(),
        )
        .unwrap();
        CredentialPair::resolve(dir).unwrap()
    }

    #[test]
    fn test_build_config_no_verify() {
        let dir = tempfile::tempdir().unwrap();
        let credentials = write_test_credentials(dir.path());

        let config = build_client_config(&credentials, false).unwrap();
        // Context is built once and shared; a second build must also succeed
        // (idempotent provider init, no leaked state).
        let config2 = build_client_config(&credentials, false).unwrap();
        assert!(!Arc::ptr_eq(&config, &config2));
    }

    #[test]
    fn test_build_config_garbage_pem() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(super::super::CLIENT_CERT_FILE), "not pem").unwrap();
        fs::write(dir.path().join(super::super::CLIENT_KEY_FILE), "not pem").unwrap();
        let credentials = CredentialPair::resolve(dir.path()).unwrap();

        let result = build_client_config(&credentials, false);
        assert!(matches!(result, Err(TransportError::TlsConfig(_))));
    }

    #[test]
    fn test_build_config_key_without_cert_material() {
        let dir = tempfile::tempdir().unwrap();
        let signed = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        // Valid cert, but the key file holds certificate PEM: no key inside.
        fs::write(dir.path().join(super::super::CLIENT_CERT_FILE), signed.cert.pem()).unwrap();
        fs::write(dir.path().join(super::super::CLIENT_KEY_FILE), signed.cert.pem()).unwrap();
        let credentials = CredentialPair::resolve(dir.path()).unwrap();

        let result = build_client_config(&credentials, false);
        assert!(matches!(result, Err(TransportError::TlsConfig(_))));
    }
}
