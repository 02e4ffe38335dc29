//! TLS stage layered over a tunneled socket
//!
//! Certificate validation uses the platform trust store by default. Callers
//! can supply their own roots, add a PEM bundle, or explicitly turn
//! verification off, in which case the result reports the peer as
//! unverified.

use crate::error::{Result, TunnelError};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Client-side TLS configuration for secure tunnels
#[derive(Clone)]
pub struct SecureLayer {
    connector: TlsConnector,
    verifies_peer: bool,
}

impl SecureLayer {
    /// Validate peers against the platform's trust store
    pub fn platform() -> Result<Self> {
        Self::with_roots(platform_roots())
    }

    /// Validate peers against the given roots only
    pub fn with_roots(roots: RootCertStore) -> Result<Self> {
        let config = ClientConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            verifies_peer: true,
        })
    }

    /// Platform roots plus the certificates in a PEM bundle
    pub fn from_pem_file(path: &Path) -> Result<Self> {
        let mut roots = platform_roots();
        for cert in load_pem_certs(path)? {
            roots.add(cert)?;
        }
        Self::with_roots(roots)
    }

    /// Complete handshakes without validating the peer's certificate
    pub fn accept_invalid_certs() -> Result<Self> {
        let provider = provider();
        let verifier = AcceptAnyServerCert {
            provider: provider.clone(),
        };
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            verifies_peer: false,
        })
    }

    /// Whether a completed handshake implies a validated certificate chain
    pub fn verifies_peer(&self) -> bool {
        self.verifies_peer
    }

    /// Run the client handshake over `stream`
    ///
    /// The stream is consumed; on failure it is dropped and thereby closed.
    pub async fn handshake<S>(&self, stream: S, server_name: &str) -> Result<TlsStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|_| TunnelError::InvalidServerName(server_name.to_string()))?;

        debug!("Starting TLS handshake with {}", server_name);
        self.connector
            .connect(name, stream)
            .await
            .map_err(|source| TunnelError::SecureHandshakeFailed {
                server_name: server_name.to_string(),
                source,
            })
    }
}

impl std::fmt::Debug for SecureLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureLayer")
            .field("verifies_peer", &self.verifies_peer)
            .finish()
    }
}

/// Load the OS trust store, skipping certificates that fail to parse
fn platform_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();

    for err in native.errors {
        debug!("Warning loading native cert: {}", err);
    }

    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    if ignored > 0 {
        debug!("Ignored {} unparsable root certificates", ignored);
    }
    if added == 0 {
        warn!("No system root certificates found; secure tunnels will fail validation");
    } else {
        debug!("Loaded {} root certificates", added);
    }

    roots
}

fn load_pem_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).map_err(|source| TunnelError::TrustAnchors {
        path: path.to_path_buf(),
        source,
    })?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|source| TunnelError::TrustAnchors {
            path: path.to_path_buf(),
            source,
        })
}

/// Verifier used when the caller opts out of certificate validation
///
/// Handshake signatures are still checked so the session keys are bound to
/// the presented certificate.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
