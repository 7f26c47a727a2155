use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::certs::{CertificateSummary, summarize_chain};
use crate::errors::InspectError;

pub const DEFAULT_TLS_PORT: u16 = 443;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Anything that can report the certificate state of a hostname.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn inspect(&self, hostname: &str) -> Result<CertificateSummary, InspectError>;
}

/// Live inspector: dials the host, lets rustls verify chain and hostname, and
/// summarizes whatever chain the server presented.
pub struct TlsInspector {
    connector: TlsConnector,
    port: u16,
    timeout: Duration,
}

impl TlsInspector {
    pub fn new(port: u16, timeout: Duration) -> Result<Self, rustls::Error> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(root_store, port, timeout)
    }

    pub fn with_roots(
        root_store: RootCertStore,
        port: u16,
        timeout: Duration,
    ) -> Result<Self, rustls::Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            port,
            timeout,
        })
    }
}

#[async_trait]
impl CertificateSource for TlsInspector {
    async fn inspect(&self, hostname: &str) -> Result<CertificateSummary, InspectError> {
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|_| InspectError::InvalidHostname(hostname.to_string()))?;

        tracing::debug!(hostname, port = self.port, "Connecting");
        let tcp = tokio::time::timeout(self.timeout, TcpStream::connect((hostname, self.port)))
            .await
            .map_err(|_| InspectError::Timeout(hostname.to_string()))?
            .map_err(|e| InspectError::Connect(hostname.to_string(), e))?;

        // Chain and hostname verification happen inside the handshake.
        let tls_stream = tokio::time::timeout(self.timeout, self.connector.connect(server_name, tcp))
            .await
            .map_err(|_| InspectError::Timeout(hostname.to_string()))?
            .map_err(|e| InspectError::Handshake(hostname.to_string(), e))?;

        let (_io, conn) = tls_stream.get_ref();
        let summary = match conn.peer_certificates() {
            Some(chain) if !chain.is_empty() => summarize_chain(chain),
            _ => Err(InspectError::NoCertificates(hostname.to_string())),
        };

        // Dropping the stream closes the socket on every path above.
        drop(tls_stream);

        if let Ok(summary) = &summary {
            tracing::debug!(
                hostname,
                expires_at = %summary.expires_at,
                issuer = %summary.issuer,
                chain_len = summary.chain_len,
                "Certificate inspected"
            );
        }
        summary
    }
}
