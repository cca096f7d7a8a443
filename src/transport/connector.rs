//! Stream connectors.
//!
//! The pool opens connections lazily through a [`Connector`]:
//! - [`TlsConnector`] - TCP + TLS via `tokio-rustls`, trusting the webpki roots
//! - [`PlainConnector`] - bare TCP, for local gateways and tests

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use crate::error::{BotwireError, Result};
use crate::BoxFuture;

/// Bidirectional byte stream usable by the pool.
pub trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoStream for T {}

/// Type-erased stream.
pub type BoxedStream = Box<dyn IoStream>;

/// Opens new streams to the remote host.
pub trait Connector: Send + Sync + 'static {
    /// Open one stream.
    fn connect(&self) -> BoxFuture<'_, Result<BoxedStream>>;
}

/// TLS over TCP.
pub struct TlsConnector {
    host: String,
    port: u16,
    server_name: ServerName<'static>,
    tls: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Connector for `host:port`, verifying the server against the webpki roots.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|_| BotwireError::InvalidDnsName(host.to_owned()))?;

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| BotwireError::Config(format!("TLS setup failed: {e}")))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            host: host.to_owned(),
            port,
            server_name,
            tls: tokio_rustls::TlsConnector::from(Arc::new(config)),
        })
    }
}

impl Connector for TlsConnector {
    fn connect(&self) -> BoxFuture<'_, Result<BoxedStream>> {
        Box::pin(async move {
            let tcp = TcpStream::connect((self.host.as_str(), self.port)).await?;
            tcp.set_nodelay(true)?;
            let stream = self.tls.connect(self.server_name.clone(), tcp).await?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}

/// Plain TCP, no encryption.
pub struct PlainConnector {
    host: String,
    port: u16,
}

impl PlainConnector {
    /// Connector for `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Connector for PlainConnector {
    fn connect(&self) -> BoxFuture<'_, Result<BoxedStream>> {
        Box::pin(async move {
            let tcp = TcpStream::connect((self.host.as_str(), self.port)).await?;
            tcp.set_nodelay(true)?;
            Ok(Box::new(tcp) as BoxedStream)
        })
    }
}
