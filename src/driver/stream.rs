//! Stream abstraction for TCP and TCPS connections.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

use super::config::{Descriptor, TlsConfig, Transport};
use crate::error::{OraError, OraResult};

/// An Oracle connection stream (TCP or TLS).
#[allow(clippy::large_enum_variant)]
pub enum OraStream {
    Tcp(TcpStream),
    Tls(TlsStream<TcpStream>),
}

impl OraStream {
    /// Open the transport named by the descriptor.
    pub async fn connect(descriptor: &Descriptor) -> OraResult<Self> {
        let tcp_stream = TcpStream::connect(descriptor.address()).await?;
        // Disable Nagle's algorithm for lower latency
        tcp_stream.set_nodelay(true)?;

        match descriptor.transport {
            Transport::Tcp => Ok(OraStream::Tcp(tcp_stream)),
            Transport::Tcps => {
                let tls = descriptor.tls.clone().unwrap_or_default();
                let server_name = tls
                    .server_name
                    .clone()
                    .unwrap_or_else(|| descriptor.host.clone());
                let connector = TlsConnector::from(Arc::new(client_config(&tls)?));
                let server_name = ServerName::try_from(server_name)
                    .map_err(|_| OraError::Connection("Invalid hostname for TLS".to_string()))?;
                let tls_stream = connector
                    .connect(server_name, tcp_stream)
                    .await
                    .map_err(|e| OraError::Connection(format!("TLS handshake failed: {}", e)))?;
                Ok(OraStream::Tls(tls_stream))
            }
        }
    }
}

fn client_config(config: &TlsConfig) -> OraResult<ClientConfig> {
    let mut root_cert_store = RootCertStore::empty();
    if let Some(ca_pem) = &config.ca_cert_pem {
        for cert in rustls_pemfile::certs(&mut ca_pem.as_slice()).filter_map(|r| r.ok()) {
            let _ = root_cert_store.add(cert);
        }
    } else {
        // Use system certs
        for cert in rustls_native_certs::load_native_certs().certs {
            let _ = root_cert_store.add(cert);
        }
    }

    let builder = ClientConfig::builder().with_root_certificates(root_cert_store);
    match (&config.client_cert_pem, &config.client_key_pem) {
        (Some(cert_pem), Some(key_pem)) => {
            let client_certs: Vec<CertificateDer<'static>> =
                rustls_pemfile::certs(&mut cert_pem.as_slice())
                    .filter_map(|r| r.ok())
                    .collect();
            let client_key = rustls_pemfile::private_key(&mut key_pem.as_slice())
                .map_err(|e| OraError::Connection(format!("Invalid client key: {:?}", e)))?
                .ok_or_else(|| OraError::Connection("No private key found in PEM".to_string()))?;
            builder
                .with_client_auth_cert(client_certs, client_key)
                .map_err(|e| OraError::Connection(format!("Invalid client cert/key: {}", e)))
        }
        _ => Ok(builder.with_no_client_auth()),
    }
}

impl AsyncRead for OraStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            OraStream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            OraStream::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for OraStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            OraStream::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            OraStream::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            OraStream::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            OraStream::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            OraStream::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            OraStream::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
