//! TLS sessions on top of rustls.
//!
//! The handshake is driven by `tokio-rustls` inside [`TlsConnector::open`].
//! Once it completes the stream is split back into the raw socket and the
//! rustls connection, and records are moved by hand with the socket's
//! non-blocking `try_read`/`try_write`. That way every read and write on an
//! established session can report would-block just like the plain TCP one.

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::tcp::{connect_tcp, tokio_interest};
use super::{Connector, Interest, Session, TransportError};

/// Build the client TLS configuration.
///
/// With a `ca_file` only the PEM certificates in that file are trusted;
/// otherwise the operating system's verifier is used.
pub fn client_config(ca_file: Option<&Path>) -> Result<Arc<ClientConfig>> {
    let config = match ca_file {
        Some(path) => {
            let mut roots = RootCertStore::empty();
            let certs = CertificateDer::pem_file_iter(path)
                .map_err(|e| anyhow::anyhow!("{e:?}"))
                .with_context(|| format!("Failed to open CA file {}", path.display()))?;
            for cert in certs {
                let cert = cert
                    .map_err(|e| anyhow::anyhow!("{e:?}"))
                    .with_context(|| format!("Invalid certificate in {}", path.display()))?;
                roots
                    .add(cert)
                    .context("Certificate rejected by root store")?;
            }
            if roots.is_empty() {
                anyhow::bail!("No certificates found in {}", path.display());
            }
            tracing::debug!(path = %path.display(), roots = roots.len(), "Loaded root certificates");
            ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        }
        None => ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(rustls_platform_verifier::Verifier::new()))
            .with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

/// Connector for `https` targets.
#[derive(Clone)]
pub struct TlsConnector {
    config: Arc<ClientConfig>,
    connect_timeout: Duration,
}

impl TlsConnector {
    pub fn new(config: Arc<ClientConfig>, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
        }
    }
}

impl Connector for TlsConnector {
    type Session = TlsSession;

    async fn open(&mut self, host: &str, port: u16) -> Result<TlsSession, TransportError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        let stream = connect_tcp(host, port, self.connect_timeout).await?;

        let connector = tokio_rustls::TlsConnector::from(self.config.clone());
        let tls_stream = timeout(self.connect_timeout, connector.connect(server_name, stream))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Tls(e.to_string()))?;

        let (stream, conn) = tls_stream.into_inner();
        tracing::trace!(
            host,
            port,
            version = ?conn.protocol_version(),
            "TLS handshake complete"
        );
        Ok(TlsSession { stream, conn })
    }
}

/// Adapts the socket's non-blocking calls to `std::io` for rustls.
struct NonBlocking<'a>(&'a TcpStream);

impl Read for NonBlocking<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.try_read(buf)
    }
}

impl Write for NonBlocking<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.try_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Established TLS session.
pub struct TlsSession {
    stream: TcpStream,
    conn: ClientConnection,
}

impl TlsSession {
    /// Push pending TLS records to the socket.
    fn flush_records(&mut self) -> Result<(), TransportError> {
        while self.conn.wants_write() {
            self.conn.write_tls(&mut NonBlocking(&self.stream))?;
        }
        Ok(())
    }

    /// Like `flush_records`, but a full socket is not an error.
    fn flush_pending(&mut self) -> Result<(), TransportError> {
        match self.flush_records() {
            Err(TransportError::WouldBlock) => Ok(()),
            other => other,
        }
    }
}

impl Session for TlsSession {
    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.flush_records()?;
        let n = self.conn.writer().write(buf)?;
        if n == 0 && !buf.is_empty() {
            return Err(TransportError::WouldBlock);
        }
        self.flush_pending()?;
        Ok(n)
    }

    fn try_flush(&mut self) -> Result<(), TransportError> {
        self.flush_records()
    }

    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.flush_pending()?;
        loop {
            match self.conn.reader().read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                // Peer hung up without close_notify; treat like a clean close.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
                Err(e) => return Err(e.into()),
            }

            self.conn.read_tls(&mut NonBlocking(&self.stream))?;
            if let Err(e) = self.conn.process_new_packets() {
                // Best effort to get the alert out before failing.
                let _ = self.flush_records();
                return Err(e.into());
            }
        }
    }

    async fn ready(&mut self, interest: Interest) -> Result<(), TransportError> {
        self.stream.ready(tokio_interest(interest)).await?;
        Ok(())
    }

    async fn close(mut self) -> Result<(), TransportError> {
        self.conn.send_close_notify();
        self.flush_pending()
    }
}
