use std::time::Duration;

use tokio::io::Interest as TokioInterest;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{Connector, Interest, Session, TransportError};

pub(crate) fn tokio_interest(interest: Interest) -> TokioInterest {
    match interest {
        Interest::Read => TokioInterest::READABLE,
        Interest::Write => TokioInterest::WRITABLE,
    }
}

/// Connect to `host:port` within `connect_timeout`.
pub(crate) async fn connect_tcp(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, TransportError> {
    let addr = format!("{}:{}", host, port);
    let stream = timeout(connect_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| TransportError::Timeout)??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Plain-text connector for `http` targets.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for TcpConnector {
    type Session = TcpSession;

    async fn open(&mut self, host: &str, port: u16) -> Result<TcpSession, TransportError> {
        let stream = connect_tcp(host, port, self.connect_timeout).await?;
        tracing::trace!(host, port, "TCP connected");
        Ok(TcpSession { stream })
    }
}

/// Session over an unencrypted TCP stream.
#[derive(Debug)]
pub struct TcpSession {
    stream: TcpStream,
}

impl Session for TcpSession {
    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        Ok(self.stream.try_write(buf)?)
    }

    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.stream.try_read(buf)?)
    }

    async fn ready(&mut self, interest: Interest) -> Result<(), TransportError> {
        self.stream.ready(tokio_interest(interest)).await?;
        Ok(())
    }

    async fn close(self) -> Result<(), TransportError> {
        drop(self.stream);
        Ok(())
    }
}
