//! Secure byte-stream transport used by the probe.
//!
//! A [`Connector`] opens one [`Session`] per attempt. Sessions are
//! non-blocking: `try_write` and `try_read` return
//! [`TransportError::WouldBlock`] instead of parking the task, and the caller
//! waits for readiness with [`Session::ready`] before retrying.

#![allow(async_fn_in_trait)]

pub mod connectivity;
pub mod tcp;
pub mod tls;

pub use connectivity::{Connectivity, ResolveConnectivity, WatchConnectivity};
pub use tcp::{TcpConnector, TcpSession};
pub use tls::{TlsConnector, TlsSession};

use std::fmt;
use std::io;

/// Direction a session is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write,
}

/// Errors produced by a transport session.
#[derive(Debug)]
pub enum TransportError {
    /// The operation cannot make progress yet; retry after readiness.
    WouldBlock,
    /// Establishing the connection took too long.
    Timeout,
    /// Operating system I/O failure, with the native error code if known.
    Io { kind: io::ErrorKind, code: Option<i32> },
    /// TLS handshake or record failure.
    Tls(String),
}

impl TransportError {
    pub fn is_would_block(&self) -> bool {
        matches!(self, TransportError::WouldBlock)
    }

    /// Native error code for logging, `-1` when none is available.
    pub fn code(&self) -> i32 {
        match self {
            TransportError::Io { code: Some(code), .. } => *code,
            _ => -1,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::WouldBlock => write!(f, "operation would block"),
            TransportError::Timeout => write!(f, "timed out"),
            TransportError::Io { kind, code: Some(code) } => {
                write!(f, "i/o error {kind} (os error {code})")
            }
            TransportError::Io { kind, code: None } => write!(f, "i/o error {kind}"),
            TransportError::Tls(msg) => write!(f, "tls error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => TransportError::WouldBlock,
            kind => TransportError::Io {
                kind,
                code: err.raw_os_error(),
            },
        }
    }
}

impl From<rustls::Error> for TransportError {
    fn from(err: rustls::Error) -> Self {
        TransportError::Tls(err.to_string())
    }
}

/// One established connection, exclusively owned by a single attempt.
pub trait Session {
    /// Write some of `buf`, returning how many bytes the transport accepted.
    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    /// Push out anything accepted by `try_write` but still held back.
    ///
    /// Returns [`TransportError::WouldBlock`] while data remains queued.
    /// Transports that write straight to the socket have nothing to flush.
    fn try_flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Read into `buf`. `Ok(0)` means the peer closed the stream cleanly.
    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Wait until the session may be able to make progress in `interest`.
    async fn ready(&mut self, interest: Interest) -> Result<(), TransportError>;

    /// Release the connection.
    async fn close(self) -> Result<(), TransportError>;
}

/// Opens sessions to the probe target.
pub trait Connector {
    type Session: Session;

    /// Establish a new session to `host:port`.
    async fn open(&mut self, host: &str, port: u16) -> Result<Self::Session, TransportError>;
}
