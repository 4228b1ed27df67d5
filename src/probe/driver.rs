//! The attempt loop.
//!
//! Each attempt waits for connectivity, opens a fresh session, writes the
//! request, reads until the peer closes or fails, and hands the bytes after
//! the header boundary to the sink. The session is closed on every path and
//! the loop then cools down and starts over.

use std::time::Duration;

use bytes::BytesMut;
use tokio::time::timeout;

use crate::http::boundary::BoundaryScanner;
use crate::http::request::ProbeRequest;
use crate::probe::retry::{RetryPolicy, cooldown};
use crate::probe::sink::PayloadSink;
use crate::transport::{Connectivity, Connector, Interest, Session, TransportError};

/// Default read buffer size, in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 512;
/// Default cap on the collected payload, in bytes.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// A boundary was found and `bytes` of payload were delivered.
    Extracted { bytes: usize },
    /// The peer closed before any boundary was seen.
    ClosedWithoutPayload,
    /// No session could be established.
    ConnectFailed,
    /// Sending the request failed.
    WriteFailed,
    /// Reading the response failed before a payload was extracted.
    ReadFailed,
}

impl AttemptOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::ConnectFailed | AttemptOutcome::WriteFailed | AttemptOutcome::ReadFailed
        )
    }
}

/// Counters kept across attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeStats {
    /// Completed attempts, whatever their outcome.
    pub attempts: u64,
    /// Attempts that delivered a payload.
    pub extracted: u64,
    /// Attempts closed by the peer without a payload.
    pub empty: u64,
    /// Attempts that ended in a connect, write or read error.
    pub failures: u64,
    /// Extracted payloads cut short at `max_payload`.
    pub truncated: u64,
}

impl ProbeStats {
    fn record(&mut self, outcome: AttemptOutcome) {
        self.attempts += 1;
        if outcome.is_failure() {
            self.failures += 1;
        } else if outcome == AttemptOutcome::ClosedWithoutPayload {
            self.empty += 1;
        } else {
            self.extracted += 1;
        }
    }
}

/// Tunables for a [`Probe`].
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Capacity of the per-attempt read buffer
    pub buffer_capacity: usize,
    /// Bytes beyond this many are dropped from the payload
    pub max_payload: usize,
    /// Upper bound on any single readiness wait; `None` waits forever
    pub idle_timeout: Option<Duration>,
    /// Cooldown and attempt limit
    pub retry: RetryPolicy,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_payload: DEFAULT_MAX_PAYLOAD,
            idle_timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// One probe loop and all of its state.
///
/// Nothing here is shared, so independent probes can run side by side.
pub struct Probe<C, N, S> {
    connector: C,
    connectivity: N,
    sink: S,
    request: ProbeRequest,
    settings: ProbeSettings,
    scanner: BoundaryScanner,
    stats: ProbeStats,
}

impl<C, N, S> Probe<C, N, S>
where
    C: Connector,
    N: Connectivity,
    S: PayloadSink,
{
    pub fn new(
        connector: C,
        connectivity: N,
        sink: S,
        request: ProbeRequest,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            connector,
            connectivity,
            sink,
            request,
            settings,
            scanner: BoundaryScanner::new(),
            stats: ProbeStats::default(),
        }
    }

    pub fn stats(&self) -> ProbeStats {
        self.stats
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run attempts until the retry policy is exhausted.
    ///
    /// With the default policy this never returns.
    pub async fn run(&mut self) -> ProbeStats {
        loop {
            self.connectivity.wait().await;
            tracing::info!(host = self.request.host(), "Connectivity acquired");

            let outcome = self.attempt().await;
            self.stats.record(outcome);
            tracing::info!(
                completed = self.stats.attempts,
                outcome = ?outcome,
                "Completed requests"
            );

            if self.settings.retry.exhausted(self.stats.attempts) {
                tracing::info!(attempts = self.stats.attempts, "Attempt limit reached");
                return self.stats;
            }

            cooldown(self.settings.retry.delay(self.stats.attempts)).await;
        }
    }

    /// One connect, write, read and teardown cycle.
    pub async fn attempt(&mut self) -> AttemptOutcome {
        self.scanner.reset();

        let host = self.request.host().to_string();
        let port = self.request.port();
        let outcome = match self.connector.open(&host, port).await {
            Ok(mut session) => {
                tracing::info!(host = %host, port, "Connection established");
                let outcome = self.exchange(&mut session).await;
                if let Err(e) = session.close().await {
                    tracing::warn!(error = %e, "Error while closing session");
                }
                outcome
            }
            Err(e) => {
                tracing::error!(host = %host, port, error = %e, "Connection failed");
                AttemptOutcome::ConnectFailed
            }
        };

        self.sink.finish_attempt();
        outcome
    }

    async fn exchange(&mut self, session: &mut C::Session) -> AttemptOutcome {
        if let Err(e) = write_all(session, &self.request.bytes, self.settings.idle_timeout).await {
            tracing::error!(code = e.code(), error = %e, "Write failed");
            return AttemptOutcome::WriteFailed;
        }

        tracing::info!("Reading response...");
        self.read_response(session).await
    }

    /// Read until close or error, collecting the body once the boundary shows up.
    ///
    /// Bytes after the boundary, in its own chunk and in every later one, form
    /// the payload. Later chunks are not scanned again. The payload is handed
    /// to the sink exactly once, when reading stops.
    async fn read_response(&mut self, session: &mut C::Session) -> AttemptOutcome {
        let mut buf = BytesMut::zeroed(self.settings.buffer_capacity);
        let mut payload: Option<Payload> = None;

        let end = loop {
            let n = match session.try_read(&mut buf) {
                Ok(n) => n,
                Err(TransportError::WouldBlock) => {
                    match wait_ready(session, Interest::Read, self.settings.idle_timeout).await {
                        Ok(()) => continue,
                        Err(e) => break Err(e),
                    }
                }
                Err(e) => break Err(e),
            };

            if n == 0 {
                break Ok(());
            }

            tracing::debug!(bytes = n, "Bytes read");
            let chunk = &buf[..n];
            if let Some(body) = payload.as_mut() {
                body.append(chunk);
                continue;
            }

            if let Some(offset) = self.scanner.feed(chunk) {
                tracing::info!(offset, "Found header/body boundary");
                let mut body = Payload::new(self.settings.max_payload);
                body.append(&chunk[offset..]);
                payload = Some(body);
            }
        };

        match &end {
            Ok(()) => tracing::info!("Connection closed"),
            Err(e) => tracing::error!(code = e.code(), error = %e, "Read failed"),
        }

        match (payload, end) {
            (Some(payload), _) => {
                if payload.truncated {
                    self.stats.truncated += 1;
                }
                let body = payload.body.freeze();
                let bytes = body.len();
                self.sink.deliver(body);
                AttemptOutcome::Extracted { bytes }
            }
            (None, Ok(())) => AttemptOutcome::ClosedWithoutPayload,
            (None, Err(_)) => AttemptOutcome::ReadFailed,
        }
    }
}

/// Payload collected after the boundary, capped at `limit` bytes.
struct Payload {
    body: BytesMut,
    limit: usize,
    truncated: bool,
}

impl Payload {
    fn new(limit: usize) -> Self {
        Self {
            body: BytesMut::new(),
            limit,
            truncated: false,
        }
    }

    fn append(&mut self, data: &[u8]) {
        let room = self.limit.saturating_sub(self.body.len());
        if data.len() > room && !self.truncated {
            self.truncated = true;
            tracing::warn!(limit = self.limit, dropped = data.len() - room, "Payload truncated");
        }
        self.body.extend_from_slice(&data[..data.len().min(room)]);
    }
}

/// Write all of `request`, waiting out would-block results.
///
/// Returns the number of bytes written, always `request.len()` on success.
/// Bytes the session buffered are flushed before returning. Any error other
/// than would-block aborts immediately.
pub async fn write_all<S: Session>(
    session: &mut S,
    request: &[u8],
    idle_timeout: Option<Duration>,
) -> Result<usize, TransportError> {
    let mut written = 0;
    while written < request.len() {
        match session.try_write(&request[written..]) {
            Ok(0) | Err(TransportError::WouldBlock) => {
                wait_ready(session, Interest::Write, idle_timeout).await?;
            }
            Ok(n) => {
                tracing::info!(bytes = n, "Bytes written");
                written += n.min(request.len() - written);
            }
            Err(e) => return Err(e),
        }
    }

    loop {
        match session.try_flush() {
            Ok(()) => break,
            Err(TransportError::WouldBlock) => {
                wait_ready(session, Interest::Write, idle_timeout).await?;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

async fn wait_ready<S: Session>(
    session: &mut S,
    interest: Interest,
    idle_timeout: Option<Duration>,
) -> Result<(), TransportError> {
    match idle_timeout {
        Some(limit) => timeout(limit, session.ready(interest))
            .await
            .map_err(|_| TransportError::Timeout)?,
        None => session.ready(interest).await,
    }
}
