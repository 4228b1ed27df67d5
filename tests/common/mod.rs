//! Scripted transport doubles shared by the integration tests.

#![allow(dead_code, async_fn_in_trait)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use hitprobe::probe::PayloadSink;
use hitprobe::transport::{Connectivity, Connector, Interest, Session, TransportError};

/// One scripted result for a `try_write` call.
#[derive(Debug, Clone)]
pub enum WriteStep {
    Accept(usize),
    WouldBlock,
    Fail(i32),
}

/// One scripted result for a `try_read` call.
#[derive(Debug, Clone)]
pub enum ReadStep {
    Data(&'static [u8]),
    WouldBlock,
    Fail(i32),
}

fn os_error(code: i32) -> TransportError {
    TransportError::Io {
        kind: std::io::ErrorKind::Other,
        code: Some(code),
    }
}

/// Everything a mock session observed.
#[derive(Debug, Default)]
pub struct Journal {
    pub written: Vec<u8>,
    pub write_calls: usize,
    pub read_calls: usize,
    pub ready_calls: usize,
    pub flush_calls: usize,
    pub opened: usize,
    pub closed: usize,
}

pub type SharedJournal = Arc<Mutex<Journal>>;

/// A session that plays back scripted writes and reads.
///
/// Writes fall back to accepting everything once the script runs out; reads
/// fall back to a clean close and flushes to success.
pub struct MockSession {
    writes: VecDeque<WriteStep>,
    reads: VecDeque<ReadStep>,
    flushes: VecDeque<WriteStep>,
    journal: SharedJournal,
}

impl MockSession {
    pub fn new(writes: Vec<WriteStep>, reads: Vec<ReadStep>, journal: SharedJournal) -> Self {
        Self {
            writes: writes.into(),
            reads: reads.into(),
            flushes: VecDeque::new(),
            journal,
        }
    }

    /// Script `try_flush` results; `Accept` means everything went out.
    pub fn with_flushes(mut self, flushes: Vec<WriteStep>) -> Self {
        self.flushes = flushes.into();
        self
    }
}

impl Session for MockSession {
    fn try_write(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        let mut journal = self.journal.lock().unwrap();
        journal.write_calls += 1;
        match self.writes.pop_front() {
            Some(WriteStep::Accept(max)) => {
                let n = max.min(buf.len());
                journal.written.extend_from_slice(&buf[..n]);
                Ok(n)
            }
            Some(WriteStep::WouldBlock) => Err(TransportError::WouldBlock),
            Some(WriteStep::Fail(code)) => Err(os_error(code)),
            None => {
                journal.written.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn try_flush(&mut self) -> Result<(), TransportError> {
        self.journal.lock().unwrap().flush_calls += 1;
        match self.flushes.pop_front() {
            Some(WriteStep::WouldBlock) => Err(TransportError::WouldBlock),
            Some(WriteStep::Fail(code)) => Err(os_error(code)),
            Some(WriteStep::Accept(_)) | None => Ok(()),
        }
    }

    fn try_read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.journal.lock().unwrap().read_calls += 1;
        match self.reads.pop_front() {
            Some(ReadStep::Data(data)) => {
                assert!(data.len() <= buf.len(), "scripted chunk larger than buffer");
                buf[..data.len()].copy_from_slice(data);
                Ok(data.len())
            }
            Some(ReadStep::WouldBlock) => Err(TransportError::WouldBlock),
            Some(ReadStep::Fail(code)) => Err(os_error(code)),
            None => Ok(0),
        }
    }

    async fn ready(&mut self, _interest: Interest) -> Result<(), TransportError> {
        self.journal.lock().unwrap().ready_calls += 1;
        Ok(())
    }

    async fn close(self) -> Result<(), TransportError> {
        self.journal.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Script for one attempt: either a refused connection or a session.
pub enum Script {
    Refuse,
    Session(Vec<WriteStep>, Vec<ReadStep>),
}

/// Hands out one scripted session per `open` call.
pub struct MockConnector {
    scripts: VecDeque<Script>,
    pub journal: SharedJournal,
}

impl MockConnector {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: scripts.into(),
            journal: SharedJournal::default(),
        }
    }
}

impl Connector for MockConnector {
    type Session = MockSession;

    async fn open(&mut self, _host: &str, _port: u16) -> Result<MockSession, TransportError> {
        match self.scripts.pop_front() {
            Some(Script::Session(writes, reads)) => {
                self.journal.lock().unwrap().opened += 1;
                Ok(MockSession::new(writes, reads, self.journal.clone()))
            }
            Some(Script::Refuse) | None => Err(os_error(111)),
        }
    }
}

/// Always connected.
pub struct Online;

impl Connectivity for Online {
    async fn wait(&mut self) {}
}

/// Collects every delivered payload.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub payloads: Vec<Bytes>,
    pub finished: usize,
}

impl PayloadSink for CollectSink {
    fn deliver(&mut self, payload: Bytes) {
        self.payloads.push(payload);
    }

    fn finish_attempt(&mut self) {
        self.finished += 1;
    }
}
