//! Incremental header/body boundary detection.
//!
//! The scanner looks for the first `\r\n\r\n` in a byte stream that arrives in
//! arbitrarily sized chunks. Its state lives outside any single buffer, so a
//! boundary split across two reads is still found in the chunk where it
//! completes.

/// Progress through the `\r\n\r\n` boundary.
///
/// ```text
///   AwaitCr1 ──\r──▶ AwaitLf1 ──\n──▶ AwaitCr2 ──\r──▶ AwaitLf2 ──\n──▶ Found
///      ▲                 │                │                │
///      └──── other ──────┴────────────────┴────────────────┘
///   (a mismatching `\r` goes to AwaitLf1 instead)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Nothing matched yet.
    #[default]
    AwaitCr1,
    /// Matched `\r`.
    AwaitLf1,
    /// Matched `\r\n`.
    AwaitCr2,
    /// Matched `\r\n\r`.
    AwaitLf2,
    /// Matched the full boundary.
    Found,
}

impl ScanState {
    /// Number of boundary bytes matched contiguously so far.
    pub fn matched(&self) -> usize {
        match self {
            ScanState::AwaitCr1 => 0,
            ScanState::AwaitLf1 => 1,
            ScanState::AwaitCr2 => 2,
            ScanState::AwaitLf2 => 3,
            ScanState::Found => 4,
        }
    }

    /// Advance by one input byte.
    pub fn step(self, byte: u8) -> ScanState {
        match (self, byte) {
            (ScanState::AwaitLf1, b'\n') => ScanState::AwaitCr2,
            (ScanState::AwaitCr2, b'\r') => ScanState::AwaitLf2,
            (ScanState::AwaitLf2, b'\n') => ScanState::Found,
            // A stray `\r` is itself the start of a new boundary.
            (_, b'\r') => ScanState::AwaitLf1,
            _ => ScanState::AwaitCr1,
        }
    }
}

/// Stateful boundary scanner shared across the reads of one connection.
#[derive(Debug, Default)]
pub struct BoundaryScanner {
    state: ScanState,
}

impl BoundaryScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Back to `AwaitCr1`; called at the start of every connection attempt.
    pub fn reset(&mut self) {
        self.state = ScanState::AwaitCr1;
    }

    /// Scan `chunk` byte by byte.
    ///
    /// Returns the index within `chunk` of the first byte after the boundary
    /// when the boundary completes in this chunk. The scanner is reset right
    /// after a match, so the next boundary fed to it is detected afresh.
    /// Without a match the partial progress is kept for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<usize> {
        for (i, &byte) in chunk.iter().enumerate() {
            self.state = self.state.step(byte);
            if self.state == ScanState::Found {
                self.reset();
                return Some(i + 1);
            }
        }
        None
    }
}
