use std::io::Write;

use bytes::Bytes;

/// Receives the body bytes extracted from each successful attempt.
pub trait PayloadSink {
    /// Called at most once per attempt with the bytes following the boundary.
    fn deliver(&mut self, payload: Bytes);

    /// Called once at the end of every attempt, successful or not.
    fn finish_attempt(&mut self) {}
}

/// Prints payloads as text after removing delimiter strings.
///
/// Invalid UTF-8 is replaced rather than rejected. Each attempt ends with a
/// newline since the remote text usually has none.
pub struct TextSink<W: Write> {
    out: W,
    strip: Vec<String>,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W, strip: Vec<String>) -> Self {
        Self { out, strip }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Decode `payload` and drop every configured delimiter.
    pub fn clean(&self, payload: &[u8]) -> String {
        let mut text = String::from_utf8_lossy(payload).into_owned();
        for delimiter in self.strip.iter().filter(|d| !d.is_empty()) {
            text = text.replace(delimiter.as_str(), "");
        }
        text
    }
}

impl<W: Write> PayloadSink for TextSink<W> {
    fn deliver(&mut self, payload: Bytes) {
        let text = self.clean(&payload);
        if let Err(e) = self.out.write_all(text.as_bytes()) {
            tracing::error!(error = %e, "Failed to write payload");
        }
    }

    fn finish_attempt(&mut self) {
        if let Err(e) = self.out.write_all(b"\n").and_then(|_| self.out.flush()) {
            tracing::error!(error = %e, "Failed to flush output");
        }
    }
}
