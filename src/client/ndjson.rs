//! Incremental NDJSON line decoder.
//!
//! HTTP chunk boundaries fall anywhere, including mid-line and mid-codepoint,
//! so the decoder buffers raw bytes and only emits complete lines. UTF-8
//! conversion happens per complete line; a `\n` byte never occurs inside a
//! multi-byte UTF-8 sequence, so splitting at newlines is always safe.

/// Splits a stream of byte chunks into complete lines, retaining the
/// trailing partial line between feeds.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of bytes, returning every line completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
        }
        self.buffer.drain(..start);

        lines
    }

    /// Flush whatever remains in the buffer as one final line.
    /// Call when the stream ends; returns None if nothing is buffered.
    pub fn finish(mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(decode_line(&std::mem::take(&mut self.buffer)))
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    // Tolerate CRLF framing
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
