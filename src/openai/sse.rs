//! Decoding of the OpenAI flavored server-sent event stream.
//!
//! Upstream bodies arrive in chunks that have nothing to do with
//! event boundaries. `LineDecoder` turns those chunks into complete
//! lines and `interpret_line` turns a line into at most one
//! `SseEvent`.

use serde::Deserialize;

const DATA_MARKER: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Splits a chunked byte stream into lines.
///
/// The carry-over between chunks is kept as raw bytes and lines are
/// split on `\n` before decoding. A `\n` byte can never be part of a
/// multi-byte UTF-8 sequence, so a character split across two chunks
/// is decoded only once both halves have arrived.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order,
    /// without the terminator (`\n` or `\r\n`).
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            let line = &self.buf[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            lines.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
        }
        self.buf.drain(..start);

        lines
    }

    /// End of stream. An unterminated trailing fragment can't be
    /// trusted to be a complete frame so it is dropped rather than
    /// emitted. Returns the number of bytes that were discarded.
    pub fn finish(self) -> usize {
        let discarded = self.buf.len();
        if discarded > 0 {
            tracing::debug!(
                "Discarding {} bytes of unterminated data at end of stream",
                discarded
            );
        }
        discarded
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Incremental assistant text
    Delta(String),
    /// The upstream sent its terminal sentinel
    Done,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
}

/// Interpret a single line of the upstream stream.
///
/// Anything that isn't a `data:` line is ignored, as are chunks
/// without content (role announcements, finish reasons, usage). A
/// payload that fails to parse is logged and skipped so one corrupt
/// event doesn't take down the rest of the response.
pub fn interpret_line(line: &str) -> Option<SseEvent> {
    let data = line.trim().strip_prefix(DATA_MARKER)?.trim();

    if data == DONE_SENTINEL {
        return Some(SseEvent::Done);
    }

    // Data can sometimes be empty
    if data.is_empty() {
        return None;
    }

    let chunk = match serde_json::from_str::<CompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!("Skipping malformed completion chunk {}: {}", data, e);
            return None;
        }
    };

    let content = chunk.choices.into_iter().next()?.delta?.content?;
    if content.is_empty() {
        return None;
    }

    Some(SseEvent::Delta(content))
}
