//! Line-oriented `data:` frame parser for the workspace subscription.
//!
//! The upstream sends one frame per line (`data: {json}\n`) without the
//! blank-line separators of full SSE, so every `data:` line is dispatched on
//! its own. Other lines (comments, `event:` fields, blanks) are skipped.

use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::ByteStream;
use crate::error::Result;

const DATA_MARKER: &str = "data:";

/// Longest line kept in memory; longer lines are dropped up to their newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Turn a raw byte stream into the payloads of its `data:` lines.
///
/// Partial lines are buffered across chunks; a final line without a trailing
/// newline is still dispatched when the stream ends. A transport error is
/// yielded once and ends the stream.
pub fn parse_data_lines(bytes: ByteStream) -> impl Stream<Item = Result<String>> + Send {
    futures::stream::unfold(
        LineState {
            bytes,
            buffer: Vec::new(),
            scanned: 0,
            discarding: false,
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(line) = state.next_line() {
                    if let Some(data) = data_payload(&line) {
                        return Some((Ok(data), state));
                    }
                    continue;
                }

                if state.done {
                    if state.buffer.is_empty() || state.discarding {
                        return None;
                    }
                    let line = std::mem::take(&mut state.buffer);
                    return data_payload(&line).map(|data| (Ok(data), state));
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        state.done = true;
                        state.buffer.clear();
                        return Some((Err(e), state));
                    }
                    None => state.done = true,
                }
            }
        },
    )
}

fn data_payload(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);
    text.strip_prefix(DATA_MARKER)
        .map(|value| value.trim_start().to_string())
}

struct LineState {
    bytes: ByteStream,
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    /// Inside an oversized line; everything up to the next newline is dropped.
    discarding: bool,
    done: bool,
}

impl LineState {
    /// Next complete line, skipping the tail of an oversized one.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > MAX_LINE_BYTES {
                    if !self.discarding {
                        warn!(limit = MAX_LINE_BYTES, "Dropping oversized subscription line");
                    }
                    self.discarding = true;
                    self.buffer.clear();
                    self.scanned = 0;
                }
                return None;
            };

            let line: Vec<u8> = self.buffer.drain(..=self.scanned + offset).collect();
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            return Some(line);
        }
    }
}
