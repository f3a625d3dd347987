//! Byte-level Server-Sent-Events framing.
//!
//! Frames are delimited by a blank line (`\n\n` or `\r\n\r\n`). Only `data:`
//! lines carry payload; `event:` is kept for diagnostics and every other line
//! (`id:`, `retry:`, comments) is ignored.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental frame decoder. Holds only the undelimited tail of the input.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Offset up to which `buf` is known to hold no delimiter.
    scanned: usize,
}

impl SseDecoder {
    /// Appends a chunk and returns every frame it completed.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut consumed = 0;
        let mut from = self.scanned;
        while let Some((end, delim_len)) = next_delimiter(&self.buf, from) {
            frames.extend(parse_frame(&self.buf[consumed..end]));
            consumed = end + delim_len;
            from = consumed;
        }
        self.buf.drain(..consumed);
        // A delimiter may straddle the next chunk boundary.
        self.scanned = self.buf.len().saturating_sub(3);
        frames
    }

    /// Flushes the undelimited tail as a final frame once the input has ended.
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.scanned = 0;
        parse_frame(&std::mem::take(&mut self.buf))
    }

    /// Bytes buffered but not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

/// Finds the first blank line at or after `from`: returns the frame end and
/// the delimiter length (`\n\n` or `\r\n\r\n`).
fn next_delimiter(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if buf.get(i + 1) == Some(&b'\n') {
                return Some((i, 2));
            }
            if i > 0 && buf[i - 1] == b'\r' && buf.get(i + 1..i + 3) == Some(&b"\r\n"[..]) {
                return Some((i - 1, 4));
            }
        }
        i += 1;
    }
    None
}

fn parse_frame(bytes: &[u8]) -> Option<SseFrame> {
    let text = String::from_utf8_lossy(bytes);
    let mut event = None;
    let mut data: Option<String> = None;
    for line in text.lines() {
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "data" => match data.as_mut() {
                Some(joined) => {
                    joined.push('\n');
                    joined.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            "event" => event = Some(value.to_string()),
            // comments (empty field), `id`, `retry` and unknown fields
            _ => {}
        }
    }
    data.map(|data| SseFrame { event, data })
}
