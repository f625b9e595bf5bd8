//! Incremental `text/event-stream` decoder.
//!
//! Network chunks arrive at arbitrary boundaries, so bytes are buffered until a
//! full line is available. Only the `data` field matters to this client;
//! `event`, `id` and `retry` are read and dropped.

use thiserror::Error;

/// Longest line accepted by [`SseDecoder::new`]. A snapshot carries the whole
/// answer plus every source, so this is generous.
pub const DEFAULT_MAX_LINE: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event stream line exceeds {limit} bytes")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Accumulates raw bytes and yields the `data` payload of every completed
/// event, in order.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    max_line: usize,
    data_lines: Vec<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            data_lines: Vec::new(),
        }
    }

    /// Feed one chunk; returns the payloads of events completed by it.
    ///
    /// Fails once an unterminated line grows past the configured limit. The
    /// decoder should be dropped after that.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, LineTooLong> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let line_end = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            self.scanned = 0;
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(payload) = self.process_line(line) {
                out.push(payload);
            }
        }
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line {
            return Err(LineTooLong {
                limit: self.max_line,
            });
        }
        Ok(out)
    }

    /// Flush at end of stream. A final event without the trailing blank line
    /// is still delivered.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.scanned = 0;
            let line = String::from_utf8_lossy(&rest).into_owned();
            let line = line.strip_suffix('\r').unwrap_or(&line).to_string();
            if let Some(payload) = self.process_line(&line) {
                return Some(payload);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        if field == "data" {
            self.data_lines.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let payload = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(d: &mut SseDecoder, chunk: &[u8]) -> Vec<String> {
        d.push(chunk).unwrap()
    }

    #[test]
    fn test_single_event() {
        let mut d = SseDecoder::new();
        assert_eq!(push(&mut d, b"data: {\"a\":1}\n\n"), vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_data_without_space() {
        let mut d = SseDecoder::new();
        assert_eq!(push(&mut d, b"data:{\"status\":\"PENDING\"}\n\n"), vec![
            "{\"status\":\"PENDING\"}"
        ]);
    }

    #[test]
    fn test_split_across_chunks() {
        let mut d = SseDecoder::new();
        assert!(push(&mut d, b"da").is_empty());
        assert!(push(&mut d, b"ta: hel").is_empty());
        assert!(push(&mut d, b"lo\n").is_empty());
        assert_eq!(push(&mut d, b"\n"), vec!["hello"]);
    }

    #[test]
    fn test_multiple_events_one_chunk() {
        let mut d = SseDecoder::new();
        let out = push(&mut d, b"data: one\n\ndata: two\n\n");
        assert_eq!(out, vec!["one", "two"]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut d = SseDecoder::new();
        assert_eq!(push(&mut d, b"data: a\ndata: b\n\n"), vec!["a\nb"]);
    }

    #[test]
    fn test_crlf_lines() {
        let mut d = SseDecoder::new();
        assert_eq!(push(&mut d, b"data: x\r\n\r\n"), vec!["x"]);
    }

    #[test]
    fn test_comments_and_other_fields_ignored() {
        let mut d = SseDecoder::new();
        let out = push(&mut d, b": keep-alive\nevent: update\nid: 7\nretry: 1000\ndata: y\n\n");
        assert_eq!(out, vec!["y"]);
    }

    #[test]
    fn test_blank_lines_without_data_yield_nothing() {
        let mut d = SseDecoder::new();
        assert!(push(&mut d, b"\n\n\n").is_empty());
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let mut d = SseDecoder::new();
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let split = bytes.len() - 3;
        assert!(push(&mut d, &bytes[..split]).is_empty());
        assert_eq!(push(&mut d, &bytes[split..]), vec!["caf\u{e9}"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut d = SseDecoder::new();
        assert!(push(&mut d, b"data: tail").is_empty());
        assert_eq!(d.finish().as_deref(), Some("tail"));
        assert!(d.finish().is_none());
    }

    #[test]
    fn test_long_line_over_many_chunks() {
        let mut d = SseDecoder::new();
        let body = "x".repeat(10_000);
        let frame = format!("data: {body}\n\n");
        let mut out = Vec::new();
        for piece in frame.as_bytes().chunks(7) {
            out.extend(push(&mut d, piece));
        }
        assert_eq!(out, vec![body]);
    }

    #[test]
    fn test_line_over_limit_is_error() {
        let mut d = SseDecoder::with_max_line(16);
        assert!(d.push(b"data: 0123456").unwrap().is_empty());
        assert_eq!(d.push(b"789abcdef"), Err(LineTooLong { limit: 16 }));
    }

    #[test]
    fn test_limit_applies_per_line() {
        let mut d = SseDecoder::with_max_line(16);
        let out = push(&mut d, b"data: 0123456789\n\ndata: abcdefghij\n\n");
        assert_eq!(out, vec!["0123456789", "abcdefghij"]);
    }
}
