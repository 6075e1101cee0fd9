// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Line framing for streamed upstream bodies (SSE and NDJSON).
//
// Network chunks may split a line, or a multi-byte character, anywhere.
// Bytes are buffered until a '\n' arrives, so a line is only decoded once it
// is complete.

use thiserror::Error;

/// Longest unterminated line accepted from an upstream
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stream line exceeds {max} bytes without a terminator")]
pub struct LineTooLong {
    pub max: usize,
}

#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
        }
    }

    /// Append a chunk. Fails once the unterminated tail outgrows the cap.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), LineTooLong> {
        self.pending.extend_from_slice(bytes);

        let tail_start = self
            .pending
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |end| end + 1);
        if self.pending.len() - tail_start > self.max_line {
            return Err(LineTooLong { max: self.max_line });
        }
        Ok(())
    }

    /// Next complete line, without its terminator ("\n" or "\r\n")
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whatever is left once the body has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
        Some(line)
    }
}

/// Payload of an SSE `data:` field, or `None` for any other line
pub fn sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut buffer = LineBuffer::default();
        buffer.push(b"data: {\"a\"").unwrap();
        assert_eq!(buffer.next_line(), None);

        buffer.push(b":1}\r\n\ndata: [DO").unwrap();
        assert_eq!(buffer.next_line().as_deref(), Some("data: {\"a\":1}"));
        assert_eq!(buffer.next_line().as_deref(), Some(""));
        assert_eq!(buffer.next_line(), None);

        buffer.push(b"NE]").unwrap();
        assert_eq!(buffer.finish().as_deref(), Some("data: [DONE]"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let bytes = "{\"content\":\"日本\"}\n".as_bytes();
        let mut buffer = LineBuffer::default();
        buffer.push(&bytes[..14]).unwrap();
        assert_eq!(buffer.next_line(), None);
        buffer.push(&bytes[14..]).unwrap();
        assert_eq!(buffer.next_line().as_deref(), Some("{\"content\":\"日本\"}"));
    }

    #[test]
    fn test_sse_data() {
        assert_eq!(sse_data("data: {}"), Some("{}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data(": keep-alive"), None);
        assert_eq!(sse_data("event: message"), None);
    }

    #[test]
    fn test_unterminated_line_is_capped() {
        let mut buffer = LineBuffer::with_max_line(8);
        buffer.push(b"data: 1\n12345").unwrap();
        assert_eq!(buffer.next_line().as_deref(), Some("data: 1"));

        buffer.push(b"678").unwrap();
        assert_eq!(buffer.push(b"9"), Err(LineTooLong { max: 8 }));
    }
}
