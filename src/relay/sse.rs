//! Incremental parser for server-sent completion streams.
//!
//! The endpoint delivers the reply as SSE-style lines. Only `data:` lines
//! matter: each carries exactly one JSON payload, and the literal
//! `data: [DONE]` marks the end of the stream. Blank lines, comments, and
//! any other field lines are ignored.
//!
//! # Wire format
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```
//!
//! # Examples
//!
//! ```
//! use banter::relay::sse::DataLineParser;
//!
//! let mut parser = DataLineParser::new();
//! let lines = parser.push(b"data: {\"x\":1}\n\ndata: [DONE]\n");
//! assert_eq!(lines.len(), 2);
//! assert_eq!(lines[0].payload, "{\"x\":1}");
//! assert!(lines[1].is_done());
//! ```

/// One `data:` line extracted from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLine {
    /// The payload after the `data:` prefix (leading space stripped).
    pub payload: String,
}

impl DataLine {
    /// Whether this line is the `[DONE]` terminal marker.
    pub fn is_done(&self) -> bool {
        self.payload.trim() == "[DONE]"
    }
}

/// Extract the payload from a single line, if it is a `data:` line.
///
/// A single leading space after the colon is stripped, per the SSE spec.
/// Every other line shape (blank lines, `event:`/`id:` fields, `:`
/// comments) yields `None`.
fn parse_line(line: &str) -> Option<DataLine> {
    let value = line.strip_prefix("data:")?;
    let payload = value.strip_prefix(' ').unwrap_or(value);
    Some(DataLine {
        payload: payload.to_string(),
    })
}

/// Incrementally parse stream bytes, yielding complete `data:` lines.
///
/// Chunk boundaries are arbitrary: a line may be split across any number
/// of chunks. Feed bytes via [`DataLineParser::push`] and call
/// [`DataLineParser::flush`] once the stream ends.
#[derive(Debug, Default)]
pub struct DataLineParser {
    line_buffer: String,
}

impl DataLineParser {
    /// Create a new incremental parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a chunk of bytes, returning any complete `data:` lines.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DataLine> {
        let text = String::from_utf8_lossy(chunk);
        let mut lines = Vec::new();

        for ch in text.chars() {
            if ch == '\n' {
                let line = std::mem::take(&mut self.line_buffer);
                // Handle \r\n by stripping the trailing \r.
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if let Some(data) = parse_line(line) {
                    lines.push(data);
                }
            } else {
                self.line_buffer.push(ch);
            }
        }

        lines
    }

    /// Flush a trailing unterminated line as a final `data:` line, if any.
    pub fn flush(&mut self) -> Option<DataLine> {
        if self.line_buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.line_buffer);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        parse_line(line)
    }
}
