//! Line framing for the controller's text protocol.
//!
//! The controller streams CRLF-terminated lines and, after echoing a command,
//! an interactive prompt (`>`) with no newline after it. [`LineDecoder`]
//! accumulates decoded text and hands out complete lines lazily; a partial
//! line stays buffered until the rest of it arrives.

use crate::encoding::{TextDecoder, TextEncoding};

/// Character the controller prints when it is ready for the next command.
pub const DEFAULT_PROMPT_MARKER: char = '>';

/// One framed unit of inbound text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A newline-terminated line, terminator removed.
    Terminated {
        text: String,
        /// Whether a `\r` preceded the newline (and was stripped).
        crlf: bool,
    },
    /// Buffer contents flushed because they ended with the prompt marker.
    Prompt(String),
}

impl Line {
    /// The line content without terminators.
    pub fn text(&self) -> &str {
        match self {
            Line::Terminated { text, .. } | Line::Prompt(text) => text,
        }
    }

    /// Reconstruct the text exactly as it arrived on the wire.
    pub fn to_wire(&self) -> String {
        match self {
            Line::Terminated { text, crlf: true } => format!("{text}\r\n"),
            Line::Terminated { text, crlf: false } => format!("{text}\n"),
            Line::Prompt(text) => text.clone(),
        }
    }

    /// Text as shown in a raw terminal view: terminated lines end in `\n`,
    /// prompts are shown as-is.
    pub fn display_text(&self) -> String {
        match self {
            Line::Terminated { text, .. } => format!("{text}\n"),
            Line::Prompt(text) => text.clone(),
        }
    }
}

/// Accumulates decoded text and splits it into [`Line`]s.
#[derive(Debug)]
pub struct LineDecoder {
    text: TextDecoder,
    buffer: String,
    prompt_marker: char,
}

impl LineDecoder {
    pub fn new(encoding: TextEncoding) -> Self {
        Self::with_prompt_marker(encoding, DEFAULT_PROMPT_MARKER)
    }

    pub fn with_prompt_marker(encoding: TextEncoding, prompt_marker: char) -> Self {
        Self {
            text: encoding.decoder(),
            buffer: String::new(),
            prompt_marker,
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.text.encoding()
    }

    /// Text received but not yet emitted as a line.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Drop buffered text and decoder state, switching to `encoding`.
    pub fn reset(&mut self, encoding: TextEncoding) {
        self.text = encoding.decoder();
        self.buffer.clear();
    }

    /// Feed one raw chunk and iterate the lines it completes.
    ///
    /// Lines are extracted as the iterator is advanced; whatever is not
    /// consumed before the iterator is dropped stays buffered for the next call.
    pub fn ingest(&mut self, chunk: &[u8]) -> Lines<'_> {
        self.text.decode_into(chunk, &mut self.buffer);
        Lines {
            decoder: self,
            prompt_checked: false,
        }
    }

    fn next_terminated(&mut self) -> Option<Line> {
        let newline = memchr::memchr(b'\n', self.buffer.as_bytes())?;
        let mut text: String = self.buffer.drain(..=newline).collect();
        text.pop();
        let crlf = text.ends_with('\r');
        if crlf {
            text.pop();
        }
        Some(Line::Terminated { text, crlf })
    }

    fn take_prompt(&mut self) -> Option<Line> {
        if self.buffer.ends_with(self.prompt_marker) {
            Some(Line::Prompt(std::mem::take(&mut self.buffer)))
        } else {
            None
        }
    }
}

/// Lazy iterator over the lines completed by one [`LineDecoder::ingest`] call.
pub struct Lines<'a> {
    decoder: &'a mut LineDecoder,
    prompt_checked: bool,
}

impl Iterator for Lines<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        if let Some(line) = self.decoder.next_terminated() {
            return Some(line);
        }
        if self.prompt_checked {
            return None;
        }
        self.prompt_checked = true;
        self.decoder.take_prompt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn terminated(text: &str) -> Line {
        Line::Terminated {
            text: text.to_string(),
            crlf: true,
        }
    }

    #[test]
    fn test_splits_crlf_lines() {
        let mut decoder = LineDecoder::new(TextEncoding::Utf8);
        let lines: Vec<Line> = decoder
            .ingest(b"HIPUMP 1 ILD: 3.21\r\nHIPUMP 1 TMP: 24.8\r\n")
            .collect();
        assert_eq!(
            lines,
            vec![terminated("HIPUMP 1 ILD: 3.21"), terminated("HIPUMP 1 TMP: 24.8")]
        );
        assert_eq!(decoder.pending(), "");
    }

    #[test]
    fn test_partial_line_is_retained() {
        let mut decoder = LineDecoder::new(TextEncoding::Utf8);
        assert_eq!(decoder.ingest(b"PUMP 3 TM").count(), 0);
        assert_eq!(decoder.pending(), "PUMP 3 TM");

        let lines: Vec<Line> = decoder.ingest(b"P: 25.0\r\nPUMP").collect();
        assert_eq!(lines, vec![terminated("PUMP 3 TMP: 25.0")]);
        assert_eq!(decoder.pending(), "PUMP");
    }

    #[test]
    fn test_bare_newline_and_single_cr_strip() {
        let mut decoder = LineDecoder::new(TextEncoding::Utf8);
        let lines: Vec<Line> = decoder.ingest(b"a\nb\r\r\n").collect();
        assert_eq!(
            lines,
            vec![
                Line::Terminated {
                    text: "a".into(),
                    crlf: false
                },
                Line::Terminated {
                    text: "b\r".into(),
                    crlf: true
                },
            ]
        );
    }

    #[test]
    fn test_prompt_flushes_remainder() {
        let mut decoder = LineDecoder::new(TextEncoding::Utf8);
        let lines: Vec<Line> = decoder.ingest(b"hipump 1 isp 3.0\r\nOK\r\n>").collect();
        assert_eq!(
            lines,
            vec![
                terminated("hipump 1 isp 3.0"),
                terminated("OK"),
                Line::Prompt(">".into())
            ]
        );
        assert_eq!(decoder.pending(), "");
    }

    #[test]
    fn test_prompt_marker_only_counts_at_end() {
        let mut decoder = LineDecoder::new(TextEncoding::Utf8);
        assert_eq!(decoder.ingest(b"a>b").count(), 0);
        assert_eq!(decoder.pending(), "a>b");
    }

    #[test]
    fn test_dropped_iterator_keeps_lines_buffered() {
        let mut decoder = LineDecoder::new(TextEncoding::Utf8);
        let first = decoder.ingest(b"one\r\ntwo\r\n").next();
        assert_eq!(first, Some(terminated("one")));
        assert_eq!(decoder.pending(), "two\r\n");

        let rest: Vec<Line> = decoder.ingest(b"").collect();
        assert_eq!(rest, vec![terminated("two")]);
    }

    #[test]
    fn test_custom_prompt_marker() {
        let mut decoder = LineDecoder::with_prompt_marker(TextEncoding::Ascii, '#');
        let lines: Vec<Line> = decoder.ingest(b"ready#").collect();
        assert_eq!(lines, vec![Line::Prompt("ready#".into())]);
    }

    #[test]
    fn test_wire_reconstruction() {
        let line = terminated("x");
        assert_eq!(line.to_wire(), "x\r\n");
        assert_eq!(line.display_text(), "x\n");
        assert_eq!(Line::Prompt("> ".into()).text(), "> ");
    }

    #[test]
    fn test_reset_discards_state() {
        let mut decoder = LineDecoder::new(TextEncoding::Utf8);
        decoder.ingest(b"partial").for_each(drop);
        decoder.reset(TextEncoding::Gbk);
        assert_eq!(decoder.pending(), "");
        assert_eq!(decoder.encoding(), TextEncoding::Gbk);
    }
}
