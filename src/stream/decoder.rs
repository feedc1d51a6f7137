//! Incremental decoder for the line-framed chat stream.
//!
//! The response body is a sequence of event records, one per line, each
//! prefixed by the `data: ` marker and followed by a JSON payload. The
//! decoder accepts arbitrary chunk boundaries: a partial trailing line is
//! buffered and completed by the next chunk, so splitting the same bytes
//! differently always yields the same event sequence.
//!
//! Malformed payloads are skipped with a warning rather than terminating
//! the decode; a single bad line must never lose the rest of the stream.
//!
//! # Examples
//!
//! ```
//! use sona::stream::decoder::ChunkDecoder;
//! use sona::stream::event::DecodedEvent;
//!
//! let mut decoder = ChunkDecoder::new();
//! let events = decoder.push(b"data: {\"type\":\"text-delta\",\"delta\":\"Hi\"}\n");
//! assert_eq!(events.len(), 1);
//! assert!(matches!(events[0], DecodedEvent::Event(_)));
//! ```

use tracing::warn;

use super::event::{DecodedEvent, StreamEvent};

/// Line marker prefixing every event record.
const RECORD_MARKER: &str = "data: ";

/// End-of-stream sentinel payload.
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental line decoder for the chat stream protocol.
///
/// Feed chunks of bytes via [`push`](Self::push) and collect emitted
/// events; call [`finish`](Self::finish) at natural stream end to flush a
/// trailing unterminated line. After the `[DONE]` sentinel the decoder
/// ignores all further input.
///
/// The buffer holds raw bytes and lines are converted to text only once
/// complete, so a multi-byte character split across a chunk boundary
/// stays intact.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    line_buffer: Vec<u8>,
    done: bool,
}

impl ChunkDecoder {
    /// Create a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Push a chunk of bytes into the decoder.
    ///
    /// Returns the events completed by this chunk, in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedEvent> {
        if self.done {
            return Vec::new();
        }

        let mut events = Vec::new();

        for &byte in chunk {
            if byte == b'\n' {
                let line_bytes = std::mem::take(&mut self.line_buffer);
                let line = String::from_utf8_lossy(&line_bytes);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if let Some(event) = self.decode_line(line) {
                    events.push(event);
                }
                if self.done {
                    break;
                }
            } else {
                self.line_buffer.push(byte);
            }
        }

        events
    }

    /// Flush any buffered trailing line at natural stream end.
    ///
    /// Returns the event from the unterminated final line, if any.
    pub fn finish(&mut self) -> Option<DecodedEvent> {
        if self.done || self.line_buffer.is_empty() {
            return None;
        }
        let line_bytes = std::mem::take(&mut self.line_buffer);
        let line = String::from_utf8_lossy(&line_bytes);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        self.decode_line(line)
    }

    /// Decode one complete line.
    ///
    /// Lines without the record marker (keep-alives, blanks) are ignored.
    /// Malformed payloads are skipped with a warning.
    fn decode_line(&mut self, line: &str) -> Option<DecodedEvent> {
        let payload = line.strip_prefix(RECORD_MARKER)?;

        if payload.trim() == DONE_SENTINEL {
            self.done = true;
            return Some(DecodedEvent::Done);
        }

        match serde_json::from_str::<StreamEvent>(payload) {
            Ok(event) => Some(DecodedEvent::Event(event)),
            Err(e) => {
                warn!("skipping malformed event line: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_line(text: &str) -> String {
        format!("data: {{\"type\":\"text-delta\",\"delta\":\"{text}\"}}\n")
    }

    fn collect_deltas(events: &[DecodedEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                DecodedEvent::Event(StreamEvent::TextDelta { delta }) => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }

    // ── Single-chunk decoding ─────────────────────────────────

    #[test]
    fn single_complete_line() {
        let mut decoder = ChunkDecoder::new();
        let events = decoder.push(delta_line("Hello").as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(collect_deltas(&events), "Hello");
    }

    #[test]
    fn multiple_lines_one_chunk() {
        let mut decoder = ChunkDecoder::new();
        let input = format!("{}{}", delta_line("Hello"), delta_line(" world"));
        let events = decoder.push(input.as_bytes());
        assert_eq!(events.len(), 2);
        assert_eq!(collect_deltas(&events), "Hello world");
    }

    #[test]
    fn done_sentinel_ends_sequence() {
        let mut decoder = ChunkDecoder::new();
        let input = format!("{}data: [DONE]\n", delta_line("bye"));
        let events = decoder.push(input.as_bytes());
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], DecodedEvent::Done);
        assert!(decoder.is_done());
    }

    #[test]
    fn input_after_done_is_ignored() {
        let mut decoder = ChunkDecoder::new();
        decoder.push(b"data: [DONE]\n");
        let events = decoder.push(delta_line("late").as_bytes());
        assert!(events.is_empty());
    }

    // ── Chunk-boundary invariance ─────────────────────────────

    #[test]
    fn split_mid_line_yields_same_events() {
        let line = delta_line("Hello world");
        let whole = {
            let mut d = ChunkDecoder::new();
            d.push(line.as_bytes())
        };

        // Split at every possible byte boundary
        for split in 1..line.len() {
            let mut d = ChunkDecoder::new();
            let mut events = d.push(&line.as_bytes()[..split]);
            events.extend(d.push(&line.as_bytes()[split..]));
            assert_eq!(events, whole, "split at byte {split} diverged");
        }
    }

    #[test]
    fn split_one_byte_at_a_time() {
        let input = format!(
            "{}{}data: [DONE]\n",
            delta_line("Hel"),
            delta_line("lo")
        );
        let mut decoder = ChunkDecoder::new();
        let mut events = Vec::new();
        for byte in input.as_bytes() {
            events.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(events.len(), 3);
        assert_eq!(collect_deltas(&events), "Hello");
        assert_eq!(events[2], DecodedEvent::Done);
    }

    #[test]
    fn split_inside_multibyte_char_is_lossless() {
        // "é" is two bytes, "日" three; every split point must land the
        // same text, including splits inside a character.
        let line = delta_line("héllo 日本");
        for split in 1..line.len() {
            let mut d = ChunkDecoder::new();
            let mut events = d.push(&line.as_bytes()[..split]);
            events.extend(d.push(&line.as_bytes()[split..]));
            assert_eq!(collect_deltas(&events), "héllo 日本", "split at byte {split}");
        }
    }

    #[test]
    fn crlf_line_endings() {
        let mut decoder = ChunkDecoder::new();
        let events =
            decoder.push(b"data: {\"type\":\"text-delta\",\"delta\":\"Hi\"}\r\ndata: [DONE]\r\n");
        assert_eq!(events.len(), 2);
        assert_eq!(collect_deltas(&events), "Hi");
    }

    // ── Tolerance ─────────────────────────────────────────────

    #[test]
    fn malformed_json_is_skipped() {
        let mut decoder = ChunkDecoder::new();
        let input = format!(
            "data: {{not json\n{}data: {{\"type\":\"mystery\"}}\n{}",
            delta_line("a"),
            delta_line("b")
        );
        let events = decoder.push(input.as_bytes());
        assert_eq!(events.len(), 2);
        assert_eq!(collect_deltas(&events), "ab");
    }

    #[test]
    fn unmarked_lines_are_ignored() {
        let mut decoder = ChunkDecoder::new();
        let input = format!(": keep-alive\n\n{}", delta_line("x"));
        let events = decoder.push(input.as_bytes());
        assert_eq!(events.len(), 1);
    }

    // ── finish() ──────────────────────────────────────────────

    #[test]
    fn finish_flushes_trailing_line() {
        let mut decoder = ChunkDecoder::new();
        let line = delta_line("tail");
        let events = decoder.push(line.trim_end().as_bytes());
        assert!(events.is_empty());

        let flushed = decoder.finish();
        match flushed {
            Some(DecodedEvent::Event(StreamEvent::TextDelta { delta })) => {
                assert_eq!(delta, "tail");
            }
            _ => unreachable!("expected flushed TextDelta"),
        }
    }

    #[test]
    fn finish_on_empty_buffer_is_none() {
        let mut decoder = ChunkDecoder::new();
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn finish_after_done_is_none() {
        let mut decoder = ChunkDecoder::new();
        decoder.push(b"data: [DONE]\n");
        assert!(decoder.finish().is_none());
    }

    // ── Tool events through the decoder ───────────────────────

    #[test]
    fn tool_events_decode_in_order() {
        let mut decoder = ChunkDecoder::new();
        let input = concat!(
            "data: {\"type\":\"tool-input-available\",\"toolCallId\":\"tc_1\",",
            "\"toolName\":\"show_needs_chart\",\"input\":{\"range\":\"week\"}}\n",
            "data: {\"type\":\"tool-output-available\",\"toolCallId\":\"tc_1\",",
            "\"output\":{\"ok\":true}}\n",
        );
        let events = decoder.push(input.as_bytes());
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            DecodedEvent::Event(StreamEvent::ToolInputAvailable { .. })
        ));
        assert!(matches!(
            events[1],
            DecodedEvent::Event(StreamEvent::ToolOutputAvailable { .. })
        ));
    }
}
