//! Protocol events carried by the streaming chat response.
//!
//! The backend streams one event record per line. Each record is a JSON
//! payload whose `type` field selects the variant:
//!
//! ```text
//! data: {"type":"text-delta","delta":"Hello"}
//! data: {"type":"tool-input-available","toolCallId":"tc_1","toolName":"show_needs_chart","input":{}}
//! data: {"type":"tool-output-available","toolCallId":"tc_1","output":{}}
//! data: [DONE]
//! ```
//!
//! # Examples
//!
//! ```
//! use sona::stream::event::StreamEvent;
//!
//! let event: StreamEvent =
//!     serde_json::from_str(r#"{"type":"text-delta","delta":"Hi"}"#).unwrap();
//! assert!(matches!(event, StreamEvent::TextDelta { .. }));
//! ```

use serde::{Deserialize, Serialize};

/// A single decoded protocol event from the chat stream.
///
/// Events arrive in temporal order within one stream. Field names follow
/// the wire format (camelCase) via serde renames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// A fragment of assistant prose.
    TextDelta {
        /// The text fragment to append.
        delta: String,
    },

    /// A tool call's full input arguments are available.
    ToolInputAvailable {
        /// Unique identifier correlating this call's input and output.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// The tool being invoked.
        #[serde(rename = "toolName")]
        tool_name: String,
        /// The call's input arguments.
        input: serde_json::Value,
    },

    /// A tool call's output is available.
    ToolOutputAvailable {
        /// Identifier linking this output to its input announcement.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// The tool's output payload.
        output: serde_json::Value,
    },
}

/// Output of the decoded event stream: a protocol event, the
/// end-of-stream sentinel, or a terminal transport failure.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    /// A parsed protocol event.
    Event(StreamEvent),
    /// The `[DONE]` sentinel; the sequence ends without error.
    Done,
    /// The byte stream failed before the sentinel. Always the last item;
    /// carries the transport error message. Produced by the stream
    /// adapter, never by the line decoder itself.
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Wire format ───────────────────────────────────────────

    #[test]
    fn text_delta_decodes() {
        let event: Result<StreamEvent, _> =
            serde_json::from_str(r#"{"type":"text-delta","delta":"Hello"}"#);
        assert!(event.is_ok());
        match event {
            Ok(StreamEvent::TextDelta { delta }) => assert_eq!(delta, "Hello"),
            _ => unreachable!("expected TextDelta"),
        }
    }

    #[test]
    fn tool_input_decodes() {
        let json = r#"{"type":"tool-input-available","toolCallId":"tc_1","toolName":"show_needs_chart","input":{"range":"week"}}"#;
        let event: Result<StreamEvent, _> = serde_json::from_str(json);
        assert!(event.is_ok());
        match event {
            Ok(StreamEvent::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            }) => {
                assert_eq!(tool_call_id, "tc_1");
                assert_eq!(tool_name, "show_needs_chart");
                assert_eq!(input["range"], "week");
            }
            _ => unreachable!("expected ToolInputAvailable"),
        }
    }

    #[test]
    fn tool_output_decodes() {
        let json = r#"{"type":"tool-output-available","toolCallId":"tc_1","output":{"ok":true}}"#;
        let event: Result<StreamEvent, _> = serde_json::from_str(json);
        assert!(event.is_ok());
        match event {
            Ok(StreamEvent::ToolOutputAvailable {
                tool_call_id,
                output,
            }) => {
                assert_eq!(tool_call_id, "tc_1");
                assert_eq!(output["ok"], true);
            }
            _ => unreachable!("expected ToolOutputAvailable"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let event: Result<StreamEvent, _> =
            serde_json::from_str(r#"{"type":"mystery","delta":"x"}"#);
        assert!(event.is_err());
    }

    #[test]
    fn round_trip_preserves_wire_names() {
        let event = StreamEvent::ToolInputAvailable {
            tool_call_id: "tc_9".into(),
            tool_name: "lookup".into(),
            input: serde_json::json!({"q": "rust"}),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("toolCallId"));
        assert!(json.contains("tool-input-available"));
    }

    #[test]
    fn events_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StreamEvent>();
        assert_send_sync::<DecodedEvent>();
    }
}
