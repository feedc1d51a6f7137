//! Message assembly: folding decoded stream events into the trailing
//! assistant message.
//!
//! The [`MessageAssembler`] owns the per-turn text buffer and applies each
//! [`StreamEvent`] to the last message of the session's message list. The
//! buffer, not the individual deltas, is authoritative for text: the
//! trailing message's text part is replaced wholesale on every delta,
//! which avoids order-dependent partial-patch bugs.
//!
//! # Examples
//!
//! ```
//! use sona::chat::assembler::MessageAssembler;
//! use sona::chat::message::Message;
//! use sona::stream::event::StreamEvent;
//!
//! let mut assembler = MessageAssembler::new();
//! let mut messages = vec![Message::assistant_open()];
//! assembler.begin_turn();
//! assembler.apply(&mut messages, &StreamEvent::TextDelta { delta: "Hello".into() });
//! assembler.apply(&mut messages, &StreamEvent::TextDelta { delta: " world".into() });
//! assert_eq!(messages[0].text(), "Hello world");
//! ```

use tracing::{debug, warn};

use super::message::{Message, Part, Role, ToolState};
use crate::stream::event::StreamEvent;

/// What applying one event did to the trailing message.
///
/// The session controller uses [`ToolCompleted`](AppliedEvent::ToolCompleted)
/// as the trigger point for the exactly-once side-effect gate.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedEvent {
    /// The turn's text buffer grew and the text part was replaced.
    TextExtended,
    /// A new tool part was inserted.
    ToolInserted {
        /// The inserted call's ID.
        tool_call_id: String,
    },
    /// A duplicate tool call (same name, structurally equal input,
    /// different ID) was suppressed.
    ToolSuppressed {
        /// The suppressed call's ID.
        tool_call_id: String,
    },
    /// A tool part transitioned to `OutputAvailable`.
    ToolCompleted {
        /// The completed call's ID.
        tool_call_id: String,
        /// The completed call's tool name.
        tool_name: String,
        /// The attached output payload.
        output: serde_json::Value,
    },
    /// The event did not apply (no open message, unknown ID, or a repeat
    /// of a terminal transition).
    Ignored,
}

/// Applies decoded events to the trailing assistant message.
///
/// One assembler instance serves one streaming turn at a time; call
/// [`begin_turn`](Self::begin_turn) when a new trailing assistant message
/// is opened.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    /// Accumulated prose for the current turn. Authoritative.
    text_buffer: String,
    /// Index of the text part being extended in the trailing message.
    text_part_index: Option<usize>,
}

impl MessageAssembler {
    /// Create a new assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset per-turn state for a newly opened assistant message.
    pub fn begin_turn(&mut self) {
        self.text_buffer.clear();
        self.text_part_index = None;
    }

    /// Apply one decoded event to the trailing assistant message.
    ///
    /// Returns what happened so the caller can drive side-effect gating.
    /// Events that cannot apply (no open assistant message, unknown tool
    /// call ID) are ignored with a log line rather than corrupting state.
    pub fn apply(&mut self, messages: &mut Vec<Message>, event: &StreamEvent) -> AppliedEvent {
        let Some(trailing) = messages.last_mut() else {
            warn!("stream event arrived with no open message; dropping");
            return AppliedEvent::Ignored;
        };
        if trailing.role != Role::Assistant {
            warn!("stream event arrived but trailing message is not assistant; dropping");
            return AppliedEvent::Ignored;
        }

        match event {
            StreamEvent::TextDelta { delta } => {
                self.text_buffer.push_str(delta);
                match self.text_part_index {
                    Some(idx) => {
                        if let Some(Part::Text { text }) = trailing.parts.get_mut(idx) {
                            *text = self.text_buffer.clone();
                        }
                    }
                    None => {
                        trailing.push_part(Part::Text {
                            text: self.text_buffer.clone(),
                        });
                        self.text_part_index = Some(trailing.parts.len() - 1);
                    }
                }
                AppliedEvent::TextExtended
            }

            StreamEvent::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => self.upsert_tool_input(trailing, tool_call_id, tool_name, input),

            StreamEvent::ToolOutputAvailable {
                tool_call_id,
                output,
            } => Self::attach_tool_output(trailing, tool_call_id, output),
        }
    }

    /// Insert or update a tool part for a `tool-input-available` event.
    ///
    /// A new part is suppressed when another part already carries the same
    /// tool name and a structurally equal input under a *different* call
    /// ID. Two legitimately identical calls therefore collapse into one;
    /// this mirrors the established anti-duplicate policy.
    fn upsert_tool_input(
        &mut self,
        trailing: &mut Message,
        tool_call_id: &str,
        tool_name: &str,
        input: &serde_json::Value,
    ) -> AppliedEvent {
        // Upsert: a repeat announcement for a known ID refreshes it.
        for part in trailing.parts.iter_mut() {
            if let Part::Tool {
                tool_call_id: existing_id,
                tool_name: existing_name,
                input: existing_input,
                ..
            } = part
                && existing_id == tool_call_id
            {
                *existing_name = tool_name.to_string();
                *existing_input = input.clone();
                return AppliedEvent::ToolInserted {
                    tool_call_id: tool_call_id.to_string(),
                };
            }
        }

        let duplicate = trailing.parts.iter().any(|part| {
            matches!(part, Part::Tool {
                tool_call_id: other_id,
                tool_name: other_name,
                input: other_input,
                ..
            } if other_id != tool_call_id && other_name == tool_name && other_input == input)
        });
        if duplicate {
            debug!("suppressing duplicate tool call {tool_call_id} ({tool_name})");
            return AppliedEvent::ToolSuppressed {
                tool_call_id: tool_call_id.to_string(),
            };
        }

        trailing.push_part(Part::Tool {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            state: ToolState::InputAvailable,
            input: input.clone(),
            output: None,
        });
        AppliedEvent::ToolInserted {
            tool_call_id: tool_call_id.to_string(),
        }
    }

    /// Transition a tool part to `OutputAvailable` for a
    /// `tool-output-available` event.
    ///
    /// The transition fires at most once per call ID; repeats and unknown
    /// IDs are ignored.
    fn attach_tool_output(
        trailing: &mut Message,
        tool_call_id: &str,
        output: &serde_json::Value,
    ) -> AppliedEvent {
        for part in trailing.parts.iter_mut() {
            if let Part::Tool {
                tool_call_id: existing_id,
                tool_name,
                state,
                output: existing_output,
                ..
            } = part
                && existing_id == tool_call_id
            {
                if *state == ToolState::OutputAvailable {
                    debug!("repeated output for tool call {tool_call_id}; ignoring");
                    return AppliedEvent::Ignored;
                }
                *state = ToolState::OutputAvailable;
                *existing_output = Some(output.clone());
                return AppliedEvent::ToolCompleted {
                    tool_call_id: tool_call_id.to_string(),
                    tool_name: tool_name.clone(),
                    output: output.clone(),
                };
            }
        }

        warn!("output for unknown tool call {tool_call_id}; dropping");
        AppliedEvent::Ignored
    }
}
