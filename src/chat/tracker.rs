//! Exactly-once gating for tool-call side effects.
//!
//! [`ToolCallTracker`] is the session's sole idempotency mechanism against
//! duplicate or replayed `tool-output-available` events: a side effect
//! keyed by `tool_call_id` must be gated on [`observe`](ToolCallTracker::observe)
//! returning `true`, which happens exactly once per ID.
//!
//! Each session owns its own tracker; there is no process-wide record set,
//! so multiple sessions cannot cross-contaminate and tests can instantiate
//! isolated instances.
//!
//! # Examples
//!
//! ```
//! use sona::chat::tracker::ToolCallTracker;
//!
//! let mut tracker = ToolCallTracker::new();
//! assert!(tracker.observe("tc_1"));
//! assert!(!tracker.observe("tc_1"));
//! ```

use std::collections::HashSet;

/// Per-session tracker of handled tool calls.
///
/// Records are retained for the lifetime of the session. Safe to call
/// under any ordering or repetition of events.
#[derive(Debug, Default)]
pub struct ToolCallTracker {
    handled: HashSet<String>,
}

impl ToolCallTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-set for a tool call's one-time side effect.
    ///
    /// Returns `true` the first time `tool_call_id` is observed and
    /// `false` on every subsequent observation.
    pub fn observe(&mut self, tool_call_id: &str) -> bool {
        self.handled.insert(tool_call_id.to_string())
    }

    /// Whether this ID's side effect has already fired.
    pub fn is_handled(&self, tool_call_id: &str) -> bool {
        self.handled.contains(tool_call_id)
    }

    /// Number of distinct tool calls observed.
    pub fn len(&self) -> usize {
        self.handled.len()
    }

    /// Whether no tool call has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.handled.is_empty()
    }
}
