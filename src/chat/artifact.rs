//! Artifact sink: fire-and-forget delivery of tool completions.
//!
//! Certain tool completions (configured by tool name) are mirrored to an
//! external artifact endpoint the first time their output arrives. The
//! chat path never awaits or retries the delivery, and a failed post can
//! never corrupt the conversation state machine — it is logged and
//! dropped.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

/// Consumer of one-time tool-completion side effects.
///
/// Implementations must tolerate being called at most once per
/// `tool_call_id`; the exactly-once guarantee itself lives in
/// [`ToolCallTracker`](crate::chat::tracker::ToolCallTracker).
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Deliver a completed tool call. Best-effort; errors are the
    /// implementation's to log.
    async fn post(&self, tool_call_id: &str, tool_name: &str, output: &serde_json::Value);
}

/// Wire shape for the artifact POST.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactPayload<'a> {
    tool_call_id: &'a str,
    tool_name: &'a str,
    output: &'a serde_json::Value,
}

/// HTTP artifact sink POSTing completions as JSON.
#[derive(Debug, Clone)]
pub struct HttpArtifactSink {
    client: reqwest::Client,
    artifact_url: String,
}

impl HttpArtifactSink {
    /// Create a sink pointed at the given endpoint.
    pub fn new(artifact_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            artifact_url: artifact_url.into(),
        }
    }
}

#[async_trait]
impl ArtifactSink for HttpArtifactSink {
    async fn post(&self, tool_call_id: &str, tool_name: &str, output: &serde_json::Value) {
        let payload = ArtifactPayload {
            tool_call_id,
            tool_name,
            output,
        };
        match self
            .client
            .post(&self.artifact_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!("artifact posted for tool call {tool_call_id}");
            }
            Ok(response) => {
                warn!(
                    "artifact post for {tool_call_id} returned {}",
                    response.status()
                );
            }
            Err(e) => {
                warn!("artifact post for {tool_call_id} failed: {e}");
            }
        }
    }
}

/// Recording sink for tests: remembers every delivery.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    deliveries: std::sync::Arc<std::sync::Mutex<Vec<(String, String)>>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The `(tool_call_id, tool_name)` pairs delivered so far.
    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArtifactSink for RecordingSink {
    async fn post(&self, tool_call_id: &str, tool_name: &str, _output: &serde_json::Value) {
        if let Ok(mut deliveries) = self.deliveries.lock() {
            deliveries.push((tool_call_id.to_string(), tool_name.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_with_wire_names() {
        let output = serde_json::json!({"ok": true});
        let payload = ArtifactPayload {
            tool_call_id: "tc_1",
            tool_name: "show_needs_chart",
            output: &output,
        };
        let json = serde_json::to_string(&payload).unwrap_or_default();
        assert!(json.contains("toolCallId"));
        assert!(json.contains("toolName"));
    }

    #[tokio::test]
    async fn recording_sink_remembers_deliveries() {
        let sink = RecordingSink::new();
        sink.post("tc_1", "show_needs_chart", &serde_json::json!({}))
            .await;
        sink.post("tc_2", "hide_chart", &serde_json::json!({}))
            .await;
        let deliveries = sink.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].0, "tc_1");
    }

    #[test]
    fn sinks_are_object_safe() {
        fn _takes_dyn(_sink: &dyn ArtifactSink) {}
        fn _takes_arc(_sink: std::sync::Arc<dyn ArtifactSink>) {}
    }
}
