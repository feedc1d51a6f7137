//! Send/cancel orchestration for one chat session.
//!
//! [`SessionController`] owns the session state machine
//! (`Ready → Submitted → Streaming → {Ready | Error}`): it issues the
//! backend request, pipes decoded stream events through the
//! [`MessageAssembler`], gates tool-completion side effects on the
//! [`ToolCallTracker`], and enforces cancellation.
//!
//! Cancellation discipline: every `send` carries its own
//! [`CancellationToken`]. Starting a new send (or calling
//! [`cancel`](SessionController::cancel)) invalidates the prior token, and
//! the superseded stream's task checks its token *before every mutation* —
//! a cancelled stream applies nothing further and never touches status,
//! even if its underlying read completes later. Cancellation is not an
//! error.
//!
//! Status transitions are published as typed `(from, to)` pairs on a
//! watch channel so collaborators (auto-playback, persistence, UIs) can
//! observe them without callback hooks.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::artifact::ArtifactSink;
use super::assembler::{AppliedEvent, MessageAssembler};
use super::backend::{BackendReply, ChatRequest, GenerationBackend};
use super::message::Message;
use super::session::{ChatSession, ChatStatus};
use super::tracker::ToolCallTracker;
use crate::error::{ChatError, Result};
use crate::stream::decode_stream;
use crate::stream::event::DecodedEvent;

/// One observed status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    /// The status before the transition.
    pub from: ChatStatus,
    /// The status after the transition.
    pub to: ChatStatus,
}

/// Mutable session state guarded by the controller's lock.
struct ControllerState {
    session: ChatSession,
    assembler: MessageAssembler,
    tracker: ToolCallTracker,
    /// Token of the in-flight send, if any.
    cancel: Option<CancellationToken>,
}

/// Orchestrates sends, streaming, and cancellation for one session.
///
/// Cheaply cloneable; clones share the same session state, so a second
/// `send` from any clone supersedes the first. Each session gets its own
/// controller — there is no process-wide state.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<ControllerState>>,
    backend: Arc<dyn GenerationBackend>,
    sink: Option<Arc<dyn ArtifactSink>>,
    /// Tool names whose completion triggers the artifact sink.
    artifact_tools: Arc<HashSet<String>>,
    status_tx: watch::Sender<StatusTransition>,
}

impl SessionController {
    /// Create a controller over an existing (possibly hydrated) session.
    pub fn new(session: ChatSession, backend: Arc<dyn GenerationBackend>) -> Self {
        let (status_tx, _) = watch::channel(StatusTransition {
            from: ChatStatus::Ready,
            to: ChatStatus::Ready,
        });
        Self {
            state: Arc::new(Mutex::new(ControllerState {
                session,
                assembler: MessageAssembler::new(),
                tracker: ToolCallTracker::new(),
                cancel: None,
            })),
            backend,
            sink: None,
            artifact_tools: Arc::new(HashSet::new()),
            status_tx,
        }
    }

    /// Attach an artifact sink fired for the given tool names.
    pub fn with_artifact_sink(
        mut self,
        sink: Arc<dyn ArtifactSink>,
        tool_names: impl IntoIterator<Item = String>,
    ) -> Self {
        self.sink = Some(sink);
        self.artifact_tools = Arc::new(tool_names.into_iter().collect());
        self
    }

    /// Subscribe to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<StatusTransition> {
        self.status_tx.subscribe()
    }

    /// Snapshot the session (messages and status) for reading or
    /// persistence.
    pub async fn snapshot(&self) -> ChatSession {
        self.state.lock().await.session.clone()
    }

    /// The current status.
    pub async fn status(&self) -> ChatStatus {
        self.state.lock().await.session.status
    }

    /// Send a user message and drive the response stream to completion.
    ///
    /// Rejects empty or whitespace-only input. Cancels any prior in-flight
    /// send before issuing the request. Returns once the stream has been
    /// fully applied (or the send was superseded, which is not an error).
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Input`] for blank input and
    /// [`ChatError::Transport`] when the backend fails with anything other
    /// than a rate-limit status (the session moves to `Error`).
    pub async fn send(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::Input("message is empty".into()));
        }

        // Take authority: invalidate the previous stream and install our
        // own token before any mutation.
        let (token, request) = {
            let mut state = self.state.lock().await;
            if let Some(prev) = state.cancel.take() {
                debug!("superseding in-flight send for {}", state.session.id);
                prev.cancel();
            }
            let token = CancellationToken::new();
            state.cancel = Some(token.clone());

            state.session.messages.push(Message::user(text));
            self.set_status(&mut state.session, ChatStatus::Submitted);

            let request = ChatRequest::new(
                state.session.id.clone(),
                state.session.messages.clone(),
            );
            (token, request)
        };

        let reply = match self.backend.send(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                let mut state = self.state.lock().await;
                if token.is_cancelled() {
                    // A newer send owns the session; our failure is moot.
                    return Ok(());
                }
                self.set_status(&mut state.session, ChatStatus::Error);
                return Err(e);
            }
        };

        match reply {
            BackendReply::RateLimited { message } => {
                let mut state = self.state.lock().await;
                if token.is_cancelled() {
                    return Ok(());
                }
                info!("rate limited; appending warning without streaming");
                state.session.messages.push(Message::assistant(message));
                self.set_status(&mut state.session, ChatStatus::Ready);
                Ok(())
            }
            BackendReply::Stream(bytes) => self.consume_stream(bytes, token).await,
        }
    }

    /// Cancel the in-flight send, if any.
    ///
    /// The superseded stream's late output becomes a no-op. If a send was
    /// active, the session returns to `Ready`; nothing happens otherwise.
    pub async fn cancel(&self) {
        let mut state = self.state.lock().await;
        if let Some(token) = state.cancel.take() {
            token.cancel();
            if matches!(
                state.session.status,
                ChatStatus::Submitted | ChatStatus::Streaming
            ) {
                self.set_status(&mut state.session, ChatStatus::Ready);
            }
        }
    }

    /// Drive one response stream through the assembler.
    ///
    /// The token is checked before *every* mutation: a concurrently
    /// cancelled stream must not emit a single further edit.
    async fn consume_stream(
        &self,
        bytes: super::backend::ByteStream,
        token: CancellationToken,
    ) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if token.is_cancelled() {
                return Ok(());
            }
            self.set_status(&mut state.session, ChatStatus::Streaming);
            state.session.messages.push(Message::assistant_open());
            state.assembler.begin_turn();
        }

        let events = decode_stream(bytes);
        futures_util::pin_mut!(events);

        while let Some(decoded) = events.next().await {
            let event = match decoded {
                DecodedEvent::Done => break,
                DecodedEvent::Failed(message) => {
                    let mut state = self.state.lock().await;
                    if token.is_cancelled() {
                        // The aborted read belongs to a superseded send.
                        return Ok(());
                    }
                    warn!("stream failed mid-turn: {message}");
                    state.cancel = None;
                    self.set_status(&mut state.session, ChatStatus::Error);
                    return Err(ChatError::Transport(message));
                }
                DecodedEvent::Event(event) => event,
            };

            let mut state = self.state.lock().await;
            if token.is_cancelled() {
                debug!("discarding event from superseded stream");
                return Ok(());
            }

            let state = &mut *state;
            let applied = state.assembler.apply(&mut state.session.messages, &event);

            if let AppliedEvent::ToolCompleted {
                tool_call_id,
                tool_name,
                output,
            } = applied
            {
                self.handle_tool_completion(&mut state.tracker, tool_call_id, tool_name, output);
            }
        }

        let mut state = self.state.lock().await;
        if token.is_cancelled() {
            return Ok(());
        }
        state.cancel = None;
        self.set_status(&mut state.session, ChatStatus::Ready);
        Ok(())
    }

    /// Gate the one-time artifact side effect on the tracker.
    ///
    /// Fire-and-forget: the post runs on its own task and its outcome
    /// never feeds back into chat status.
    fn handle_tool_completion(
        &self,
        tracker: &mut ToolCallTracker,
        tool_call_id: String,
        tool_name: String,
        output: serde_json::Value,
    ) {
        if !tracker.observe(&tool_call_id) {
            debug!("tool call {tool_call_id} already handled; skipping side effect");
            return;
        }
        if !self.artifact_tools.contains(&tool_name) {
            return;
        }
        let Some(sink) = self.sink.clone() else {
            warn!("tool {tool_name} completed but no artifact sink configured");
            return;
        };
        tokio::spawn(async move {
            sink.post(&tool_call_id, &tool_name, &output).await;
        });
    }

    /// Record a status change and publish the transition.
    fn set_status(&self, session: &mut ChatSession, to: ChatStatus) {
        let from = session.status;
        session.status = to;
        let _ = self.status_tx.send_replace(StatusTransition { from, to });
    }
}
