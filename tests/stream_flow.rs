//! End-to-end tests over a mock HTTP backend: streaming, tool
//! completions, rate limiting, and persistence of finished turns.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sona::chat::artifact::HttpArtifactSink;
use sona::chat::backend::HttpBackend;
use sona::chat::{ChatSession, ChatStatus, Part, Role, SessionController, ToolState};
use sona::store::{ChatStore, FsChatStore, MemoryChatStore, PersistenceBridge};
use sona::ChatError;

fn stream_body(lines: &[&str]) -> String {
    let mut body = String::new();
    for line in lines {
        body.push_str("data: ");
        body.push_str(line);
        body.push('\n');
    }
    body.push_str("data: [DONE]\n");
    body
}

async fn mount_chat(server: &MockServer, lines: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(stream_body(lines), "text/event-stream"),
        )
        .mount(server)
        .await;
}

fn controller_for(server: &MockServer) -> SessionController {
    let backend = Arc::new(HttpBackend::new(format!("{}/api/chat", server.uri())));
    SessionController::new(ChatSession::new("sess_e2e"), backend)
}

// ── streaming ─────────────────────────────────────────────────

#[tokio::test]
async fn deltas_concatenate_into_one_reply() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        &[
            r#"{"type":"text-delta","delta":"Hello"}"#,
            r#"{"type":"text-delta","delta":", "}"#,
            r#"{"type":"text-delta","delta":"world"}"#,
        ],
    )
    .await;

    let controller = controller_for(&server);
    let result = controller.send("greet me").await;
    assert!(result.is_ok());

    let session = controller.snapshot().await;
    assert_eq!(session.status, ChatStatus::Ready);
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].role, Role::User);
    assert_eq!(session.messages[1].role, Role::Assistant);
    assert_eq!(session.messages[1].text(), "Hello, world");
}

#[tokio::test]
async fn tool_call_interleaves_with_prose() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        &[
            r#"{"type":"text-delta","delta":"Let me chart that. "}"#,
            r#"{"type":"tool-input-available","toolCallId":"tc_1","toolName":"show_needs_chart","input":{"range":"week"}}"#,
            r#"{"type":"tool-output-available","toolCallId":"tc_1","output":{"points":3}}"#,
            r#"{"type":"text-delta","delta":"Done."}"#,
        ],
    )
    .await;

    let controller = controller_for(&server);
    let result = controller.send("chart my week").await;
    assert!(result.is_ok());

    let session = controller.snapshot().await;
    let reply = &session.messages[1];
    assert_eq!(reply.text(), "Let me chart that. Done.");

    let tool = reply.parts.iter().find_map(|p| match p {
        Part::Tool {
            tool_call_id,
            tool_name,
            state,
            output,
            ..
        } => Some((tool_call_id.clone(), tool_name.clone(), *state, output.clone())),
        _ => None,
    });
    match tool {
        Some((id, name, state, output)) => {
            assert_eq!(id, "tc_1");
            assert_eq!(name, "show_needs_chart");
            assert_eq!(state, ToolState::OutputAvailable);
            assert_eq!(output, Some(serde_json::json!({"points": 3})));
        }
        None => unreachable!("tool part missing from reply"),
    }
}

#[tokio::test]
async fn malformed_lines_are_skipped_not_fatal() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        &[
            r#"{"type":"text-delta","delta":"keep"}"#,
            r#"{"type":"text-delta" garbage"#,
            r#"{"type":"mystery-event","x":1}"#,
            r#"{"type":"text-delta","delta":" going"}"#,
        ],
    )
    .await;

    let controller = controller_for(&server);
    let result = controller.send("resilience").await;
    assert!(result.is_ok());

    let session = controller.snapshot().await;
    assert_eq!(session.status, ChatStatus::Ready);
    assert_eq!(session.messages[1].text(), "keep going");
}

// ── artifact side effect ──────────────────────────────────────

#[tokio::test]
async fn completed_tool_posts_one_artifact() {
    let server = MockServer::start().await;
    mount_chat(
        &server,
        &[
            r#"{"type":"tool-input-available","toolCallId":"tc_9","toolName":"show_needs_chart","input":{}}"#,
            r#"{"type":"tool-output-available","toolCallId":"tc_9","output":{"ok":true}}"#,
            // Replay of the same completion
            r#"{"type":"tool-output-available","toolCallId":"tc_9","output":{"ok":true}}"#,
        ],
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/artifacts"))
        .and(body_partial_json(serde_json::json!({
            "toolCallId": "tc_9",
            "toolName": "show_needs_chart",
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Arc::new(HttpBackend::new(format!("{}/api/chat", server.uri())));
    let sink = Arc::new(HttpArtifactSink::new(format!(
        "{}/api/artifacts",
        server.uri()
    )));
    let controller = SessionController::new(ChatSession::new("sess_artifact"), backend)
        .with_artifact_sink(sink, vec!["show_needs_chart".to_string()]);

    let result = controller.send("chart").await;
    assert!(result.is_ok());

    // The post is fire-and-forget on its own task
    tokio::time::sleep(Duration::from_millis(200)).await;
    // MockServer verifies expect(1) on drop
}

// ── rate limiting ─────────────────────────────────────────────

#[tokio::test]
async fn rate_limit_becomes_a_synthetic_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(serde_json::json!({"error": "You're going too fast."})),
        )
        .mount(&server)
        .await;

    let controller = controller_for(&server);
    let result = controller.send("hello").await;
    assert!(result.is_ok());

    let session = controller.snapshot().await;
    assert_eq!(session.status, ChatStatus::Ready);
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[1].role, Role::Assistant);
    assert!(session.messages[1].text().contains("too fast"));
}

#[tokio::test]
async fn server_error_surfaces_and_marks_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "boom"})),
        )
        .mount(&server)
        .await;

    let controller = controller_for(&server);
    let result = controller.send("hello").await;
    match result {
        Err(ChatError::Transport(msg)) => assert!(msg.contains("boom")),
        other => unreachable!("expected transport error, got {other:?}"),
    }
    assert_eq!(controller.status().await, ChatStatus::Error);
}

// ── persistence of finished turns ─────────────────────────────

#[tokio::test]
async fn finished_turn_survives_persist_and_hydrate() {
    let server = MockServer::start().await;
    mount_chat(&server, &[r#"{"type":"text-delta","delta":"stored reply"}"#]).await;

    let dir = match tempfile::TempDir::new() {
        Ok(dir) => dir,
        Err(e) => unreachable!("tempdir failed: {e}"),
    };
    let local = match FsChatStore::new(dir.path()) {
        Ok(store) => store,
        Err(e) => unreachable!("store failed: {e}"),
    };
    let bridge = PersistenceBridge::new(Arc::new(local), Arc::new(MemoryChatStore::new()));

    let controller = controller_for(&server);
    let result = controller.send("remember this").await;
    assert!(result.is_ok());

    let snapshot = controller.snapshot().await;
    let persisted = bridge.persist(&snapshot).await;
    assert!(persisted.is_ok());

    let hydrated = match bridge.hydrate("sess_e2e").await {
        Ok(Some(session)) => session,
        other => unreachable!("expected a session, got {other:?}"),
    };
    assert_eq!(hydrated.messages.len(), 2);
    assert_eq!(hydrated.messages[1].text(), "stored reply");
    assert_eq!(hydrated.status, ChatStatus::Ready);
}

#[tokio::test]
async fn sign_in_moves_local_history_to_remote() {
    let server = MockServer::start().await;
    mount_chat(&server, &[r#"{"type":"text-delta","delta":"offline reply"}"#]).await;

    let dir = match tempfile::TempDir::new() {
        Ok(dir) => dir,
        Err(e) => unreachable!("tempdir failed: {e}"),
    };
    let local = match FsChatStore::new(dir.path()) {
        Ok(store) => store,
        Err(e) => unreachable!("store failed: {e}"),
    };
    let remote = MemoryChatStore::new();
    let bridge = PersistenceBridge::new(Arc::new(local.clone()), Arc::new(remote.clone()));

    let controller = controller_for(&server);
    let sent = controller.send("while signed out").await;
    assert!(sent.is_ok());
    let persisted = bridge.persist(&controller.snapshot().await).await;
    assert!(persisted.is_ok());

    let signed_in = bridge.set_authenticated(true).await;
    assert!(signed_in.is_ok());

    let remote_has = match remote.exists("sess_e2e").await {
        Ok(has) => has,
        Err(e) => unreachable!("exists failed: {e}"),
    };
    assert!(remote_has);
    let local_empty = match local.is_empty().await {
        Ok(empty) => empty,
        Err(e) => unreachable!("is_empty failed: {e}"),
    };
    assert!(local_empty);
}
