// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! WebSocket session: framed JSON messages for workspace/context updates and
//! chat turns.
//!
//! Incoming frames: `{type: set_workspace | set_context | chat, ...}`.
//! Replies: `{type: system | status | response | error, ...}`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde_json::{json, Value};
use tracing::debug;

use quasar_core::AgentRequest;

use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let _ = send_json(&mut socket, &json!({"type": "system", "message": "connected"})).await;

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let frame: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                let _ = send_json(
                    &mut socket,
                    &json!({"type": "error", "message": format!("invalid frame: {e}")}),
                )
                .await;
                continue;
            }
        };

        let reply = handle_frame(&state, &frame).await;
        if send_json(&mut socket, &reply).await.is_err() {
            break;
        }
    }
    debug!("websocket closed");
}

async fn handle_frame(state: &AppState, frame: &Value) -> Value {
    match frame["type"].as_str() {
        Some("set_workspace") => {
            let Some(path) = frame["path"].as_str() else {
                return json!({"type": "error", "message": "set_workspace requires 'path'"});
            };
            let mut orchestrator = state.orchestrator.lock().await;
            orchestrator.set_workspace(path);
            json!({"type": "status", "message": format!("workspace set to {path}")})
        }
        Some("set_context") => {
            let mut orchestrator = state.orchestrator.lock().await;
            orchestrator.context_mut().set_task_context(
                frame["current_file"].as_str().map(str::to_string),
                frame["file_content"].as_str().map(str::to_string),
                frame["selected_code"].as_str().map(str::to_string),
                frame["error_message"].as_str().map(str::to_string),
                frame["terminal_output"].as_str().map(str::to_string),
            );
            json!({"type": "status", "message": "context updated"})
        }
        Some("chat") => {
            let Some(query) = frame["query"].as_str() else {
                return json!({"type": "error", "message": "chat requires 'query'"});
            };
            let req = AgentRequest {
                query: query.to_string(),
                current_file: frame["current_file"].as_str().map(str::to_string),
                selected_model: frame["selected_model"].as_str().map(str::to_string),
                ..Default::default()
            };
            let mut orchestrator = state.orchestrator.lock().await;
            let response = orchestrator.process(req, None).await;
            json!({"type": "response", "response": response})
        }
        other => json!({
            "type": "error",
            "message": format!("unknown frame type: {}", other.unwrap_or("<missing>")),
        }),
    }
}

async fn send_json(socket: &mut WebSocket, value: &Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string())).await
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use quasar_config::{AgentConfig, EnvCredentials};
    use quasar_core::Orchestrator;
    use quasar_model::{CredentialStore, ModelRouter};
    use quasar_tools::WebToolSettings;

    use super::*;

    fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(AgentConfig::new());
        let store = Arc::new(CredentialStore::from_env(&EnvCredentials::default()));
        let router = Arc::new(ModelRouter::new(config, store));
        let orch = Orchestrator::new(
            router,
            dir.path().to_str().unwrap(),
            WebToolSettings::default(),
        );
        (dir, AppState::new(orch))
    }

    #[tokio::test]
    async fn set_workspace_frame_moves_the_sandbox() {
        let (_dir, state) = test_state();
        let target = tempfile::tempdir().unwrap();
        let frame = json!({"type": "set_workspace", "path": target.path().to_str().unwrap()});
        let reply = handle_frame(&state, &frame).await;
        assert_eq!(reply["type"], "status");
        let orch = state.orchestrator.lock().await;
        assert_eq!(orch.workspace().root(), target.path().canonicalize().unwrap());
    }

    #[tokio::test]
    async fn set_context_frame_updates_task_layer() {
        let (_dir, state) = test_state();
        let frame = json!({
            "type": "set_context",
            "current_file": "main.rs",
            "error_message": "borrowck says no",
        });
        let reply = handle_frame(&state, &frame).await;
        assert_eq!(reply["type"], "status");
        let orch = state.orchestrator.lock().await;
        let ctx = orch.context().build(quasar_config::TaskType::BugFixing);
        assert!(ctx.task.contains("main.rs"));
        assert!(ctx.task.contains("borrowck"));
    }

    #[tokio::test]
    async fn unknown_frame_type_is_an_error_reply() {
        let (_dir, state) = test_state();
        let reply = handle_frame(&state, &json!({"type": "dance"})).await;
        assert_eq!(reply["type"], "error");
    }

    #[tokio::test]
    async fn missing_fields_are_reported() {
        let (_dir, state) = test_state();
        let reply = handle_frame(&state, &json!({"type": "set_workspace"})).await;
        assert_eq!(reply["type"], "error");
        let reply = handle_frame(&state, &json!({"type": "chat"})).await;
        assert_eq!(reply["type"], "error");
    }
}
