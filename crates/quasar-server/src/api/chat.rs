// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Chat endpoints: the non-streaming wrapper, the SSE stream and the
//! classification probe.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use tokio::sync::mpsc;

use quasar_core::{AgentRequest, TaskClassification};
use quasar_model::RequestCredentials;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatHttpRequest {
    pub query: String,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub file_content: Option<String>,
    #[serde(default)]
    pub selected_code: Option<String>,
    #[serde(default)]
    pub terminal_output: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub selected_model: Option<String>,
    /// Per-request credential overrides: provider → list of keys.  Installed
    /// only for this request and never stored.
    #[serde(default)]
    pub credentials: Option<BTreeMap<String, Vec<String>>>,
    /// Per-request settings (e.g. `ollama_url`).
    #[serde(default)]
    pub settings: Option<BTreeMap<String, String>>,
}

impl ChatHttpRequest {
    fn agent_request(&self) -> AgentRequest {
        AgentRequest {
            query: self.query.clone(),
            current_file: self.current_file.clone(),
            file_content: self.file_content.clone(),
            selected_code: self.selected_code.clone(),
            terminal_output: self.terminal_output.clone(),
            error_message: self.error_message.clone(),
            selected_model: self.selected_model.clone(),
        }
    }

    fn overlay(&self) -> Option<RequestCredentials> {
        if self.credentials.is_none() && self.settings.is_none() {
            return None;
        }
        Some(RequestCredentials::new(
            self.credentials.clone().unwrap_or_default(),
            self.settings.clone().unwrap_or_default(),
        ))
    }
}

/// `POST /chat` — run the full pipeline and return the final aggregate.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatHttpRequest>,
) -> impl IntoResponse {
    let overlay = body.overlay();
    let req = body.agent_request();

    let mut orchestrator = state.orchestrator.lock().await;
    if let Some(workspace) = &body.workspace {
        orchestrator.set_workspace(workspace);
    }
    let response = orchestrator.process(req, overlay.as_ref()).await;
    Json(response)
}

/// `POST /chat/stream` — run the pipeline and stream every event as SSE.
///
/// Each event is one `data: <json>` record.  Proxy buffering is disabled so
/// tool progress reaches the client as it happens.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatHttpRequest>,
) -> impl IntoResponse {
    let overlay = body.overlay().map(Arc::new);
    let req = body.agent_request();
    let workspace = body.workspace.clone();

    let (tx, mut rx) = mpsc::channel(256);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let mut orchestrator = orchestrator.lock().await;
        if let Some(workspace) = workspace {
            orchestrator.set_workspace(&workspace);
        }
        orchestrator.process_stream(req, tx, overlay.as_deref()).await;
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok::<_, Infallible>(Event::default().data(data));
        }
    };

    let mut response = Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    let headers = response.headers_mut();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    response
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub query: String,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub has_selection: bool,
    #[serde(default)]
    pub has_error: bool,
}

/// `POST /classify` — classification only, no agent loop.
pub async fn classify(
    State(state): State<AppState>,
    Json(body): Json<ClassifyRequest>,
) -> Json<TaskClassification> {
    let orchestrator = state.orchestrator.lock().await;
    let classification = orchestrator
        .classify_task(
            &body.query,
            body.current_file.as_deref(),
            body.has_selection,
            body.has_error,
            None,
        )
        .await;
    Json(classification)
}
