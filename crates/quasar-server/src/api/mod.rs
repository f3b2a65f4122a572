// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod chat;
pub mod status;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the HTTP surface.
///
/// - `POST /chat`        — non-streaming agent turn
/// - `POST /chat/stream` — SSE streaming agent turn
/// - `POST /classify`    — classification only
/// - `GET  /health`      — credential and provider availability
/// - `GET  /models/list` — models of the enabled providers
/// - `GET  /ws`          — WebSocket session
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/chat/stream", post(chat::chat_stream))
        .route("/classify", post(chat::classify))
        .route("/health", get(status::health))
        .route("/models/list", get(status::models_list))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
