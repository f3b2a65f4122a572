// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use quasar_model::get_provider_meta;

use crate::state::AppState;

/// `GET /health` — process liveness plus per-provider credential status.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let providers = state.router.credentials().status(None);
    Json(json!({
        "status": "ok",
        "providers": providers,
    }))
}

/// `GET /models/list` — every model of every enabled provider.
pub async fn models_list(State(state): State<AppState>) -> Json<Value> {
    let mut models = Vec::new();
    for (provider_id, provider) in &state.config.providers {
        if !provider.enabled {
            continue;
        }
        let display = get_provider_meta(provider_id)
            .map(|m| m.name)
            .unwrap_or(provider_id.as_str());
        for (key, model) in &provider.models {
            models.push(json!({
                "provider": provider_id,
                "model_key": key,
                "model_name": model.name,
                "display_name": format!("{display}: {}", model.name),
            }));
        }
    }
    Json(json!({ "models": models }))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
