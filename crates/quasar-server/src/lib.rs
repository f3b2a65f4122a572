// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod api;
pub mod state;

pub use api::app;
pub use state::AppState;

use tracing::info;

/// Bind and serve the HTTP surface until the process is stopped.
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "HTTP server listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
