// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use tokio::sync::Mutex;

use quasar_config::AgentConfig;
use quasar_core::Orchestrator;
use quasar_model::ModelRouter;

/// Shared server state.
///
/// The orchestrator owns the conversation; requests against it serialise on
/// the mutex so context updates and the message history stay consistent.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Mutex<Orchestrator>>,
    pub router: Arc<ModelRouter>,
    pub config: Arc<AgentConfig>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let router = orchestrator.router().clone();
        let config = router.config().clone();
        Self { orchestrator: Arc::new(Mutex::new(orchestrator)), router, config }
    }
}
