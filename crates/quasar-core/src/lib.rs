// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod classify;
pub mod context;
pub mod events;
pub mod orchestrator;
pub mod prompts;

pub use classify::{keyword_classification, parse_classification, Complexity, TaskClassification};
pub use context::{AssembledContext, ContextManager, HistoryRole};
pub use events::AgentEvent;
pub use orchestrator::{AgentRequest, AgentResponse, Orchestrator};
