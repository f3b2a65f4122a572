// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Serialize;
use serde_json::Value;

use quasar_config::TaskType;

fn is_false(b: &bool) -> bool {
    !b
}

/// Events emitted by the orchestrator during a request.
///
/// This is the wire model for the SSE stream: each variant serialises to a
/// JSON object whose `type` field is the snake_case variant name.  Within a
/// request the events obey a strict causal order: `classification` comes
/// first, each `tool_complete` follows its `tool_start`, and the stream ends
/// with exactly one `done` or `error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Result of task classification, emitted before any other event.
    Classification { task_type: TaskType, confidence: f32 },
    /// Start of one agentic-loop iteration.
    Iteration { current: u32, max: u32, remaining: u32 },
    /// One iteration remains; a progress-summary demand was injected.
    IterationWarning { remaining: u32, message: String },
    /// Human-readable progress or observation line.
    Message { content: String },
    /// A tool is about to run.
    ToolStart { tool: String, args: Value },
    /// The matching tool finished; `result` is the formatted output.
    ToolComplete { tool: String, result: String },
    /// A file-mutating tool succeeded; clients should refresh their tree.
    FileTreeUpdated,
    /// A chunk of the final response text.
    Token { content: String },
    /// Terminal success event.
    Done {
        model: String,
        provider: String,
        task_type: TaskType,
        iterations: u32,
        tool_calls_count: usize,
        tools_used: Vec<String>,
        #[serde(skip_serializing_if = "is_false")]
        loop_detected: bool,
        #[serde(skip_serializing_if = "is_false")]
        max_iterations_reached: bool,
    },
    /// Terminal failure event.
    Error { message: String },
}

impl AgentEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done { .. } | AgentEvent::Error { .. })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
