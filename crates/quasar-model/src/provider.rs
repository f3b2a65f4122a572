// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::warn;

use crate::{AssistantTurn, CompletionRequest, ResponseEvent, ToolCallRequest};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// The chat-completion capability the rest of the system programs against.
///
/// Tool binding is part of the request: populating `CompletionRequest::tools`
/// produces a tool-bound invocation.  Providers that cannot express tools
/// simply ignore the schemas; callers detect this through a turn that never
/// carries tool calls and fall back to the plain path.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider id for status display and routing decisions.
    fn provider(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;

    /// Convenience: run a full turn and collect text + tool calls.
    async fn invoke(&self, req: CompletionRequest) -> anyhow::Result<AssistantTurn> {
        let stream = self.complete(req).await?;
        collect_turn(stream).await
    }
}

/// Drain a response stream into one [`AssistantTurn`].
///
/// Parallel tool-call deltas are accumulated per provider index and flushed
/// in index order once the stream ends.  Calls with an empty name cannot be
/// dispatched and are dropped; empty argument buffers resolve to `{}` so the
/// request object is always a valid JSON object.
pub async fn collect_turn(mut stream: ResponseStream) -> anyhow::Result<AssistantTurn> {
    let mut text = String::new();
    let mut pending: HashMap<u32, PendingToolCall> = HashMap::new();

    while let Some(event) = stream.next().await {
        match event? {
            ResponseEvent::TextDelta(delta) => text.push_str(&delta),
            ResponseEvent::ToolCall { index, id, name, arguments } => {
                let ptc = pending.entry(index).or_default();
                if !id.is_empty() {
                    ptc.id = id;
                }
                if !name.is_empty() {
                    ptc.name = name;
                }
                ptc.args_buf.push_str(&arguments);
            }
            ResponseEvent::Usage { .. } => {}
            ResponseEvent::Done => break,
            ResponseEvent::Error(e) => {
                warn!("model stream error: {e}");
            }
        }
    }

    let mut ordered: Vec<(u32, PendingToolCall)> = pending.into_iter().collect();
    ordered.sort_by_key(|(idx, _)| *idx);

    let mut tool_calls = Vec::with_capacity(ordered.len());
    for (i, (_, ptc)) in ordered.into_iter().enumerate() {
        if ptc.name.is_empty() {
            warn!(tool_call_id = %ptc.id, "dropping tool call with empty name from model");
            continue;
        }
        let mut call = ptc.finish();
        if call.id.is_empty() {
            call.id = format!("call_{i}");
        }
        tool_calls.push(call);
    }

    Ok(AssistantTurn { text, tool_calls })
}

#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    args_buf: String,
}

impl PendingToolCall {
    fn finish(self) -> ToolCallRequest {
        let args = if self.args_buf.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            match serde_json::from_str(&self.args_buf) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        tool_name = %self.name,
                        error = %e,
                        "model sent tool call with invalid JSON arguments; substituting {{}}"
                    );
                    serde_json::Value::Object(Default::default())
                }
            }
        };
        ToolCallRequest { id: self.id, name: self.name, args }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
