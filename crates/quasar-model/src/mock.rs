// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::{provider::ResponseStream, CompletionRequest, ResponseEvent, Role};

/// Deterministic mock provider for tests.  Echoes the last user message
/// back as the assistant response.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl crate::ChatModel for MockProvider {
    fn provider(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .and_then(|m| m.as_text())
            .unwrap_or("[no input]")
            .to_string();

        let events: Vec<anyhow::Result<ResponseEvent>> = vec![
            Ok(ResponseEvent::TextDelta(format!("MOCK: {reply}"))),
            Ok(ResponseEvent::Usage { input_tokens: 10, output_tokens: 10 }),
            Ok(ResponseEvent::Done),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// One scripted step of a [`ScriptedMockProvider`] call.
#[derive(Debug, Clone)]
pub enum MockScript {
    /// The call succeeds and emits this event sequence.
    Events(Vec<ResponseEvent>),
    /// The call fails with this error message (e.g. a simulated 429).
    Fail(String),
}

/// A pre-scripted mock provider.  Each `complete` call pops the next script
/// from the front of the queue, so tests can specify exact event sequences
/// (including tool calls and transport failures) without network access.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<Vec<MockScript>>>,
    provider_id: String,
    model: String,
    /// The last `CompletionRequest` seen, for assertions on what was sent.
    pub last_request: Arc<Mutex<Option<CompletionRequest>>>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<MockScript>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            provider_id: "mock".into(),
            model: "scripted-mock-model".into(),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Report a different provider id, for fallback-chain tests.
    pub fn for_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider_id = provider.into();
        self
    }

    /// Convenience: provider that always returns a single text reply.
    pub fn always_text(reply: impl Into<String>) -> Self {
        let r = reply.into();
        Self::new(vec![MockScript::Events(vec![
            ResponseEvent::TextDelta(r),
            ResponseEvent::Usage { input_tokens: 5, output_tokens: 5 },
            ResponseEvent::Done,
        ])])
    }

    /// Convenience: provider that returns a tool call followed by a text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            MockScript::Events(vec![
                ResponseEvent::ToolCall {
                    index: 0,
                    id: tool_id.into(),
                    name: tool_name.into(),
                    arguments: args_json.into(),
                },
                ResponseEvent::Done,
            ]),
            MockScript::Events(vec![
                ResponseEvent::TextDelta(final_text.into()),
                ResponseEvent::Done,
            ]),
        ])
    }

    /// Convenience: first call fails with a 429-shaped error, second call
    /// returns the given text.  Exercises rotation and fallback paths.
    pub fn rate_limited_then(final_text: impl Into<String>) -> Self {
        Self::new(vec![
            MockScript::Fail("mock error 429 Too Many Requests: rate limit exceeded".into()),
            MockScript::Events(vec![
                ResponseEvent::TextDelta(final_text.into()),
                ResponseEvent::Done,
            ]),
        ])
    }
}

#[async_trait]
impl crate::ChatModel for ScriptedMockProvider {
    fn provider(&self) -> &str {
        &self.provider_id
    }
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        *self.last_request.lock().unwrap() = Some(req);
        let step = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                MockScript::Events(vec![
                    ResponseEvent::TextDelta("[no more scripts]".into()),
                    ResponseEvent::Done,
                ])
            } else {
                scripts.remove(0)
            }
        };
        match step {
            MockScript::Fail(msg) => Err(anyhow::anyhow!(msg)),
            MockScript::Events(events) => {
                let wrapped: Vec<anyhow::Result<ResponseEvent>> =
                    events.into_iter().map(Ok).collect();
                Ok(Box::pin(stream::iter(wrapped)))
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::{ChatModel, Message};

    fn req() -> CompletionRequest {
        CompletionRequest::new(vec![Message::user("hi")])
    }

    #[tokio::test]
    async fn mock_echoes_last_user_message() {
        let p = MockProvider;
        let mut stream = p.complete(req()).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        match first {
            ResponseEvent::TextDelta(t) => assert!(t.contains("MOCK: hi")),
            other => panic!("unexpected first event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn scripted_tool_then_text_two_rounds() {
        let p = ScriptedMockProvider::tool_then_text("c1", "read_file", "{\"path\":\"x\"}", "done");
        let turn1 = p.invoke(req()).await.unwrap();
        assert!(turn1.has_tool_calls());
        assert_eq!(turn1.tool_calls[0].name, "read_file");
        let turn2 = p.invoke(req()).await.unwrap();
        assert_eq!(turn2.text, "done");
    }

    #[tokio::test]
    async fn rate_limited_script_fails_then_succeeds() {
        let p = ScriptedMockProvider::rate_limited_then("recovered");
        let err = p.invoke(req()).await.unwrap_err();
        assert!(err.to_string().contains("429"));
        let turn = p.invoke(req()).await.unwrap();
        assert_eq!(turn.text, "recovered");
    }

    #[tokio::test]
    async fn exhausted_scripts_fall_back_to_sentinel() {
        let p = ScriptedMockProvider::new(vec![]);
        let turn = p.invoke(req()).await.unwrap();
        assert!(turn.text.contains("no more scripts"));
    }

    #[tokio::test]
    async fn last_request_records_what_was_sent() {
        let p = ScriptedMockProvider::always_text("ok");
        let _ = p.invoke(req()).await.unwrap();
        let seen = p.last_request.lock().unwrap();
        assert_eq!(seen.as_ref().unwrap().messages.len(), 1);
    }
}
