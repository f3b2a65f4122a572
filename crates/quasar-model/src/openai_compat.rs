// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared implementation for OpenAI-compatible chat completion APIs.
//!
//! All four supported endpoints speak the same `/chat/completions` SSE wire
//! format; this module provides a single driver that each is configured
//! onto.
//!
//! # Auth styles
//! - `Bearer` — `Authorization: Bearer <key>` (Cerebras, Groq, Cloudflare)
//! - `None` — no authentication (local Ollama server)
//!
//! Cloudflare additionally encodes the account id into the URL path; use
//! [`OpenAICompatProvider::with_full_chat_url`] for that shape.

use anyhow::{bail, Context};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use crate::{provider::ResponseStream, CompletionRequest, MessageContent, ResponseEvent, Role};

/// How to send the API key in HTTP requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// No authentication header — local servers.
    None,
}

pub struct OpenAICompatProvider {
    provider_id: String,
    model: String,
    api_key: Option<String>,
    /// Full chat completions URL.
    chat_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
    auth_style: AuthStyle,
}

impl OpenAICompatProvider {
    pub fn new(
        provider_id: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: &str,
        max_tokens: u32,
        temperature: f32,
        auth_style: AuthStyle,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self::with_full_chat_url(
            provider_id,
            model,
            api_key,
            format!("{base}/chat/completions"),
            max_tokens,
            temperature,
            auth_style,
        )
    }

    /// Construct from a pre-built chat completions URL.  Needed when the URL
    /// carries more than a base; Cloudflare embeds the account id:
    /// `https://api.cloudflare.com/client/v4/accounts/<id>/ai/v1/chat/completions`.
    pub fn with_full_chat_url(
        provider_id: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        chat_url: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
        auth_style: AuthStyle,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            model: model.into(),
            api_key,
            chat_url: chat_url.into(),
            max_tokens,
            temperature,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            auth_style,
        }
    }
}

#[async_trait]
impl crate::ChatModel for OpenAICompatProvider {
    fn provider(&self) -> &str {
        &self.provider_id
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream> {
        let messages = build_wire_messages(&req.messages);

        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "stream_options": { "include_usage": true },
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        debug!(
            provider = %self.provider_id,
            model = %self.model,
            tool_count = tools.len(),
            message_count = req.messages.len(),
            "sending completion request"
        );

        let mut http_req = self.client.post(&self.chat_url).json(&body);
        if self.auth_style == AuthStyle::Bearer {
            let key = self
                .api_key
                .as_deref()
                .context("API key not set for bearer-authenticated provider")?;
            http_req = http_req.bearer_auth(key);
        }

        let resp = http_req
            .send()
            .await
            .with_context(|| format!("{} request failed", self.provider_id))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            // The status code stays in the message so rate-limit detection
            // (429 / quota text) works on the propagated error.
            bail!("{} error {status}: {text}", self.provider_id);
        }

        let byte_stream = resp.bytes_stream();
        // SSE events can be split across TCP packets.  Keep a line buffer
        // across chunks; emit events only for complete lines.
        let event_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let events: Vec<anyhow::Result<ResponseEvent>> = match chunk {
                    Ok(b) => {
                        buf.push_str(&String::from_utf8_lossy(&b));
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(anyhow::anyhow!(e))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

/// Parse a single complete SSE `data:` line into a [`ResponseEvent`].
///
/// Returns `None` for empty lines, comments, or unparseable data.
fn parse_sse_data_line(line: &str) -> Option<anyhow::Result<ResponseEvent>> {
    let data = line.strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(ResponseEvent::Done));
    }
    let v: Value = serde_json::from_str(data).ok()?;
    Some(Ok(parse_sse_chunk(&v)))
}

/// Drain all complete `\n`-terminated SSE lines from `buf`, leaving any
/// trailing partial line for the next chunk.
pub(crate) fn drain_complete_sse_lines(buf: &mut String) -> Vec<anyhow::Result<ResponseEvent>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(ev) = parse_sse_data_line(&line) {
            events.push(ev);
        }
    }
    events
}

fn parse_sse_chunk(v: &Value) -> ResponseEvent {
    // Usage-only chunk (from stream_options.include_usage)
    if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
        return ResponseEvent::Usage {
            input_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage["completion_tokens"].as_u64().unwrap_or(0) as u32,
        };
    }

    let delta = &v["choices"][0]["delta"];

    // Tool call delta.  Each chunk carries one tool-call fragment; the index
    // field routes accumulation for parallel calls.
    if let Some(tc) = delta.get("tool_calls").and_then(|t| t.get(0)) {
        return ResponseEvent::ToolCall {
            index: tc["index"].as_u64().unwrap_or(0) as u32,
            id: tc["id"].as_str().unwrap_or("").to_string(),
            name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
            arguments: tc["function"]["arguments"].as_str().unwrap_or("").to_string(),
        };
    }

    if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
        return ResponseEvent::TextDelta(text.to_string());
    }

    ResponseEvent::TextDelta(String::new())
}

fn role_str(r: &Role) -> &'static str {
    match r {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Convert messages into the OpenAI wire-format JSON array.
///
/// Consecutive `ToolCall` messages are merged into a single assistant
/// message with a `tool_calls` array, which is what the parallel-tool-call
/// wire contract requires.
pub(crate) fn build_wire_messages(messages: &[crate::Message]) -> Vec<Value> {
    fn tool_call_json(tool_call_id: &str, function: &crate::FunctionCall) -> Value {
        json!({
            "id": tool_call_id,
            "type": "function",
            "function": {
                "name": function.name,
                "arguments": function.arguments,
            }
        })
    }

    let mut result: Vec<Value> = Vec::with_capacity(messages.len());
    let mut i = 0;

    while i < messages.len() {
        let m = &messages[i];

        if let MessageContent::ToolCall { tool_call_id, function } = &m.content {
            let mut calls = vec![tool_call_json(tool_call_id, function)];
            i += 1;
            while i < messages.len() {
                if let MessageContent::ToolCall { tool_call_id, function } = &messages[i].content {
                    calls.push(tool_call_json(tool_call_id, function));
                    i += 1;
                } else {
                    break;
                }
            }
            result.push(json!({ "role": "assistant", "tool_calls": calls }));
            continue;
        }

        let v = match &m.content {
            MessageContent::Text(t) => json!({
                "role": role_str(&m.role),
                "content": t,
            }),
            MessageContent::ToolResult { tool_call_id, content } => json!({
                "role": "tool",
                "tool_call_id": tool_call_id,
                "content": content,
            }),
            MessageContent::ToolCall { .. } => unreachable!("handled above"),
        };
        result.push(v);
        i += 1;
    }

    result
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn drain_handles_split_sse_lines() {
        let mut buf = String::new();
        buf.push_str("data: {\"choices\":[{\"delta\":{\"content\"");
        let events = drain_complete_sse_lines(&mut buf);
        assert!(events.is_empty(), "incomplete line must not emit");

        buf.push_str(":\"hi\"}}]}\n");
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        match events[0].as_ref().unwrap() {
            ResponseEvent::TextDelta(t) => assert_eq!(t, "hi"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn done_sentinel_parses() {
        let mut buf = "data: [DONE]\n".to_string();
        let events = drain_complete_sse_lines(&mut buf);
        assert!(matches!(events[0].as_ref().unwrap(), ResponseEvent::Done));
    }

    #[test]
    fn tool_call_chunk_parses() {
        let v: Value = serde_json::from_str(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1",
                "function":{"name":"read_file","arguments":"{\"path\":\"x\"}"}}]}}]}"#,
        )
        .unwrap();
        match parse_sse_chunk(&v) {
            ResponseEvent::ToolCall { id, name, arguments, .. } => {
                assert_eq!(id, "c1");
                assert_eq!(name, "read_file");
                assert!(arguments.contains("path"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn usage_chunk_parses() {
        let v: Value =
            serde_json::from_str(r#"{"usage":{"prompt_tokens":12,"completion_tokens":3}}"#)
                .unwrap();
        match parse_sse_chunk(&v) {
            ResponseEvent::Usage { input_tokens, output_tokens } => {
                assert_eq!(input_tokens, 12);
                assert_eq!(output_tokens, 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn consecutive_tool_calls_merge_into_one_assistant_message() {
        let msgs = vec![
            Message::user("go"),
            Message::tool_call("c1", "read_file", "{}"),
            Message::tool_call("c2", "list_files", "{}"),
            Message::tool_result("c1", "ok"),
        ];
        let wire = build_wire_messages(&msgs);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1]["role"], "assistant");
        assert_eq!(wire[1]["tool_calls"].as_array().unwrap().len(), 2);
        assert_eq!(wire[2]["role"], "tool");
        assert_eq!(wire[2]["tool_call_id"], "c1");
    }

    #[test]
    fn plain_messages_keep_their_roles() {
        let msgs = vec![Message::system("s"), Message::user("u"), Message::assistant("a")];
        let wire = build_wire_messages(&msgs);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[2]["role"], "assistant");
    }
}
