// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// A single message in the conversation sent to a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: Role::System, content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: MessageContent::Text(text.into()) }
    }

    pub fn tool_result(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult {
                tool_call_id: id.into(),
                content: content.into(),
            },
        }
    }

    /// The assistant message recording a tool invocation request.
    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolCall {
                tool_call_id: id.into(),
                function: FunctionCall { name: name.into(), arguments: arguments.into() },
            },
        }
    }

    /// Plain text of this message, when it carries exactly that.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message payload variants.
///
/// - `Text` – plain content (most messages)
/// - `ToolCall` – the assistant requests a tool invocation
/// - `ToolResult` – the outcome of a tool call, fed back to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    ToolCall {
        tool_call_id: String,
        function: FunctionCall,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object
    pub arguments: String,
}

/// A tool advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: serde_json::Value,
}

/// Request sent to a model provider.  Binding tools to a model means
/// populating `tools`; providers translate the schemas into their own wire
/// format.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages, tools: Vec::new(), stream: true }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }
}

/// A single streamed event from the model.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// A text delta streamed from the model
    TextDelta(String),
    /// The model wants to call a tool.  Arguments may arrive across several
    /// deltas; `index` routes accumulation for parallel tool calls.
    ToolCall {
        index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    /// Final usage statistics
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    /// The stream finished normally
    Done,
    /// A recoverable error (non-fatal warning)
    Error(String),
}

/// A tool invocation requested by the model, with arguments already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// One collected model turn: the full text plus any tool-call requests.
#[derive(Debug, Clone, Default)]
pub struct AssistantTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantTurn {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
        assert_eq!(Message::tool_result("id", "out").role, Role::Tool);
    }

    #[test]
    fn as_text_only_for_plain_content() {
        assert_eq!(Message::user("hi").as_text(), Some("hi"));
        assert!(Message::tool_result("id", "out").as_text().is_none());
        assert!(Message::tool_call("id", "read_file", "{}").as_text().is_none());
    }

    #[test]
    fn message_serialises_and_deserialises() {
        let original = Message::user("payload");
        let json = serde_json::to_string(&original).unwrap();
        let decoded: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.role, Role::User);
        assert_eq!(decoded.as_text(), Some("payload"));
    }

    #[test]
    fn assistant_turn_reports_tool_calls() {
        let mut turn = AssistantTurn::default();
        assert!(!turn.has_tool_calls());
        turn.tool_calls.push(ToolCallRequest {
            id: "1".into(),
            name: "read_file".into(),
            args: serde_json::json!({"path": "a.py"}),
        });
        assert!(turn.has_tool_calls());
    }
}
