// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

/// The result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    /// Plain-text content consumable by the model.
    pub content: String,
    /// If true, the tool execution failed non-fatally (content carries the
    /// error message).
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful plain-text result.
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: content.into(), is_error: false }
    }

    /// Error result containing a plain-text error message.
    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { call_id: call_id.into(), content: msg.into(), is_error: true }
    }

    /// Successful structured result, rendered as pretty JSON.
    pub fn json(call_id: impl Into<String>, value: &Value) -> Self {
        let content = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::ok(call_id, content)
    }
}

/// Describes the shape of a tool's output so the executor can apply the
/// right truncation cap: file content gets a larger allowance than other
/// structured results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCategory {
    /// File content — capped at the file allowance.
    FileContent,
    /// Everything else — capped at the generic allowance.
    #[default]
    Generic,
}

/// Trait every built-in tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;
    /// Output shape for context-aware truncation.
    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }
    /// True for tools that create, change, move or delete files.  The
    /// orchestrator emits a file-tree refresh event after these succeed.
    fn mutates_files(&self) -> bool {
        false
    }
    /// Execute the tool.  Failures are reported through [`ToolOutput::err`].
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ok_and_err_set_flags() {
        let ok = ToolOutput::ok("c1", "fine");
        assert!(!ok.is_error);
        let err = ToolOutput::err("c1", "broken");
        assert!(err.is_error);
        assert_eq!(err.content, "broken");
    }

    #[test]
    fn json_output_is_pretty_printed() {
        let out = ToolOutput::json("c1", &json!({"success": true, "path": "a.py"}));
        assert!(!out.is_error);
        assert!(out.content.contains("\"success\": true"));
    }

    #[test]
    fn default_category_is_generic() {
        assert_eq!(OutputCategory::default(), OutputCategory::Generic);
    }
}
