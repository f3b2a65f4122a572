// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput};
use crate::workspace::{detect_language, Workspace};

/// Files above this line count return metadata only; the model is expected
/// to follow up with `read_file_chunk` for the ranges it needs.
const MAX_LINES: usize = 2000;

/// Chunk size suggested in the large-file hint.
const SUGGESTED_CHUNK: usize = 500;

pub struct ReadFileTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the workspace. For large files \
         (>2000 lines) this returns metadata only; use read_file_chunk with \
         explicit line ranges to read sections of those."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the workspace (e.g. \"src/main.py\")"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::FileContent
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(path) = call.args.get("path").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'path'");
        };
        debug!(path, "read_file tool");

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if !full_path.exists() {
            return ToolOutput::err(&call.id, format!("File not found: {path}"));
        }
        if !full_path.is_file() {
            return ToolOutput::err(&call.id, format!("Not a file: {path}"));
        }

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(&call.id, format!("Failed to read file: {e}")),
        };
        let line_count = content.split('\n').count();
        let size_bytes = content.len();

        if line_count > MAX_LINES {
            return ToolOutput::json(
                &call.id,
                &json!({
                    "path": path,
                    "language": detect_language(path),
                    "lines": line_count,
                    "size_bytes": size_bytes,
                    "is_large_file": true,
                    "hint": format!(
                        "File has {line_count} lines. Use read_file_chunk(path, start_line, \
                         end_line) to read specific sections. Recommended chunk size: \
                         {SUGGESTED_CHUNK} lines."
                    ),
                }),
            );
        }

        ToolOutput::json(
            &call.id,
            &json!({
                "content": content,
                "path": path,
                "language": detect_language(path),
                "lines": line_count,
                "size_bytes": size_bytes,
            }),
        )
    }
}

pub struct ReadFileChunkTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for ReadFileChunkTool {
    fn name(&self) -> &str {
        "read_file_chunk"
    }

    fn description(&self) -> &str {
        "Read a specific chunk of a file by line numbers (1-indexed, \
         inclusive). Use this for large files that exceed the read_file limit."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the workspace"
                },
                "start_line": {
                    "type": "integer",
                    "description": "Starting line number (1-indexed, inclusive; default 1)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Ending line number (1-indexed, inclusive; default 500)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::FileContent
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(path) = call.args.get("path").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'path'");
        };
        let mut start_line =
            call.args.get("start_line").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
        let mut end_line = call
            .args
            .get("end_line")
            .and_then(|v| v.as_u64())
            .unwrap_or(SUGGESTED_CHUNK as u64) as usize;

        debug!(path, start_line, end_line, "read_file_chunk tool");

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if !full_path.exists() {
            return ToolOutput::err(&call.id, format!("File not found: {path}"));
        }
        if !full_path.is_file() {
            return ToolOutput::err(&call.id, format!("Not a file: {path}"));
        }

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(&call.id, format!("Failed to read file chunk: {e}")),
        };
        let lines: Vec<&str> = content.split('\n').collect();
        let total_lines = lines.len();

        if start_line < 1 {
            start_line = 1;
        }
        if end_line > total_lines {
            end_line = total_lines;
        }
        if start_line > end_line {
            return ToolOutput::err(
                &call.id,
                format!("Invalid range: start_line ({start_line}) > end_line ({end_line})"),
            );
        }

        let chunk: Vec<&str> = lines[start_line - 1..end_line].to_vec();
        ToolOutput::json(
            &call.id,
            &json!({
                "content": chunk.join("\n"),
                "path": path,
                "language": detect_language(path),
                "start_line": start_line,
                "end_line": end_line,
                "lines_in_chunk": chunk.len(),
                "total_lines": total_lines,
                "has_more_before": start_line > 1,
                "has_more_after": end_line < total_lines,
            }),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
