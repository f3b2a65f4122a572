// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::{detect_language, Workspace};

pub struct CreateFileTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create a new file with the given content. Refuses to overwrite an \
         existing file unless overwrite=true is passed explicitly. Parent \
         directories are created as needed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "File content to write"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Replace an existing file (default false)"
                }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    fn mutates_files(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(path) = call.args.get("path").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'path'");
        };
        let Some(content) = call.args.get("content").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'content'");
        };
        let overwrite = call.args.get("overwrite").and_then(|v| v.as_bool()).unwrap_or(false);

        debug!(path, overwrite, "create_file tool");

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };

        if full_path.exists() && !overwrite {
            return ToolOutput::err(
                &call.id,
                format!(
                    "File already exists: {path}. Use overwrite=true to replace it, \
                     or choose a different filename."
                ),
            );
        }

        if let Some(parent) = full_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolOutput::err(&call.id, format!("Failed to create parent dirs: {e}"));
            }
        }
        if let Err(e) = tokio::fs::write(&full_path, content).await {
            return ToolOutput::err(&call.id, format!("Failed to create file: {e}"));
        }

        ToolOutput::json(
            &call.id,
            &json!({
                "success": true,
                "path": path,
                "language": detect_language(path),
                "lines": content.split('\n').count(),
                "size_bytes": content.len(),
            }),
        )
    }
}

pub struct ModifyFileTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for ModifyFileTool {
    fn name(&self) -> &str {
        "modify_file"
    }

    fn description(&self) -> &str {
        "Replace the entire content of an existing file. Prefer patch_file \
         for targeted edits; use this only when rewriting the whole file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "New file content"
                },
                "create_backup": {
                    "type": "boolean",
                    "description": "Write a .bak copy before modifying (default false)"
                }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    fn mutates_files(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(path) = call.args.get("path").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'path'");
        };
        let Some(content) = call.args.get("content").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'content'");
        };
        let create_backup =
            call.args.get("create_backup").and_then(|v| v.as_bool()).unwrap_or(false);

        debug!(path, "modify_file tool");

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if !full_path.exists() {
            return ToolOutput::err(&call.id, format!("File not found: {path}"));
        }

        let mut backup_path = None;
        if create_backup {
            let bak = full_path.with_extension(format!(
                "{}.bak",
                full_path.extension().and_then(|e| e.to_str()).unwrap_or("")
            ));
            if let Err(e) = tokio::fs::copy(&full_path, &bak).await {
                return ToolOutput::err(&call.id, format!("Failed to create backup: {e}"));
            }
            backup_path = Some(self.workspace.display(&bak));
        }

        if let Err(e) = tokio::fs::write(&full_path, content).await {
            return ToolOutput::err(&call.id, format!("Failed to modify file: {e}"));
        }

        let mut result = json!({
            "success": true,
            "path": path,
            "lines": content.split('\n').count(),
            "size_bytes": content.len(),
        });
        if let Some(bak) = backup_path {
            result["backup_path"] = json!(bak);
        }
        ToolOutput::json(&call.id, &result)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
