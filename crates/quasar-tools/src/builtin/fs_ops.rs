// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

pub struct DeleteFileTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file or directory. Non-empty directories are only removed \
         when recursive=true is passed explicitly."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Delete directories recursively (default false)"
                }
            },
            "required": ["path"],
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
        let recursive = call.args.get("recursive").and_then(|v| v.as_bool()).unwrap_or(false);

        debug!(path, recursive, "delete_file tool");

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if !full_path.exists() {
            return ToolOutput::err(&call.id, format!("Path not found: {path}"));
        }

        if full_path.is_file() {
            return match tokio::fs::remove_file(&full_path).await {
                Ok(()) => ToolOutput::json(
                    &call.id,
                    &json!({"success": true, "deleted": path, "type": "file"}),
                ),
                Err(e) => ToolOutput::err(&call.id, format!("Failed to delete: {e}")),
            };
        }

        // Directory
        if recursive {
            return match tokio::fs::remove_dir_all(&full_path).await {
                Ok(()) => ToolOutput::json(
                    &call.id,
                    &json!({"success": true, "deleted": path, "type": "directory"}),
                ),
                Err(e) => ToolOutput::err(&call.id, format!("Failed to delete: {e}")),
            };
        }
        let is_empty = match std::fs::read_dir(&full_path) {
            Ok(mut it) => it.next().is_none(),
            Err(e) => return ToolOutput::err(&call.id, format!("Failed to inspect dir: {e}")),
        };
        if !is_empty {
            return ToolOutput::err(
                &call.id,
                format!("Directory not empty: {path}. Set recursive=true to delete."),
            );
        }
        match tokio::fs::remove_dir(&full_path).await {
            Ok(()) => ToolOutput::json(
                &call.id,
                &json!({"success": true, "deleted": path, "type": "directory"}),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("Failed to delete: {e}")),
        }
    }
}

pub struct MoveFileTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for MoveFileTool {
    fn name(&self) -> &str {
        "move_file"
    }

    fn description(&self) -> &str {
        "Move or rename a file or directory within the workspace. Parent \
         directories of the destination are created as needed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": {
                    "type": "string",
                    "description": "Source path relative to the workspace"
                },
                "destination": {
                    "type": "string",
                    "description": "Destination path relative to the workspace"
                }
            },
            "required": ["source", "destination"],
            "additionalProperties": false
        })
    }

    fn mutates_files(&self) -> bool {
        true
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(source) = call.args.get("source").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'source'");
        };
        let Some(destination) = call.args.get("destination").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'destination'");
        };

        debug!(source, destination, "move_file tool");

        let source_path = match self.workspace.resolve(source) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, format!("Source: {e}")),
        };
        if !source_path.exists() {
            return ToolOutput::err(&call.id, format!("Source not found: {source}"));
        }
        let dest_path = match self.workspace.resolve(destination) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, format!("Destination: {e}")),
        };

        if let Some(parent) = dest_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolOutput::err(&call.id, format!("Failed to create parent dirs: {e}"));
            }
        }
        match tokio::fs::rename(&source_path, &dest_path).await {
            Ok(()) => ToolOutput::json(
                &call.id,
                &json!({
                    "success": true,
                    "source": source,
                    "destination": destination,
                }),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("Failed to move: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ws() -> (tempfile::TempDir, Arc<Workspace>) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Arc::new(Workspace::new(dir.path()));
        (dir, ws)
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall { id: "f1".into(), name: name.into(), args }
    }

    #[tokio::test]
    async fn deletes_a_file() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("gone.txt"), "x").unwrap();
        let t = DeleteFileTool { workspace: ws };
        let out = t.execute(&call("delete_file", json!({"path": "gone.txt"}))).await;
        assert!(!out.is_error, "{}", out.content);
        assert!(!dir.path().join("gone.txt").exists());
    }

    #[tokio::test]
    async fn refuses_non_empty_dir_without_recursive() {
        let (dir, ws) = ws();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        std::fs::write(dir.path().join("d/inner.txt"), "x").unwrap();
        let t = DeleteFileTool { workspace: ws };
        let out = t.execute(&call("delete_file", json!({"path": "d"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("recursive=true"));
        assert!(dir.path().join("d").exists());
    }

    #[tokio::test]
    async fn recursive_delete_removes_tree() {
        let (dir, ws) = ws();
        std::fs::create_dir_all(dir.path().join("d/e")).unwrap();
        std::fs::write(dir.path().join("d/e/x.txt"), "x").unwrap();
        let t = DeleteFileTool { workspace: ws };
        let out = t
            .execute(&call("delete_file", json!({"path": "d", "recursive": true})))
            .await;
        assert!(!out.is_error);
        assert!(!dir.path().join("d").exists());
    }

    #[tokio::test]
    async fn move_renames_file() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("a.txt"), "body").unwrap();
        let t = MoveFileTool { workspace: ws };
        let out = t
            .execute(&call("move_file", json!({"source": "a.txt", "destination": "sub/b.txt"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(std::fs::read_to_string(dir.path().join("sub/b.txt")).unwrap(), "body");
    }

    #[tokio::test]
    async fn move_then_move_back_restores_layout() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("a.txt"), "body").unwrap();
        let t = MoveFileTool { workspace: ws };
        let _ = t
            .execute(&call("move_file", json!({"source": "a.txt", "destination": "b.txt"})))
            .await;
        let out = t
            .execute(&call("move_file", json!({"source": "b.txt", "destination": "a.txt"})))
            .await;
        assert!(!out.is_error);
        assert!(dir.path().join("a.txt").exists());
        assert!(!dir.path().join("b.txt").exists());
    }

    #[tokio::test]
    async fn move_rejects_escaping_destination() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let t = MoveFileTool { workspace: ws };
        let out = t
            .execute(&call("move_file", json!({"source": "a.txt", "destination": "../out.txt"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("Destination"));
        assert!(dir.path().join("a.txt").exists());
    }
}
