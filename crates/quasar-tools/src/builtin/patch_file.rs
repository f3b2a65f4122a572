// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

pub struct PatchFileTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Patch a file by finding and replacing exact text. Use this for \
         targeted edits instead of rewriting the whole file. occurrence \
         selects which match to replace (1 = first); occurrence=0 replaces \
         all matches."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the workspace"
                },
                "find_text": {
                    "type": "string",
                    "description": "Exact text to find, including whitespace and newlines"
                },
                "replace_text": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "occurrence": {
                    "type": "integer",
                    "description": "Which occurrence to replace (1 = first, 0 = all; default 1)"
                }
            },
            "required": ["path", "find_text", "replace_text"],
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
        let Some(find_text) = call.args.get("find_text").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'find_text'");
        };
        let Some(replace_text) = call.args.get("replace_text").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'replace_text'");
        };
        let occurrence = call.args.get("occurrence").and_then(|v| v.as_u64()).unwrap_or(1) as usize;

        debug!(path, occurrence, "patch_file tool");

        if find_text.is_empty() {
            return ToolOutput::err(&call.id, "find_text must not be empty");
        }

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if !full_path.exists() {
            return ToolOutput::err(&call.id, format!("File not found: {path}"));
        }

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolOutput::err(&call.id, format!("Failed to read file: {e}")),
        };

        let count = content.matches(find_text).count();
        if count == 0 {
            return ToolOutput::err(
                &call.id,
                "Text not found in file. Check for extra spaces, newlines, or typos.",
            );
        }

        let (new_content, replaced) = if occurrence == 0 {
            (content.replace(find_text, replace_text), count)
        } else {
            if occurrence > count {
                return ToolOutput::err(
                    &call.id,
                    format!("Only {count} occurrence(s) found, requested occurrence {occurrence}"),
                );
            }
            let idx = content
                .match_indices(find_text)
                .nth(occurrence - 1)
                .map(|(i, _)| i)
                .expect("occurrence bounds checked above");
            let mut s = String::with_capacity(content.len());
            s.push_str(&content[..idx]);
            s.push_str(replace_text);
            s.push_str(&content[idx + find_text.len()..]);
            (s, 1)
        };

        if let Err(e) = tokio::fs::write(&full_path, &new_content).await {
            return ToolOutput::err(&call.id, format!("Failed to patch file: {e}"));
        }

        ToolOutput::json(
            &call.id,
            &json!({
                "success": true,
                "path": path,
                "replacements": replaced,
                "occurrences_found": count,
            }),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fixture_ws(content: &str) -> (tempfile::TempDir, Arc<Workspace>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), content).unwrap();
        let ws = Arc::new(Workspace::new(dir.path()));
        (dir, ws)
    }

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "p1".into(), name: "patch_file".into(), args }
    }

    #[tokio::test]
    async fn replaces_first_occurrence_by_default() {
        let (dir, ws) = fixture_ws("a = 1\na = 1\n");
        let t = PatchFileTool { workspace: ws };
        let out = t
            .execute(&call(json!({"path": "f.txt", "find_text": "a = 1", "replace_text": "a = 2"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "a = 2\na = 1\n"
        );
    }

    #[tokio::test]
    async fn occurrence_zero_replaces_all() {
        let (dir, ws) = fixture_ws("x x x");
        let t = PatchFileTool { workspace: ws };
        let out = t
            .execute(&call(json!({
                "path": "f.txt", "find_text": "x", "replace_text": "y", "occurrence": 0
            })))
            .await;
        assert!(!out.is_error);
        let v: serde_json::Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(v["replacements"], 3);
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "y y y");
    }

    #[tokio::test]
    async fn nth_occurrence_is_selected() {
        let (dir, ws) = fixture_ws("k k k");
        let t = PatchFileTool { workspace: ws };
        let out = t
            .execute(&call(json!({
                "path": "f.txt", "find_text": "k", "replace_text": "Z", "occurrence": 2
            })))
            .await;
        assert!(!out.is_error);
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "k Z k");
    }

    #[tokio::test]
    async fn missing_text_gives_hint() {
        let (_dir, ws) = fixture_ws("hello");
        let t = PatchFileTool { workspace: ws };
        let out = t
            .execute(&call(json!({"path": "f.txt", "find_text": "bye", "replace_text": "x"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("Text not found"));
    }

    #[tokio::test]
    async fn occurrence_out_of_range_is_error() {
        let (_dir, ws) = fixture_ws("one match");
        let t = PatchFileTool { workspace: ws };
        let out = t
            .execute(&call(json!({
                "path": "f.txt", "find_text": "match", "replace_text": "x", "occurrence": 3
            })))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("Only 1 occurrence"));
    }

    #[tokio::test]
    async fn patch_then_inverse_patch_restores_original() {
        let original = "fn alpha() {}\n";
        let (dir, ws) = fixture_ws(original);
        let t = PatchFileTool { workspace: ws };
        let _ = t
            .execute(&call(json!({
                "path": "f.txt", "find_text": "alpha", "replace_text": "beta", "occurrence": 1
            })))
            .await;
        let _ = t
            .execute(&call(json!({
                "path": "f.txt", "find_text": "beta", "replace_text": "alpha", "occurrence": 1
            })))
            .await;
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), original);
    }
}
