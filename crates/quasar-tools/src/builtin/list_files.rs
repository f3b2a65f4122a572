// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use crate::builtin::is_ignored_dir;
use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::{detect_language, Workspace};

const MAX_FILES: usize = 100;
const MAX_DIRS: usize = 50;
const TREE_MAX_DEPTH: usize = 3;
const TREE_MAX_ENTRIES: usize = 500;

pub struct ListFilesTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories in a path. Results are capped at 100 \
         files and 50 directories; pass a more specific path when truncated."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the workspace (default: workspace root)"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "List recursively (default false)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = call.args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let recursive = call.args.get("recursive").and_then(|v| v.as_bool()).unwrap_or(false);

        debug!(path, recursive, "list_files tool");

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if !full_path.exists() {
            return ToolOutput::err(&call.id, format!("Path not found: {path}"));
        }
        if !full_path.is_dir() {
            return ToolOutput::err(&call.id, format!("Not a directory: {path}"));
        }

        let mut files = Vec::new();
        let mut directories = Vec::new();
        let mut truncated = false;

        let max_depth = if recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&full_path)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && is_ignored_dir(e.file_name())));

        for entry in walker.flatten() {
            let rel = entry
                .path()
                .strip_prefix(&full_path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            if entry.file_type().is_dir() {
                if directories.len() < MAX_DIRS {
                    directories.push(rel);
                } else {
                    truncated = true;
                }
            } else if entry.file_type().is_file() {
                if files.len() < MAX_FILES {
                    let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                    files.push(json!({
                        "path": rel.clone(),
                        "language": detect_language(&rel),
                        "size": size,
                    }));
                } else {
                    truncated = true;
                }
            }
        }
        directories.sort();
        let total_files = files.len();
        let total_directories = directories.len();

        let mut result = json!({
            "path": path,
            "files": files,
            "directories": directories,
            "total_files": total_files,
            "total_directories": total_directories,
            "truncated": truncated,
        });
        if truncated {
            result["hint"] = json!(format!(
                "Results limited to {MAX_FILES} files and {MAX_DIRS} directories. \
                 Use a more specific path to see more."
            ));
        }
        ToolOutput::json(&call.id, &result)
    }
}

pub struct TreeListTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for TreeListTool {
    fn name(&self) -> &str {
        "tree_list"
    }

    fn description(&self) -> &str {
        "Fast project-structure overview: a flattened directory tree up to \
         three levels deep, capped at 500 entries."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the workspace (default: workspace root)"
                },
                "max_depth": {
                    "type": "integer",
                    "description": "Maximum recursion depth (default 3, capped at 3)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = call.args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let max_depth = call
            .args
            .get("max_depth")
            .and_then(|v| v.as_u64())
            .map(|d| (d as usize).min(TREE_MAX_DEPTH))
            .unwrap_or(TREE_MAX_DEPTH);

        debug!(path, max_depth, "tree_list tool");

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if !full_path.is_dir() {
            return ToolOutput::err(&call.id, format!("Not a directory: {path}"));
        }

        let mut tree = Vec::new();
        let mut total = 0usize;
        scan(&full_path, &full_path, 1, max_depth, &mut tree, &mut total);

        ToolOutput::json(
            &call.id,
            &json!({
                "path": path,
                "tree": tree,
                "count": total,
                "truncated": total > TREE_MAX_ENTRIES,
            }),
        )
    }
}

fn scan(
    dir: &Path,
    root: &Path,
    depth: usize,
    max_depth: usize,
    tree: &mut Vec<String>,
    total: &mut usize,
) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        let rel = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().into_owned();
        let is_dir = path.is_dir();
        if is_dir && is_ignored_dir(&entry.file_name()) {
            continue;
        }
        *total += 1;
        if tree.len() < TREE_MAX_ENTRIES {
            if is_dir {
                tree.push(format!("{rel}/"));
            } else {
                tree.push(rel);
            }
        }
        if is_dir {
            scan(&path, root, depth + 1, max_depth, tree, total);
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
        ToolCall { id: "l1".into(), name: name.into(), args }
    }

    fn parse(out: &ToolOutput) -> Value {
        serde_json::from_str(&out.content).unwrap()
    }

    #[tokio::test]
    async fn lists_flat_directory() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("a.py"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let t = ListFilesTool { workspace: ws };
        let out = t.execute(&call("list_files", json!({}))).await;
        assert!(!out.is_error, "{}", out.content);
        let v = parse(&out);
        assert_eq!(v["total_files"], 1);
        assert_eq!(v["directories"][0], "sub");
        assert_eq!(v["truncated"], false);
    }

    #[tokio::test]
    async fn file_cap_sets_truncated_flag() {
        let (dir, ws) = ws();
        for i in 0..120 {
            std::fs::write(dir.path().join(format!("f{i:03}.txt")), "").unwrap();
        }
        let t = ListFilesTool { workspace: ws };
        let out = t.execute(&call("list_files", json!({}))).await;
        let v = parse(&out);
        assert_eq!(v["total_files"], 100);
        assert_eq!(v["truncated"], true);
        assert!(v["hint"].as_str().unwrap().contains("limited"));
    }

    #[tokio::test]
    async fn under_caps_is_not_truncated() {
        let (dir, ws) = ws();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), "").unwrap();
        }
        let t = ListFilesTool { workspace: ws };
        let out = t.execute(&call("list_files", json!({"recursive": true}))).await;
        let v = parse(&out);
        assert_eq!(v["truncated"], false);
        assert!(v.get("hint").is_none());
    }

    #[tokio::test]
    async fn recursive_skips_ignored_dirs() {
        let (dir, ws) = ws();
        std::fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        std::fs::write(dir.path().join(".git/objects/blob"), "").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        let t = ListFilesTool { workspace: ws };
        let out = t.execute(&call("list_files", json!({"recursive": true}))).await;
        let v = parse(&out);
        let files = v["files"].as_array().unwrap();
        assert!(files.iter().any(|f| f["path"] == "src/main.rs"));
        assert!(!files.iter().any(|f| f["path"].as_str().unwrap().contains(".git")));
    }

    #[tokio::test]
    async fn tree_respects_depth_cap() {
        let (dir, ws) = ws();
        std::fs::create_dir_all(dir.path().join("a/b/c/d")).unwrap();
        std::fs::write(dir.path().join("a/b/c/d/deep.txt"), "").unwrap();
        let t = TreeListTool { workspace: ws };
        let out = t.execute(&call("tree_list", json!({"max_depth": 9}))).await;
        let v = parse(&out);
        let tree: Vec<&str> = v["tree"].as_array().unwrap().iter().map(|s| s.as_str().unwrap()).collect();
        assert!(tree.contains(&"a/b/c/"), "{tree:?}");
        assert!(!tree.iter().any(|e| e.contains("deep.txt")), "depth cap ignored: {tree:?}");
    }

    #[tokio::test]
    async fn listing_a_file_is_an_error() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("f.txt"), "").unwrap();
        let t = ListFilesTool { workspace: ws };
        let out = t.execute(&call("list_files", json!({"path": "f.txt"}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("Not a directory"));
    }
}
