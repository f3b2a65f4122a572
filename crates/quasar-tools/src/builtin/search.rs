// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;
use walkdir::WalkDir;

use crate::builtin::is_ignored_dir;
use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

const GREP_MAX_HITS: usize = 100;

pub struct SearchFilesTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search for a text pattern in files matched by a glob pattern \
         (e.g. \"*.py\"). Returns file, line number and the matching line."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to search for"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Glob for file names, e.g. \"*.py\" (default: all files)"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: workspace root)"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(query) = call.args.get("query").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'query'");
        };
        let file_pattern = call.args.get("file_pattern").and_then(|v| v.as_str()).unwrap_or("*");
        let path = call.args.get("path").and_then(|v| v.as_str()).unwrap_or(".");

        debug!(query, file_pattern, path, "search_files tool");

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if !full_path.exists() {
            return ToolOutput::err(&call.id, format!("Path not found: {path}"));
        }

        let mut matches = Vec::new();
        let walker = WalkDir::new(&full_path)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && is_ignored_dir(e.file_name())));

        for entry in walker.flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !glob_match(file_pattern, &name) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let rel = entry
                .path()
                .strip_prefix(&full_path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            for (line_num, line) in content.lines().enumerate() {
                if line.contains(query) {
                    matches.push(json!({
                        "file": rel,
                        "line": line_num + 1,
                        "content": line.trim(),
                    }));
                }
            }
        }

        let total = matches.len();
        ToolOutput::json(
            &call.id,
            &json!({
                "query": query,
                "pattern": file_pattern,
                "matches": matches,
                "total_matches": total,
            }),
        )
    }
}

pub struct GrepSearchTool {
    pub workspace: Arc<Workspace>,
}

#[async_trait]
impl Tool for GrepSearchTool {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn description(&self) -> &str {
        "High-performance text search using the system grep (ripgrep when \
         available). Results are capped at 100 hits."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: workspace root)"
                },
                "include_pattern": {
                    "type": "string",
                    "description": "Optional file glob, e.g. \"*.py\""
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(query) = call.args.get("query").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'query'");
        };
        let path = call.args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let include = call.args.get("include_pattern").and_then(|v| v.as_str());

        debug!(query, path, "grep_search tool");

        let full_path = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };

        // Prefer ripgrep; fall back to POSIX grep -rn.
        let output = if command_exists("rg") {
            let mut cmd = Command::new("rg");
            cmd.arg("--line-number").arg("--no-heading").arg("--fixed-strings");
            if let Some(glob) = include {
                cmd.arg("--glob").arg(glob);
            }
            cmd.arg(query).arg(".").current_dir(&full_path);
            cmd.output().await
        } else {
            let mut cmd = Command::new("grep");
            cmd.arg("-rn").arg("-F");
            if let Some(glob) = include {
                cmd.arg(format!("--include={glob}"));
            }
            cmd.arg(query).arg(".").current_dir(&full_path);
            cmd.output().await
        };

        let output = match output {
            Ok(o) => o,
            Err(e) => return ToolOutput::err(&call.id, format!("Grep search failed: {e}")),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut matches = Vec::new();
        for line in stdout.lines() {
            // format: path:line:content
            let mut parts = line.splitn(3, ':');
            let (Some(file), Some(line_no), Some(content)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let file = file.trim_start_matches("./");
            if file.split('/').any(|seg| is_ignored_dir(std::ffi::OsStr::new(seg))) {
                continue;
            }
            let Ok(line_no) = line_no.parse::<u64>() else {
                continue;
            };
            if matches.len() < GREP_MAX_HITS {
                matches.push(json!({
                    "file": file,
                    "line": line_no,
                    "content": content.trim(),
                }));
            }
        }

        let total = stdout.lines().count();
        ToolOutput::json(
            &call.id,
            &json!({
                "query": query,
                "matches": matches,
                "total_matches": total,
                "truncated": total > GREP_MAX_HITS,
            }),
        )
    }
}

/// Minimal glob matching: `*` matches any run of characters, `?` matches a
/// single character.  Enough for the `*.py`-style patterns tools receive.
pub(crate) fn glob_match(pattern: &str, name: &str) -> bool {
    fn inner(p: &[char], n: &[char]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                inner(&p[1..], n) || (!n.is_empty() && inner(p, &n[1..]))
            }
            (Some('?'), Some(_)) => inner(&p[1..], &n[1..]),
            (Some(pc), Some(nc)) if pc == nc => inner(&p[1..], &n[1..]),
            _ => false,
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    inner(&p, &n)
}

fn command_exists(cmd: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(cmd).is_file())
        })
        .unwrap_or(false)
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
        ToolCall { id: "s1".into(), name: name.into(), args }
    }

    #[test]
    fn glob_star_matches_extension() {
        assert!(glob_match("*.py", "main.py"));
        assert!(!glob_match("*.py", "main.rs"));
        assert!(glob_match("*", "anything.txt"));
        assert!(glob_match("test_?.py", "test_a.py"));
        assert!(!glob_match("test_?.py", "test_ab.py"));
    }

    #[tokio::test]
    async fn search_finds_matches_with_line_numbers() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("a.py"), "x = 1\nneedle here\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "needle in rust\n").unwrap();
        let t = SearchFilesTool { workspace: ws };
        let out = t
            .execute(&call("search_files", json!({"query": "needle", "file_pattern": "*.py"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(v["total_matches"], 1);
        assert_eq!(v["matches"][0]["file"], "a.py");
        assert_eq!(v["matches"][0]["line"], 2);
    }

    #[tokio::test]
    async fn search_skips_ignored_dirs() {
        let (dir, ws) = ws();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/x.js"), "needle\n").unwrap();
        std::fs::write(dir.path().join("main.js"), "needle\n").unwrap();
        let t = SearchFilesTool { workspace: ws };
        let out = t.execute(&call("search_files", json!({"query": "needle"}))).await;
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(v["total_matches"], 1);
        assert_eq!(v["matches"][0]["file"], "main.js");
    }

    #[tokio::test]
    async fn grep_search_finds_content() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("code.py"), "alpha\nbeta marker\n").unwrap();
        let t = GrepSearchTool { workspace: ws };
        let out = t.execute(&call("grep_search", json!({"query": "beta marker"}))).await;
        assert!(!out.is_error, "{}", out.content);
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(v["matches"][0]["file"], "code.py");
        assert_eq!(v["matches"][0]["line"], 2);
    }

    #[tokio::test]
    async fn search_rejects_escaping_path() {
        let (_dir, ws) = ws();
        let t = SearchFilesTool { workspace: ws };
        let out = t
            .execute(&call("search_files", json!({"query": "x", "path": "../.."})))
            .await;
        assert!(out.is_error);
    }
}
