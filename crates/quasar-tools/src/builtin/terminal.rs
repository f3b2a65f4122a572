// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Terminal tools: shell execution rooted at the workspace, with a rolling
//! output buffer shared across the session.
//!
//! Commands run with the workspace as CWD.  When a local virtual-environment
//! directory is present its bin directory is prepended to `PATH`, so
//! `python` / `pip` resolve to the project environment.  Subprocesses are
//! killed on timeout.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

const MAX_BUFFER_LINES: usize = 500;
const MAX_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Destructive command shapes that are never executed.
const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -fr /",
    "mkfs",
    "format ",
    "del /s /q",
    ":(){:|:&};:",
    "shutdown",
    "reboot",
];

/// Rolling buffer of recent terminal output, shared between the execution
/// tools (writers) and `get_terminal_buffer` (reader).
#[derive(Clone, Default)]
pub struct TerminalBuffer {
    inner: Arc<Mutex<VecDeque<String>>>,
}

impl TerminalBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, text: &str) {
        let mut buf = self.inner.lock().expect("terminal buffer poisoned");
        for line in text.split('\n') {
            buf.push_back(line.to_string());
        }
        while buf.len() > MAX_BUFFER_LINES {
            buf.pop_front();
        }
    }

    pub fn recent(&self, lines: usize) -> String {
        let buf = self.inner.lock().expect("terminal buffer poisoned");
        let start = buf.len().saturating_sub(lines);
        buf.iter().skip(start).cloned().collect::<Vec<_>>().join("\n")
    }

    pub fn clear(&self) {
        self.inner.lock().expect("terminal buffer poisoned").clear();
    }
}

fn is_dangerous(command: &str) -> bool {
    let lower = command.to_lowercase();
    DANGEROUS_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Prepend the workspace virtual environment to PATH when one exists.
fn venv_env(workspace: &Path) -> Vec<(String, String)> {
    for venv_name in [".venv", "venv"] {
        for bin_dir in ["bin", "Scripts"] {
            let candidate = workspace.join(venv_name).join(bin_dir);
            if candidate.is_dir() {
                let old = std::env::var("PATH").unwrap_or_default();
                return vec![
                    ("PATH".into(), format!("{}:{old}", candidate.display())),
                    ("VIRTUAL_ENV".into(), workspace.join(venv_name).display().to_string()),
                ];
            }
        }
    }
    Vec::new()
}

/// Run a shell command in the workspace and capture its output.
async fn run_command(
    command: &str,
    workspace: &Path,
    timeout: Duration,
    buffer: &TerminalBuffer,
) -> Value {
    debug!(cmd = %command, "running command");

    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(workspace).kill_on_drop(true);
    for (k, v) in venv_env(workspace) {
        cmd.env(k, v);
    }

    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&stderr);
            }
            buffer.push_output(&text);
            let exit_code = output.status.code().unwrap_or(-1);
            json!({
                "success": output.status.success(),
                "output": text,
                "exit_code": exit_code,
                "command": command,
            })
        }
        Ok(Err(e)) => json!({
            "success": false,
            "output": format!("spawn error: {e}"),
            "exit_code": -1,
            "command": command,
        }),
        Err(_) => {
            warn!(cmd = %command, "command timed out");
            json!({
                "success": false,
                "output": format!("Command timed out after {} seconds", timeout.as_secs()),
                "exit_code": -1,
                "command": command,
            })
        }
    }
}

fn result_output(call: &ToolCall, result: Value) -> ToolOutput {
    let success = result["success"].as_bool().unwrap_or(false);
    let content =
        serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.to_string());
    if success {
        ToolOutput::ok(&call.id, content)
    } else {
        ToolOutput::err(&call.id, content)
    }
}

pub struct RunTerminalCommandTool {
    pub workspace: Arc<Workspace>,
    pub buffer: TerminalBuffer,
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for RunTerminalCommandTool {
    fn name(&self) -> &str {
        "run_terminal_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace directory. The project \
         virtual environment is activated when present. Only use this when \
         the user explicitly asked for execution; otherwise prefer \
         suggest_command."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Maximum seconds to wait (default 30)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(command) = call.args.get("command").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'command'");
        };
        let timeout = call
            .args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.default_timeout_secs)
            .min(MAX_COMMAND_TIMEOUT_SECS);

        if is_dangerous(command) {
            warn!(cmd = %command, "blocked dangerous command");
            return ToolOutput::err(&call.id, "Blocked: potentially dangerous command");
        }

        let result = run_command(
            command,
            self.workspace.root(),
            Duration::from_secs(timeout),
            &self.buffer,
        )
        .await;
        result_output(call, result)
    }
}

pub struct RunScriptFileTool {
    pub workspace: Arc<Workspace>,
    pub buffer: TerminalBuffer,
}

#[async_trait]
impl Tool for RunScriptFileTool {
    fn name(&self) -> &str {
        "run_script_file"
    }

    fn description(&self) -> &str {
        "Execute a script file from the workspace. The interpreter is chosen \
         by extension (.py, .js, .sh, .rb)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Script path relative to the workspace"
                },
                "args": {
                    "type": "string",
                    "description": "Command line arguments (default none)"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Maximum seconds to wait (default 60)"
                }
            },
            "required": ["file_path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(file_path) = call.args.get("file_path").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'file_path'");
        };
        let args = call.args.get("args").and_then(|v| v.as_str()).unwrap_or("");
        let timeout = call
            .args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(60)
            .min(MAX_COMMAND_TIMEOUT_SECS);

        let full_path = match self.workspace.resolve(file_path) {
            Ok(p) => p,
            Err(e) => return ToolOutput::err(&call.id, e.to_string()),
        };
        if !full_path.is_file() {
            return ToolOutput::err(&call.id, format!("File not found: {file_path}"));
        }

        let ext = full_path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let interpreter = match ext {
            "py" => "python3 -u",
            "js" => "node",
            "sh" => "sh",
            "rb" => "ruby",
            other => {
                return ToolOutput::err(
                    &call.id,
                    format!("Unsupported script extension: .{other}"),
                )
            }
        };
        let command = format!("{interpreter} \"{file_path}\" {args}");
        let result = run_command(
            command.trim(),
            self.workspace.root(),
            Duration::from_secs(timeout),
            &self.buffer,
        )
        .await;
        result_output(call, result)
    }
}

pub struct RunPackageCommandTool {
    pub workspace: Arc<Workspace>,
    pub buffer: TerminalBuffer,
}

#[async_trait]
impl Tool for RunPackageCommandTool {
    fn name(&self) -> &str {
        "run_package_command"
    }

    fn description(&self) -> &str {
        "Run a package-manager command (pip, npm or cargo) in the workspace. \
         Installs get an extended timeout."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "manager": {
                    "type": "string",
                    "description": "Package manager: pip, npm or cargo (default pip)"
                },
                "action": {
                    "type": "string",
                    "description": "Action, e.g. install, uninstall, list"
                },
                "packages": {
                    "type": "string",
                    "description": "Package names, space separated"
                }
            },
            "required": ["action"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let manager = call.args.get("manager").and_then(|v| v.as_str()).unwrap_or("pip");
        let Some(action) = call.args.get("action").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'action'");
        };
        let packages = call.args.get("packages").and_then(|v| v.as_str()).unwrap_or("");

        let valid: &[&str] = match manager {
            "pip" => &["install", "uninstall", "list", "show", "freeze"],
            "npm" => &["install", "uninstall", "list", "audit"],
            "cargo" => &["add", "remove", "build", "check", "test"],
            other => {
                return ToolOutput::err(&call.id, format!("Unsupported package manager: {other}"))
            }
        };
        if !valid.contains(&action) {
            return ToolOutput::err(
                &call.id,
                format!("Invalid action '{action}' for {manager}. Valid: {}", valid.join(", ")),
            );
        }
        let needs_packages = matches!(action, "install" | "uninstall" | "show" | "add" | "remove");
        if needs_packages && packages.is_empty() {
            return ToolOutput::err(&call.id, format!("Packages required for {action}"));
        }

        let command = if packages.is_empty() {
            format!("{manager} {action}")
        } else {
            format!("{manager} {action} {packages}")
        };
        let timeout = if action == "install" { 180 } else { 120 };
        let result = run_command(
            &command,
            self.workspace.root(),
            Duration::from_secs(timeout),
            &self.buffer,
        )
        .await;
        result_output(call, result)
    }
}

pub struct SuggestCommandTool;

#[async_trait]
impl Tool for SuggestCommandTool {
    fn name(&self) -> &str {
        "suggest_command"
    }

    fn description(&self) -> &str {
        "Suggest a terminal command for the user to run manually. USE THIS BY \
         DEFAULT instead of executing commands; only run_terminal_command \
         when the user explicitly asked for execution."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to suggest"
                },
                "description": {
                    "type": "string",
                    "description": "What the command does"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(command) = call.args.get("command").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'command'");
        };
        let description = call
            .args
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Run this command in your terminal");

        ToolOutput::json(
            &call.id,
            &json!({
                "success": true,
                "type": "suggested_command",
                "command": command,
                "description": description,
                "message": format!("Please run this command in your terminal:\n```\n{command}\n```"),
            }),
        )
    }
}

pub struct GetTerminalBufferTool {
    pub buffer: TerminalBuffer,
}

#[async_trait]
impl Tool for GetTerminalBufferTool {
    fn name(&self) -> &str {
        "get_terminal_buffer"
    }

    fn description(&self) -> &str {
        "Return recent terminal output captured from commands run this \
         session."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "lines": {
                    "type": "integer",
                    "description": "Number of recent lines to return (default 50)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let lines = call.args.get("lines").and_then(|v| v.as_u64()).unwrap_or(50) as usize;
        let output = self.buffer.recent(lines);
        let lower = output.to_lowercase();
        let has_error = ["error:", "exception:", "traceback", "failed", "exit code: 1"]
            .iter()
            .any(|p| lower.contains(p));
        ToolOutput::json(
            &call.id,
            &json!({
                "output": output,
                "lines": lines,
                "has_error": has_error,
            }),
        )
    }
}

pub struct ClearTerminalBufferTool {
    pub buffer: TerminalBuffer,
}

#[async_trait]
impl Tool for ClearTerminalBufferTool {
    fn name(&self) -> &str {
        "clear_terminal_buffer"
    }

    fn description(&self) -> &str {
        "Clear the captured terminal output buffer."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        self.buffer.clear();
        ToolOutput::json(&call.id, &json!({"success": true, "message": "Terminal buffer cleared"}))
    }
}

pub struct CheckCommandAvailableTool;

#[async_trait]
impl Tool for CheckCommandAvailableTool {
    fn name(&self) -> &str {
        "check_command_available"
    }

    fn description(&self) -> &str {
        "Check whether a command is available on PATH (e.g. python, node, git)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command name to look up"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(command) = call.args.get("command").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'command'");
        };
        match find_in_path(command) {
            Some(path) => ToolOutput::json(
                &call.id,
                &json!({
                    "available": true,
                    "command": command,
                    "path": path.display().to_string(),
                }),
            ),
            None => ToolOutput::json(
                &call.id,
                &json!({
                    "available": false,
                    "command": command,
                    "message": format!("Command '{command}' not found in PATH"),
                }),
            ),
        }
    }
}

fn find_in_path(command: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
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
        ToolCall { id: "t1".into(), name: name.into(), args }
    }

    fn terminal(ws: Arc<Workspace>) -> RunTerminalCommandTool {
        RunTerminalCommandTool { workspace: ws, buffer: TerminalBuffer::new(), default_timeout_secs: 30 }
    }

    #[tokio::test]
    async fn echo_captures_stdout() {
        let (_dir, ws) = ws();
        let t = terminal(ws);
        let out = t
            .execute(&call("run_terminal_command", json!({"command": "echo hello"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(v["exit_code"], 0);
        assert!(v["output"].as_str().unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_error_with_exit_code() {
        let (_dir, ws) = ws();
        let t = terminal(ws);
        let out = t
            .execute(&call("run_terminal_command", json!({"command": "exit 3"})))
            .await;
        assert!(out.is_error);
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(v["exit_code"], 3);
    }

    #[tokio::test]
    async fn dangerous_command_is_blocked() {
        let (_dir, ws) = ws();
        let t = terminal(ws);
        for cmd in ["rm -rf /", "sudo shutdown now", ":(){:|:&};:"] {
            let out = t
                .execute(&call("run_terminal_command", json!({"command": cmd})))
                .await;
            assert!(out.is_error, "{cmd} must be blocked");
            assert!(out.content.contains("Blocked"));
        }
    }

    #[tokio::test]
    async fn timeout_kills_the_command() {
        let (_dir, ws) = ws();
        let t = terminal(ws);
        let out = t
            .execute(&call("run_terminal_command", json!({"command": "sleep 30", "timeout": 1})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("timed out"));
    }

    #[tokio::test]
    async fn commands_run_in_the_workspace() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let t = terminal(ws);
        let out = t
            .execute(&call("run_terminal_command", json!({"command": "ls"})))
            .await;
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert!(v["output"].as_str().unwrap().contains("marker.txt"));
    }

    #[tokio::test]
    async fn buffer_keeps_recent_output() {
        let (_dir, ws) = ws();
        let buffer = TerminalBuffer::new();
        let t = RunTerminalCommandTool {
            workspace: ws,
            buffer: buffer.clone(),
            default_timeout_secs: 30,
        };
        let _ = t
            .execute(&call("run_terminal_command", json!({"command": "echo captured-line"})))
            .await;
        let get = GetTerminalBufferTool { buffer };
        let out = get.execute(&call("get_terminal_buffer", json!({}))).await;
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert!(v["output"].as_str().unwrap().contains("captured-line"));
    }

    #[test]
    fn buffer_caps_at_max_lines() {
        let buffer = TerminalBuffer::new();
        for i in 0..600 {
            buffer.push_output(&format!("line {i}"));
        }
        let all = buffer.recent(1000);
        assert!(!all.contains("line 0"));
        assert!(all.contains("line 599"));
    }

    #[tokio::test]
    async fn suggest_command_never_executes() {
        let (dir, _ws) = ws();
        let t = SuggestCommandTool;
        let out = t
            .execute(&call(
                "suggest_command",
                json!({"command": format!("touch {}/should-not-exist.txt", dir.path().display())}),
            ))
            .await;
        assert!(!out.is_error);
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(v["type"], "suggested_command");
        assert!(!dir.path().join("should-not-exist.txt").exists());
    }

    #[tokio::test]
    async fn package_command_validates_action() {
        let (_dir, ws) = ws();
        let t = RunPackageCommandTool { workspace: ws, buffer: TerminalBuffer::new() };
        let out = t
            .execute(&call("run_package_command", json!({"manager": "pip", "action": "explode"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("Invalid action"));
    }

    #[tokio::test]
    async fn package_install_requires_packages() {
        let (_dir, ws) = ws();
        let t = RunPackageCommandTool { workspace: ws, buffer: TerminalBuffer::new() };
        let out = t
            .execute(&call("run_package_command", json!({"action": "install"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("Packages required"));
    }

    #[tokio::test]
    async fn check_command_finds_sh() {
        let t = CheckCommandAvailableTool;
        let out = t
            .execute(&call("check_command_available", json!({"command": "sh"})))
            .await;
        let v: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(v["available"], true);
    }

    #[tokio::test]
    async fn script_file_extension_must_be_supported() {
        let (dir, ws) = ws();
        std::fs::write(dir.path().join("prog.xyz"), "").unwrap();
        let t = RunScriptFileTool { workspace: ws, buffer: TerminalBuffer::new() };
        let out = t
            .execute(&call("run_script_file", json!({"file_path": "prog.xyz"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("Unsupported script extension"));
    }
}
