// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The per-request tool execution engine.
//!
//! Resolves calls by name, dispatches with a per-call timeout, formats the
//! output for model consumption (with category-dependent truncation caps)
//! and keeps an execution history for the final response summary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use quasar_config::AgentSettings;

use crate::registry::ToolRegistry;
use crate::tool::{OutputCategory, ToolCall, ToolOutput};

/// One entry in the execution history.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub tool_name: String,
    pub success: bool,
    pub duration_ms: u128,
}

/// Aggregate over all calls made through one executor.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub total_calls: usize,
    pub successful: usize,
    pub failed: usize,
    /// Unique tool names, sorted.
    pub tools_used: Vec<String>,
}

/// Executes tool calls for a single request.  Holds no state beyond the
/// request lifetime.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
    package_install_timeout: Duration,
    file_result_cap: usize,
    generic_result_cap: usize,
    history: Vec<ExecutionRecord>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, settings: &AgentSettings) -> Self {
        Self {
            registry,
            tool_timeout: settings.tool_timeout,
            package_install_timeout: settings.package_install_timeout,
            file_result_cap: settings.file_result_cap,
            generic_result_cap: settings.generic_result_cap,
            history: Vec::new(),
        }
    }

    /// Execute one call: resolve, dispatch under timeout, format, record.
    pub async fn execute(&mut self, call: &ToolCall) -> ToolOutput {
        debug!(tool = %call.name, "executing tool call");
        let start = Instant::now();

        let Some(tool) = self.registry.get(&call.name) else {
            let msg = format!(
                "Unknown tool: {}. Available: {}",
                call.name,
                self.registry.names().join(", ")
            );
            warn!("{msg}");
            self.record(&call.name, false, start);
            return ToolOutput::err(&call.id, msg);
        };

        let timeout = self.timeout_for(call);
        let output = match tokio::time::timeout(timeout, tool.execute(call)).await {
            Ok(output) => output,
            Err(_) => {
                let msg = format!("Tool execution timed out after {}s", timeout.as_secs());
                warn!(tool = %call.name, "{msg}");
                self.record(&call.name, false, start);
                return ToolOutput::err(&call.id, msg);
            }
        };

        self.record(&call.name, !output.is_error, start);

        let cap = match tool.output_category() {
            OutputCategory::FileContent => self.file_result_cap,
            OutputCategory::Generic => self.generic_result_cap,
        };
        ToolOutput {
            call_id: output.call_id,
            content: cap_content(&output.content, cap),
            is_error: output.is_error,
        }
    }

    /// Package installs are slow; give them the extended timeout.
    fn timeout_for(&self, call: &ToolCall) -> Duration {
        let is_install = match call.name.as_str() {
            "run_package_command" => {
                call.args.get("action").and_then(|v| v.as_str()) == Some("install")
            }
            "run_terminal_command" => call
                .args
                .get("command")
                .and_then(|v| v.as_str())
                .map(|c| c.contains("install"))
                .unwrap_or(false),
            _ => false,
        };
        if is_install {
            self.package_install_timeout
        } else {
            self.tool_timeout
        }
    }

    fn record(&mut self, tool_name: &str, success: bool, start: Instant) {
        self.history.push(ExecutionRecord {
            tool_name: tool_name.to_string(),
            success,
            duration_ms: start.elapsed().as_millis(),
        });
    }

    pub fn history(&self) -> &[ExecutionRecord] {
        &self.history
    }

    pub fn total_calls(&self) -> usize {
        self.history.len()
    }

    pub fn summary(&self) -> ExecutionSummary {
        let successful = self.history.iter().filter(|r| r.success).count();
        let mut tools_used: Vec<String> =
            self.history.iter().map(|r| r.tool_name.clone()).collect();
        tools_used.sort();
        tools_used.dedup();
        ExecutionSummary {
            total_calls: self.history.len(),
            successful,
            failed: self.history.len() - successful,
            tools_used,
        }
    }
}

/// Truncate at a char boundary and tag the cut.
fn cap_content(content: &str, cap: usize) -> String {
    if content.chars().count() <= cap {
        return content.to_string();
    }
    let truncated: String = content.chars().take(cap).collect();
    let remaining = content.chars().count() - cap;
    format!("{truncated}\n...[TRUNCATED - {remaining} chars omitted]")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
