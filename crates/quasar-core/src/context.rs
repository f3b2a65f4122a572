// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Hierarchical conversation context.
//!
//! Four layers with different lifetimes:
//! - **permanent**: workspace facts, lives for the whole session and is
//!   never truncated;
//! - **task**: current file / selection / error, replaced on every request;
//! - **summary**: compressed older conversation turns;
//! - **session**: append-only record of files touched, errors seen and
//!   commands run.
//!
//! Assembly respects the per-task character budgets; when the rendered
//! layers exceed the total, content is trimmed oldest-first (summary, then
//! session, then task).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use quasar_config::{budget_for, TaskType};
use quasar_model::{ChatModel, CompletionRequest, Message};
use quasar_tools::detect_language;

const SUMMARIZATION_PROMPT: &str = "Summarize this conversation between a developer and a \
    coding assistant in under 120 words. Focus on what was built or fixed, \
    files touched, and decisions made. Write plain prose, no headings.";

/// Always-included context: workspace facts and user preferences.
#[derive(Debug, Clone, Serialize)]
pub struct PermanentContext {
    pub workspace_path: String,
    pub project_type: String,
    pub language: String,
    pub user_preferences: BTreeMap<String, String>,
}

impl Default for PermanentContext {
    fn default() -> Self {
        Self {
            workspace_path: String::new(),
            project_type: "unknown".into(),
            language: "python".into(),
            user_preferences: BTreeMap::new(),
        }
    }
}

/// Per-request context; replaced on every `process` call.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    pub current_file: Option<String>,
    pub file_content: Option<String>,
    pub selected_code: Option<String>,
    pub error_message: Option<String>,
    pub terminal_output: Option<String>,
    pub file_language: String,
}

/// Session-level memory: what happened so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionMemory {
    pub files_created: Vec<String>,
    pub files_modified: Vec<String>,
    pub errors_encountered: Vec<String>,
    pub commands_run: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRole {
    User,
    Assistant,
}

impl HistoryRole {
    fn as_str(&self) -> &'static str {
        match self {
            HistoryRole::User => "user",
            HistoryRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationMessage {
    pub role: HistoryRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub task_type: Option<TaskType>,
}

/// The prompt-ready context layers for one task.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub permanent: String,
    pub task: String,
    pub summary: String,
    pub session: String,
    pub budget_total: usize,
}

impl AssembledContext {
    /// Join the non-empty layers for inclusion in the user message.
    pub fn render(&self) -> String {
        [&self.permanent, &self.task, &self.summary, &self.session]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub struct ContextManager {
    session_id: String,
    permanent: PermanentContext,
    task: TaskContext,
    session: SessionMemory,
    history: Vec<ConversationMessage>,
    summary: String,
    summarize_threshold: usize,
}

impl ContextManager {
    pub fn new(summarize_threshold: usize) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            permanent: PermanentContext::default(),
            task: TaskContext::default(),
            session: SessionMemory::default(),
            history: Vec::new(),
            summary: String::new(),
            summarize_threshold,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn set_workspace(&mut self, path: impl Into<String>, project_type: impl Into<String>) {
        self.permanent.workspace_path = path.into();
        self.permanent.project_type = project_type.into();
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.permanent.language = language.into();
    }

    pub fn set_preference(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.permanent.user_preferences.insert(key.into(), value.into());
    }

    /// Replace the task layer for a new request.
    #[allow(clippy::too_many_arguments)]
    pub fn set_task_context(
        &mut self,
        current_file: Option<String>,
        file_content: Option<String>,
        selected_code: Option<String>,
        error_message: Option<String>,
        terminal_output: Option<String>,
    ) {
        let file_language = current_file
            .as_deref()
            .map(detect_language)
            .unwrap_or("text")
            .to_string();
        self.task = TaskContext {
            current_file,
            file_content,
            selected_code,
            error_message,
            terminal_output,
            file_language,
        };
    }

    pub fn clear_task_context(&mut self) {
        self.task = TaskContext::default();
    }

    /// Append a turn.  When the history grows to twice the threshold the
    /// oldest messages are compacted into the summary immediately, so the
    /// history never exceeds the threshold after this call returns.
    pub fn add_message(&mut self, role: HistoryRole, content: impl Into<String>, task_type: Option<TaskType>) {
        self.history.push(ConversationMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            task_type,
        });
        if self.history.len() >= self.summarize_threshold * 2 {
            self.compact_heuristic();
        }
    }

    pub fn record_file_created(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.session.files_created.contains(&path) {
            self.session.files_created.push(path);
        }
    }

    pub fn record_file_modified(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.session.files_modified.contains(&path) {
            self.session.files_modified.push(path);
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.session.errors_encountered.push(error.into());
    }

    pub fn record_command(&mut self, command: impl Into<String>) {
        self.session.commands_run.push(command.into());
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn recent_messages(&self, count: usize) -> &[ConversationMessage] {
        let start = self.history.len().saturating_sub(count);
        &self.history[start..]
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn session(&self) -> &SessionMemory {
        &self.session
    }

    pub fn summarize_threshold(&self) -> usize {
        self.summarize_threshold
    }

    /// Assemble the budgeted context for a task type.
    pub fn build(&self, task_type: TaskType) -> AssembledContext {
        let budget = budget_for(task_type);

        let permanent = self.render_permanent();
        let mut task = truncate_chars(&self.render_task(), budget.task);
        let mut summary = truncate_chars(&self.render_summary(), budget.summary);
        let mut session = self.render_session();

        // Enforce the soft total: trim summary first, then session, then
        // task.  The permanent layer is never touched.
        let total = budget.total;
        let mut used = permanent.chars().count()
            + task.chars().count()
            + summary.chars().count()
            + session.chars().count();
        if used > total {
            for layer in [&mut summary, &mut session, &mut task] {
                let overflow = used.saturating_sub(total);
                if overflow == 0 {
                    break;
                }
                let len = layer.chars().count();
                let keep = len.saturating_sub(overflow);
                *layer = truncate_chars(layer, keep);
                used = used - len + layer.chars().count();
            }
        }

        AssembledContext { permanent, task, summary, session, budget_total: total }
    }

    fn render_permanent(&self) -> String {
        let mut lines = Vec::new();
        if !self.permanent.workspace_path.is_empty() {
            lines.push(format!("Workspace: {}", self.permanent.workspace_path));
        }
        if self.permanent.project_type != "unknown" {
            lines.push(format!("Project: {}", self.permanent.project_type));
        }
        if !self.permanent.language.is_empty() {
            lines.push(format!("Language: {}", self.permanent.language));
        }
        lines.join("\n")
    }

    fn render_task(&self) -> String {
        let mut parts = Vec::new();
        // File content is intentionally not included: the agent reads files
        // through tools, which keeps the prompt small.
        if let Some(file) = &self.task.current_file {
            parts.push(format!("Current file: {file} ({})", self.task.file_language));
        }
        if let Some(error) = &self.task.error_message {
            parts.push(format!("Error:\n{error}"));
        }
        if let Some(code) = &self.task.selected_code {
            parts.push(format!("Selected code:\n```\n{code}\n```"));
        }
        if let Some(term) = &self.task.terminal_output {
            parts.push(format!("Terminal:\n{term}"));
        }
        parts.join("\n\n")
    }

    fn render_summary(&self) -> String {
        if self.summary.is_empty() {
            String::new()
        } else {
            format!("Previous context: {}", self.summary)
        }
    }

    fn render_session(&self) -> String {
        let mut lines = Vec::new();
        if !self.session.files_created.is_empty() {
            let recent: Vec<&str> = self
                .session
                .files_created
                .iter()
                .rev()
                .take(5)
                .rev()
                .map(String::as_str)
                .collect();
            lines.push(format!("Files created: {}", recent.join(", ")));
        }
        if !self.session.files_modified.is_empty() {
            let recent: Vec<&str> = self
                .session
                .files_modified
                .iter()
                .rev()
                .take(5)
                .rev()
                .map(String::as_str)
                .collect();
            lines.push(format!("Files modified: {}", recent.join(", ")));
        }
        lines.join("\n")
    }

    /// Deterministic summariser: classify each old message by keyword and
    /// aggregate counts, then append recent file activity.
    fn compact_heuristic(&mut self) {
        let keep = self.summarize_threshold;
        if self.history.len() <= keep {
            return;
        }
        let old: Vec<ConversationMessage> =
            self.history.drain(..self.history.len() - keep).collect();

        let mut generation = 0usize;
        let mut debugging = 0usize;
        let mut explanation = 0usize;
        let mut testing = 0usize;
        for msg in &old {
            let head: String = msg.content.chars().take(200).collect::<String>().to_lowercase();
            if head.contains("fix") || head.contains("bug") || head.contains("error") {
                debugging += 1;
            } else if head.contains("implement") || head.contains("create") || head.contains("generate") {
                generation += 1;
            } else if head.contains("explain") || head.contains("what does") {
                explanation += 1;
            } else if head.contains("test") {
                testing += 1;
            }
        }

        let user_count = old.iter().filter(|m| m.role == HistoryRole::User).count();
        let mut parts = Vec::new();
        for (label, count) in [
            ("generation", generation),
            ("debugging", debugging),
            ("explanation", explanation),
            ("testing", testing),
        ] {
            if count > 0 {
                parts.push(format!("{label} x{count}"));
            }
        }
        if !self.session.files_created.is_empty() {
            let recent: Vec<&str> = self
                .session
                .files_created
                .iter()
                .rev()
                .take(3)
                .rev()
                .map(String::as_str)
                .collect();
            parts.push(format!("Created: {}", recent.join(", ")));
        }
        if !self.session.files_modified.is_empty() {
            let recent: Vec<&str> = self
                .session
                .files_modified
                .iter()
                .rev()
                .take(3)
                .rev()
                .map(String::as_str)
                .collect();
            parts.push(format!("Modified: {}", recent.join(", ")));
        }

        self.summary = format!("Previous {user_count} exchanges. {}", parts.join("; "));
        debug!(compacted = old.len(), kept = keep, "history compacted heuristically");
    }

    /// LLM summarisation: compact proactively once the history exceeds the
    /// threshold, sending the older turns to the given model.  Leaves the
    /// history as-is on any failure; the heuristic in `add_message` remains
    /// the safety net.
    pub async fn summarize_with_model(&mut self, model: &dyn ChatModel) -> anyhow::Result<()> {
        let keep = self.summarize_threshold;
        if self.history.len() <= keep {
            return Ok(());
        }
        let boundary = self.history.len() - keep;
        let transcript: String = self.history[..boundary]
            .iter()
            .map(|m| format!("{}: {}\n", m.role.as_str(), m.content))
            .collect();

        let req = CompletionRequest::new(vec![
            Message::system(SUMMARIZATION_PROMPT),
            Message::user(transcript),
        ]);
        let turn = model.invoke(req).await?;
        if turn.text.trim().is_empty() {
            anyhow::bail!("summarisation model returned empty text");
        }
        self.summary = turn.text.trim().to_string();
        self.history.drain(..boundary);
        debug!(kept = keep, "history compacted via model");
        Ok(())
    }

    /// Export the persistent parts for callers that want to serialise state
    /// across processes.
    pub fn snapshot(&self) -> Value {
        json!({
            "session_id": self.session_id,
            "permanent": {
                "workspace": self.permanent.workspace_path,
                "project_type": self.permanent.project_type,
                "language": self.permanent.language,
            },
            "session": {
                "files_created": self.session.files_created,
                "files_modified": self.session.files_modified,
                "errors": self.session.errors_encountered.iter().rev().take(5).rev().collect::<Vec<_>>(),
                "commands": self.session.commands_run.iter().rev().take(5).rev().collect::<Vec<_>>(),
            },
            "summary": self.summary,
            "history_length": self.history.len(),
        })
    }
}

/// Char-boundary-safe prefix truncation.
fn truncate_chars(s: &str, cap: usize) -> String {
    if s.chars().count() <= cap {
        return s.to_string();
    }
    s.chars().take(cap).collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
