// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The orchestrator: classifies the request, assembles context, and drives
//! the bounded agentic loop, streaming every intermediate event through an
//! mpsc channel.
//!
//! Error recovery inside the loop follows a fixed ladder: on a rate-limit
//! signal the current provider's credentials are rotated first; if rotation
//! is exhausted and the model was not pinned by the caller, the task's
//! fallback chain advances to the next provider.  A pinned model never
//! crosses providers.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};

use quasar_config::{AgentConfig, TaskType};
use quasar_model::{
    is_rate_limit, ChatModel, CompletionRequest, Message, ModelRouter, RequestCredentials,
    SelectedModel, ToolCallRequest,
};
use quasar_tools::{
    build_registry, ToolCall, ToolExecutor, ToolOutput, ToolRegistry, WebToolSettings, Workspace,
};

use crate::classify::{keyword_classification, parse_classification, TaskClassification};
use crate::context::{ContextManager, HistoryRole};
use crate::events::AgentEvent;
use crate::prompts::{self, SUMMARY_DEMAND};

/// One incoming request with its editor context.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    pub query: String,
    pub current_file: Option<String>,
    pub file_content: Option<String>,
    pub selected_code: Option<String>,
    pub terminal_output: Option<String>,
    pub error_message: Option<String>,
    /// `"<provider>/<model_key>"` pins the model; `None` or `"Auto"` enables
    /// the fallback chain.
    pub selected_model: Option<String>,
}

impl AgentRequest {
    pub fn query(query: impl Into<String>) -> Self {
        Self { query: query.into(), ..Default::default() }
    }
}

/// The final aggregate answer for non-streaming callers.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub success: bool,
    pub response: String,
    pub task_type: TaskType,
    pub model_used: String,
    pub provider: String,
    pub tools_used: Vec<String>,
    pub tool_calls_count: usize,
    pub iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    fn pending() -> Self {
        Self {
            success: false,
            response: String::new(),
            task_type: TaskType::Chat,
            model_used: "unknown".into(),
            provider: "unknown".into(),
            tools_used: Vec::new(),
            tool_calls_count: 0,
            iterations: 0,
            error: None,
        }
    }
}

/// Detects the agent calling the same tool with the same key arguments
/// over and over.
pub(crate) struct LoopDetector {
    history: Vec<String>,
    window: usize,
    threshold: usize,
}

impl LoopDetector {
    pub(crate) fn new(window: usize, threshold: usize) -> Self {
        Self { history: Vec::new(), window, threshold }
    }

    pub(crate) fn add(&mut self, tool_name: &str, args: &Value) {
        let key_args = args
            .as_object()
            .map(|map| {
                let mut entries: Vec<String> =
                    map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                entries.sort();
                entries.truncate(3);
                entries.join(",")
            })
            .unwrap_or_default();
        self.history.push(format!("{tool_name}:{key_args}"));
        if self.history.len() > self.window {
            self.history.remove(0);
        }
    }

    pub(crate) fn is_looping(&self) -> bool {
        if self.history.len() < self.threshold {
            return false;
        }
        let recent = &self.history[self.history.len() - self.threshold..];
        recent.iter().all(|s| s == &recent[0])
    }
}

pub struct Orchestrator {
    router: Arc<ModelRouter>,
    config: Arc<AgentConfig>,
    context: ContextManager,
    workspace: Arc<Workspace>,
    registry: Arc<ToolRegistry>,
    web: WebToolSettings,
}

impl Orchestrator {
    pub fn new(router: Arc<ModelRouter>, workspace_path: &str, web: WebToolSettings) -> Self {
        let config = router.config().clone();
        let workspace = Arc::new(Workspace::new(workspace_path));
        let registry = Arc::new(build_registry(workspace.clone(), &config.settings, web.clone()));
        let mut context = ContextManager::new(config.settings.summarize_threshold);
        context.set_workspace(workspace.root().display().to_string(), "unknown");
        info!(workspace = %workspace.root().display(), "orchestrator initialized");
        Self { router, config, context, workspace, registry, web }
    }

    /// Point the session at a different workspace.  Tools are rebuilt so the
    /// sandbox root moves with it.
    pub fn set_workspace(&mut self, path: &str) {
        self.workspace = Arc::new(Workspace::new(path));
        self.registry = Arc::new(build_registry(
            self.workspace.clone(),
            &self.config.settings,
            self.web.clone(),
        ));
        self.context.set_workspace(self.workspace.root().display().to_string(), "unknown");
        info!(workspace = %self.workspace.root().display(), "workspace changed");
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextManager {
        &mut self.context
    }

    pub fn router(&self) -> &Arc<ModelRouter> {
        &self.router
    }

    /// Classify the query: designated fast models first, keyword rules as
    /// the fallback of last resort.
    pub async fn classify_task(
        &self,
        query: &str,
        current_file: Option<&str>,
        has_selection: bool,
        has_error: bool,
        overlay: Option<&RequestCredentials>,
    ) -> TaskClassification {
        let prompt =
            crate::classify::classification_prompt(query, current_file, has_selection, has_error);

        for (provider, key) in self.config.classifier_chain() {
            if !self.router.scope(overlay).is_available(provider) {
                continue;
            }
            let selected = match self.router.model_for_provider(provider, key, overlay) {
                Ok(s) => s,
                Err(e) => {
                    warn!(provider, "classifier model unavailable: {e}");
                    continue;
                }
            };
            let req = CompletionRequest::new(vec![Message::user(prompt.clone())]);
            match selected.model.invoke(req).await {
                Ok(turn) => match parse_classification(&turn.text) {
                    Ok(classification) => {
                        info!(
                            task = %classification.task_type,
                            confidence = classification.confidence,
                            "query classified"
                        );
                        return classification;
                    }
                    Err(e) => warn!(provider, "classification parse failed: {e}"),
                },
                Err(e) => warn!(provider, "classifier invocation failed: {e}"),
            }
        }

        warn!("no classifier model reachable, using keyword rules");
        keyword_classification(query)
    }

    /// Non-streaming convenience wrapper: runs the streaming pipeline and
    /// folds its events into one [`AgentResponse`].
    pub async fn process(
        &mut self,
        req: AgentRequest,
        overlay: Option<&RequestCredentials>,
    ) -> AgentResponse {
        let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);

        let fold = async move {
            let mut resp = AgentResponse::pending();
            let mut text = String::new();
            while let Some(event) = rx.recv().await {
                match event {
                    AgentEvent::Classification { task_type, .. } => resp.task_type = task_type,
                    AgentEvent::Token { content } => text.push_str(&content),
                    AgentEvent::Done {
                        model,
                        provider,
                        task_type,
                        iterations,
                        tool_calls_count,
                        tools_used,
                        ..
                    } => {
                        resp.success = true;
                        resp.model_used = model;
                        resp.provider = provider;
                        resp.task_type = task_type;
                        resp.iterations = iterations;
                        resp.tool_calls_count = tool_calls_count;
                        resp.tools_used = tools_used;
                    }
                    AgentEvent::Error { message } => {
                        resp.success = false;
                        resp.error = Some(message);
                    }
                    _ => {}
                }
            }
            resp.response = if text.is_empty() {
                resp.error.clone().unwrap_or_default()
            } else {
                text
            };
            resp
        };

        let ((), resp) = tokio::join!(self.process_stream(req, tx, overlay), fold);
        resp
    }

    /// The full streaming pipeline.  Every event goes through `tx`; the
    /// stream ends with `done` or `error` unless the receiver goes away
    /// (client cancellation), in which case the loop stops silently.
    pub async fn process_stream(
        &mut self,
        req: AgentRequest,
        tx: mpsc::Sender<AgentEvent>,
        overlay: Option<&RequestCredentials>,
    ) {
        self.context.set_task_context(
            req.current_file.clone(),
            req.file_content.clone(),
            req.selected_code.clone(),
            req.error_message.clone(),
            req.terminal_output.clone(),
        );

        let has_error = req.error_message.is_some()
            || req
                .terminal_output
                .as_deref()
                .map(|t| t.to_lowercase().contains("error"))
                .unwrap_or(false);

        let classification = self
            .classify_task(
                &req.query,
                req.current_file.as_deref(),
                req.selected_code.is_some(),
                has_error,
                overlay,
            )
            .await;
        let task = classification.task_type;
        let _ = tx
            .send(AgentEvent::Classification {
                task_type: task,
                confidence: classification.confidence,
            })
            .await;

        let use_tools = self.config.is_tool_enabled(task);
        let assembled = self.context.build(task);
        let system_prompt = prompts::build_system_prompt(task, use_tools);
        let context_text = assembled.render();
        let user_message = if context_text.is_empty() {
            req.query.clone()
        } else {
            format!("{context_text}\n\nUser request: {}", req.query)
        };
        let messages = vec![Message::system(system_prompt), Message::user(user_message)];

        self.context.add_message(HistoryRole::User, &req.query, Some(task));

        let pinned = parse_pinned(req.selected_model.as_deref());

        if use_tools {
            self.agentic_loop_stream(messages, task, pinned, &tx, overlay).await;
        } else {
            self.simple_stream(messages, task, pinned, &tx, overlay).await;
        }

        self.maybe_model_summarize(overlay).await;
    }

    /// The bounded model ↔ tool loop.
    async fn agentic_loop_stream(
        &mut self,
        mut messages: Vec<Message>,
        task: TaskType,
        pinned: Option<(String, String)>,
        tx: &mpsc::Sender<AgentEvent>,
        overlay: Option<&RequestCredentials>,
    ) {
        let tool_schemas: Vec<quasar_model::ToolSchema> = self
            .registry
            .schemas()
            .into_iter()
            .map(|s| quasar_model::ToolSchema {
                name: s.name,
                description: s.description,
                parameters: s.parameters,
            })
            .collect();
        let mut executor = ToolExecutor::new(self.registry.clone(), &self.config.settings);

        let mut selected = match self.resolve_model(task, &pinned, 0, overlay) {
            Some(s) => s,
            None => {
                let _ = tx
                    .send(AgentEvent::Error {
                        message: "No model available for this task. Check provider credentials."
                            .into(),
                    })
                    .await;
                return;
            }
        };
        info!(provider = %selected.provider, model = %selected.model_name, tools = tool_schemas.len(), "agentic loop started");

        let max_iterations = self.config.settings.max_tool_iterations;
        let mut iteration: u32 = 0;
        let mut fallback_level: usize = 0;
        let mut summary_demand_injected = false;
        let mut detector = LoopDetector::new(5, 3);

        while iteration < max_iterations {
            if tx.is_closed() {
                // Client cancelled; discard partial results.
                return;
            }
            iteration += 1;
            let remaining = max_iterations - iteration;
            let _ = tx
                .send(AgentEvent::Iteration { current: iteration, max: max_iterations, remaining })
                .await;

            if remaining <= 1 && !summary_demand_injected {
                summary_demand_injected = true;
                messages.push(Message::system(SUMMARY_DEMAND));
                let _ = tx
                    .send(AgentEvent::IterationWarning {
                        remaining,
                        message: "LAST iteration remaining - summarizing progress".into(),
                    })
                    .await;
            }

            let req = CompletionRequest::new(messages.clone()).with_tools(tool_schemas.clone());
            let turn = match selected.model.invoke(req).await {
                Ok(turn) => turn,
                Err(e) => {
                    self.context.record_error(e.to_string());
                    if is_rate_limit(&e) {
                        match self
                            .recover_from_rate_limit(
                                task,
                                &pinned,
                                &selected.provider,
                                &mut fallback_level,
                                tx,
                                overlay,
                            )
                            .await
                        {
                            Some(next) => {
                                selected = next;
                                iteration -= 1; // retry this iteration
                                continue;
                            }
                            None => return, // terminal error already emitted
                        }
                    }
                    let summary = executor.summary();
                    let message = if summary.total_calls > 0 {
                        format!(
                            "Error during execution: {e:#}. Completed {} tool call(s) ({}) before the error.",
                            summary.total_calls,
                            summary.tools_used.join(", ")
                        )
                    } else {
                        format!("{e:#}")
                    };
                    let _ = tx.send(AgentEvent::Error { message }).await;
                    return;
                }
            };

            if !turn.has_tool_calls() {
                // Final answer: stream it in small chunks.
                for chunk in chunk_text(&turn.text, self.config.settings.stream_chunk_chars) {
                    let _ = tx.send(AgentEvent::Token { content: chunk }).await;
                }
                self.context.add_message(HistoryRole::Assistant, &turn.text, Some(task));
                let summary = executor.summary();
                let _ = tx
                    .send(AgentEvent::Done {
                        model: selected.model_name.clone(),
                        provider: selected.provider.clone(),
                        task_type: task,
                        iterations: iteration,
                        tool_calls_count: summary.total_calls,
                        tools_used: summary.tools_used,
                        loop_detected: false,
                        max_iterations_reached: iteration >= max_iterations,
                    })
                    .await;
                return;
            }

            if !turn.text.is_empty() {
                messages.push(Message::assistant(&turn.text));
            }
            for tc in &turn.tool_calls {
                messages.push(Message::tool_call(&tc.id, &tc.name, tc.args.to_string()));
            }

            // Tool calls run sequentially: later calls may depend on effects
            // of earlier ones.
            for tc in &turn.tool_calls {
                detector.add(&tc.name, &tc.args);
                if detector.is_looping() {
                    warn!(tool = %tc.name, "loop detected, stopping");
                    let _ = tx
                        .send(AgentEvent::Message {
                            content: "Detected repetitive actions. Stopping to avoid an infinite loop."
                                .into(),
                        })
                        .await;
                    let summary = executor.summary();
                    let _ = tx
                        .send(AgentEvent::Done {
                            model: selected.model_name.clone(),
                            provider: selected.provider.clone(),
                            task_type: task,
                            iterations: iteration,
                            tool_calls_count: summary.total_calls,
                            tools_used: summary.tools_used,
                            loop_detected: true,
                            max_iterations_reached: false,
                        })
                        .await;
                    return;
                }

                let _ = tx
                    .send(AgentEvent::Message { content: progress_message(&tc.name, &tc.args) })
                    .await;
                let _ = tx
                    .send(AgentEvent::ToolStart { tool: tc.name.clone(), args: tc.args.clone() })
                    .await;

                let call = ToolCall { id: tc.id.clone(), name: tc.name.clone(), args: tc.args.clone() };
                let output = executor.execute(&call).await;
                messages.push(Message::tool_result(&tc.id, &output.content));

                let _ = tx
                    .send(AgentEvent::ToolComplete {
                        tool: tc.name.clone(),
                        result: output.content.clone(),
                    })
                    .await;
                if let Some(observation) = observation(&tc.name, &tc.args, &output) {
                    let _ = tx.send(AgentEvent::Message { content: observation }).await;
                }

                self.record_tool_effects(tc, &output);
                if self.registry.mutates_files(&tc.name) && !output.is_error {
                    let _ = tx.send(AgentEvent::FileTreeUpdated).await;
                }
            }
        }

        // Iteration budget exhausted while the model still wanted tools.
        let summary = executor.summary();
        let _ = tx
            .send(AgentEvent::Done {
                model: selected.model_name,
                provider: selected.provider,
                task_type: task,
                iterations: iteration,
                tool_calls_count: summary.total_calls,
                tools_used: summary.tools_used,
                loop_detected: false,
                max_iterations_reached: true,
            })
            .await;
    }

    /// Tool-free path: stream tokens straight from the model with the same
    /// rotation and fallback ladder.
    async fn simple_stream(
        &mut self,
        messages: Vec<Message>,
        task: TaskType,
        pinned: Option<(String, String)>,
        tx: &mpsc::Sender<AgentEvent>,
        overlay: Option<&RequestCredentials>,
    ) {
        use futures::StreamExt;
        use quasar_model::ResponseEvent;

        let mut fallback_level: usize = 0;
        let mut selected = match self.resolve_model(task, &pinned, fallback_level, overlay) {
            Some(s) => s,
            None => {
                let _ = tx
                    .send(AgentEvent::Error {
                        message: "No model available for this task. Check provider credentials."
                            .into(),
                    })
                    .await;
                return;
            }
        };

        loop {
            let req = CompletionRequest::new(messages.clone());
            match selected.model.complete(req).await {
                Ok(mut stream) => {
                    let mut full = String::new();
                    while let Some(event) = stream.next().await {
                        if tx.is_closed() {
                            // Client cancelled; drop the partial response.
                            return;
                        }
                        match event {
                            Ok(ResponseEvent::TextDelta(delta)) if !delta.is_empty() => {
                                full.push_str(&delta);
                                let _ =
                                    tx.send(AgentEvent::Token { content: delta }).await;
                            }
                            Ok(ResponseEvent::Done) => break,
                            Ok(_) => {}
                            Err(e) => {
                                warn!("stream error: {e}");
                                let _ = tx
                                    .send(AgentEvent::Error { message: format!("{e:#}") })
                                    .await;
                                return;
                            }
                        }
                    }
                    self.context.add_message(HistoryRole::Assistant, &full, Some(task));
                    let _ = tx
                        .send(AgentEvent::Done {
                            model: selected.model_name.clone(),
                            provider: selected.provider.clone(),
                            task_type: task,
                            iterations: 1,
                            tool_calls_count: 0,
                            tools_used: Vec::new(),
                            loop_detected: false,
                            max_iterations_reached: false,
                        })
                        .await;
                    return;
                }
                Err(e) => {
                    self.context.record_error(e.to_string());
                    if is_rate_limit(&e) {
                        match self
                            .recover_from_rate_limit(
                                task,
                                &pinned,
                                &selected.provider,
                                &mut fallback_level,
                                tx,
                                overlay,
                            )
                            .await
                        {
                            Some(next) => {
                                selected = next;
                                continue;
                            }
                            None => return,
                        }
                    }
                    let _ = tx.send(AgentEvent::Error { message: format!("{e:#}") }).await;
                    return;
                }
            }
        }
    }

    fn resolve_model(
        &self,
        task: TaskType,
        pinned: &Option<(String, String)>,
        level: usize,
        overlay: Option<&RequestCredentials>,
    ) -> Option<SelectedModel> {
        match pinned {
            Some((provider, key)) => match self.router.model_for_provider(provider, key, overlay) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!("pinned model could not be loaded: {e}");
                    None
                }
            },
            None => self.router.model_for_task(task, level, overlay),
        }
    }

    /// The rate-limit recovery ladder: rotate within the provider, then (in
    /// Auto mode only) advance the fallback chain.  Returns the model to
    /// retry with, or `None` after emitting the terminal error.
    async fn recover_from_rate_limit(
        &self,
        task: TaskType,
        pinned: &Option<(String, String)>,
        current_provider: &str,
        fallback_level: &mut usize,
        tx: &mpsc::Sender<AgentEvent>,
        overlay: Option<&RequestCredentials>,
    ) -> Option<SelectedModel> {
        let scope = self.router.scope(overlay);

        if scope.rotate(current_provider) {
            let _ = tx
                .send(AgentEvent::Message {
                    content: format!(
                        "Rate limit hit. Trying the next API key for {current_provider}..."
                    ),
                })
                .await;
            if let Some(next) = self.resolve_model(task, pinned, *fallback_level, overlay) {
                info!(provider = %current_provider, "credential rotation succeeded");
                let _ = tx
                    .send(AgentEvent::Message {
                        content: format!("Using the next API key for {current_provider}"),
                    })
                    .await;
                return Some(next);
            }
        }

        if pinned.is_some() {
            let _ = tx
                .send(AgentEvent::Error {
                    message: format!(
                        "Rate limit exceeded for your selected model ({current_provider}). \
                         Try another model or wait."
                    ),
                })
                .await;
            return None;
        }

        let chain = self.config.models_for_task(task).to_vec();
        for level in (*fallback_level + 1)..chain.len() {
            let (provider, key) = &chain[level];
            if !scope.is_available(provider) {
                continue;
            }
            let _ = tx
                .send(AgentEvent::Message { content: format!("Switching to {provider}...") })
                .await;
            match self.router.model_for_provider(provider, key, overlay) {
                Ok(next) => {
                    info!(provider = %provider, model = %next.model_name, "fallback switch succeeded");
                    let _ = tx
                        .send(AgentEvent::Message {
                            content: format!("Using {provider}/{}", next.model_name),
                        })
                        .await;
                    *fallback_level = level;
                    return Some(next);
                }
                Err(e) => {
                    warn!(provider = %provider, "fallback failed: {e}");
                }
            }
        }

        let _ = tx
            .send(AgentEvent::Error {
                message: "Rate limit exceeded on all providers. Please wait and try again.".into(),
            })
            .await;
        None
    }

    /// Record tool side effects into session memory.
    fn record_tool_effects(&mut self, tc: &ToolCallRequest, output: &ToolOutput) {
        if output.is_error {
            let brief: String = output.content.chars().take(200).collect();
            self.context.record_error(format!("{}: {brief}", tc.name));
            return;
        }
        let path = tc.args.get("path").and_then(|v| v.as_str());
        match tc.name.as_str() {
            "create_file" => {
                if let Some(p) = path {
                    self.context.record_file_created(p);
                }
            }
            "modify_file" | "patch_file" => {
                if let Some(p) = path {
                    self.context.record_file_modified(p);
                }
            }
            "move_file" => {
                if let Some(dest) = tc.args.get("destination").and_then(|v| v.as_str()) {
                    self.context.record_file_modified(dest);
                }
            }
            "run_terminal_command" => {
                if let Some(cmd) = tc.args.get("command").and_then(|v| v.as_str()) {
                    self.context.record_command(cmd);
                }
            }
            "run_script_file" => {
                if let Some(f) = tc.args.get("file_path").and_then(|v| v.as_str()) {
                    self.context.record_command(format!("run {f}"));
                }
            }
            _ => {}
        }
    }

    /// Opportunistic LLM summarisation at the end of a turn, just before the
    /// deterministic compaction would kick in.
    async fn maybe_model_summarize(&mut self, overlay: Option<&RequestCredentials>) {
        let threshold = self.context.summarize_threshold();
        if self.context.history_len() < threshold * 2 - 1 {
            return;
        }
        for (provider, key) in self.config.classifier_chain() {
            if !self.router.scope(overlay).is_available(provider) {
                continue;
            }
            let Ok(selected) = self.router.model_for_provider(provider, key, overlay) else {
                continue;
            };
            match self.context.summarize_with_model(selected.model.as_ref()).await {
                Ok(()) => return,
                Err(e) => warn!(provider, "model summarisation failed: {e}"),
            }
        }
    }
}

fn parse_pinned(selected_model: Option<&str>) -> Option<(String, String)> {
    let s = selected_model?;
    if s == "Auto" || s.is_empty() {
        return None;
    }
    match s.split_once('/') {
        Some((provider, key)) => Some((provider.to_string(), key.to_string())),
        None => {
            warn!(selected = s, "selected_model is not provider/model_key; using Auto");
            None
        }
    }
}

/// Split text into char-sized chunks for token streaming.
fn chunk_text(text: &str, size: usize) -> Vec<String> {
    if size == 0 {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// Short filename extracted from tool arguments, for progress lines.
fn arg_filename(args: &Value) -> String {
    args.get("path")
        .or_else(|| args.get("file_path"))
        .or_else(|| args.get("source"))
        .and_then(|v| v.as_str())
        .map(|p| p.replace('\\', "/").rsplit('/').next().unwrap_or(p).to_string())
        .unwrap_or_default()
}

/// Human-readable progress line emitted before a tool runs.
fn progress_message(tool_name: &str, args: &Value) -> String {
    let file = arg_filename(args);
    match tool_name {
        "read_file" | "read_file_chunk" => format!("Reading `{file}`..."),
        "create_file" => format!("Creating `{file}`..."),
        "modify_file" | "patch_file" => format!("Modifying `{file}`..."),
        "delete_file" => format!("Deleting `{file}`..."),
        "move_file" => format!("Moving `{file}`..."),
        "list_files" | "tree_list" => "Scanning directory structure...".into(),
        "search_files" | "grep_search" => "Searching the codebase...".into(),
        "run_terminal_command" | "run_script_file" | "run_package_command" => {
            "Running command...".into()
        }
        "web_search" => "Searching the web...".into(),
        "read_url" | "browse_interactive" => "Fetching page...".into(),
        other => format!("Executing {other}..."),
    }
}

/// Human-readable observation line emitted after a tool completes.  Quiet
/// for successful reads; those are too frequent to narrate.
fn observation(tool_name: &str, args: &Value, output: &ToolOutput) -> Option<String> {
    let file = arg_filename(args);
    if output.is_error {
        return Some(match tool_name {
            "read_file" | "read_file_chunk" => {
                format!("`{file}` could not be read. Looking for alternatives...")
            }
            "run_terminal_command" => "Command failed. Checking the error...".into(),
            "list_files" => "Could not list the directory.".into(),
            other => format!("{other} ran into a problem. Adjusting approach..."),
        });
    }
    match tool_name {
        "list_files" | "tree_list" => Some("Found the directory structure.".into()),
        "create_file" => Some(format!("Created `{file}` successfully.")),
        "modify_file" | "patch_file" => Some(format!("Updated `{file}`.")),
        "delete_file" => Some(format!("Deleted `{file}`.")),
        "move_file" => Some(format!("Moved `{file}`.")),
        "run_terminal_command" => {
            if output.content.contains("\"success\": true") {
                Some("Command completed successfully.".into())
            } else {
                None
            }
        }
        _ => None,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
