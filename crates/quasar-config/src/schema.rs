// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Categories a user request can be classified into.  The category drives
/// model selection (each has its own fallback chain), the context budget and
/// whether the agentic tool loop runs at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Chat,
    CodeExplainSimple,
    CodeExplainComplex,
    CodeGeneration,
    CodeGenerationMulti,
    BugFixing,
    Refactor,
    Architecture,
    TestGeneration,
    Documentation,
    Research,
}

impl TaskType {
    pub const ALL: [TaskType; 11] = [
        TaskType::Chat,
        TaskType::CodeExplainSimple,
        TaskType::CodeExplainComplex,
        TaskType::CodeGeneration,
        TaskType::CodeGenerationMulti,
        TaskType::BugFixing,
        TaskType::Refactor,
        TaskType::Architecture,
        TaskType::TestGeneration,
        TaskType::Documentation,
        TaskType::Research,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Chat => "chat",
            TaskType::CodeExplainSimple => "code_explain_simple",
            TaskType::CodeExplainComplex => "code_explain_complex",
            TaskType::CodeGeneration => "code_generation",
            TaskType::CodeGenerationMulti => "code_generation_multi",
            TaskType::BugFixing => "bug_fixing",
            TaskType::Refactor => "refactor",
            TaskType::Architecture => "architecture",
            TaskType::TestGeneration => "test_generation",
            TaskType::Documentation => "documentation",
            TaskType::Research => "research",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown task type: {s}"))
    }
}

/// Configuration for one model offered by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name forwarded to the provider API
    pub name: String,
    /// Provider identifier owning this model
    pub provider: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to request in a single completion
    pub max_tokens: u32,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

/// Configuration for one provider: its endpoint and the models it serves,
/// addressed by short keys (`"code"`, `"fast"`, ...) used in the task chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub models: BTreeMap<String, ModelConfig>,
}

/// Tunables for the agent runtime.  These are the values the orchestrator
/// and tool executor read; they are fixed at startup.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Maximum model→tool round-trips per request
    pub max_tool_iterations: u32,
    /// Per-tool-call timeout
    pub tool_timeout: Duration,
    /// Timeout for package-install commands (pip/npm/cargo install)
    pub package_install_timeout: Duration,
    /// History length at which older turns are compacted into the summary
    pub summarize_threshold: usize,
    /// Character cap applied to file-content tool results
    pub file_result_cap: usize,
    /// Character cap applied to every other tool result
    pub generic_result_cap: usize,
    /// Size of the token events emitted when chunking a final response
    pub stream_chunk_chars: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: 30,
            tool_timeout: Duration::from_secs(30),
            package_install_timeout: Duration::from_secs(180),
            summarize_threshold: 5,
            file_result_cap: 30_000,
            generic_result_cap: 10_000,
            stream_chunk_chars: 10,
        }
    }
}

/// Static agent configuration: providers, per-task model chains and runtime
/// settings.  Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Per task type, the ordered `(provider, model_key)` fallback chain.
    /// First entry is primary, the rest are fallbacks.
    pub task_models: BTreeMap<TaskType, Vec<(String, String)>>,
    /// Task types that run the agentic tool loop
    pub tool_enabled: BTreeSet<TaskType>,
    pub settings: AgentSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self {
            providers: default_providers(),
            task_models: default_task_models(),
            tool_enabled: default_tool_enabled(),
            settings: AgentSettings::default(),
        }
    }

    /// The `(provider, model_key)` chain for a task.  Unknown tasks fall back
    /// to the chat chain.
    pub fn models_for_task(&self, task: TaskType) -> &[(String, String)] {
        self.task_models
            .get(&task)
            .or_else(|| self.task_models.get(&TaskType::Chat))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn is_provider_enabled(&self, name: &str) -> bool {
        self.providers.get(name).map(|p| p.enabled).unwrap_or(false)
    }

    pub fn model_config(&self, provider: &str, model_key: &str) -> Option<&ModelConfig> {
        self.providers.get(provider)?.models.get(model_key)
    }

    /// Resolve a model argument that may be either a config key (`"code"`)
    /// or a literal model name.  Keys take precedence.
    pub fn resolve_model(&self, provider: &str, key_or_name: &str) -> ModelConfig {
        if let Some(cfg) = self.model_config(provider, key_or_name) {
            return cfg.clone();
        }
        ModelConfig::new(key_or_name, provider)
    }

    pub fn is_tool_enabled(&self, task: TaskType) -> bool {
        self.tool_enabled.contains(&task)
    }

    /// The chain used for task classification: a fast short-context model
    /// first, then one fallback.  Classification never goes to the local
    /// provider (latency matters more than availability there).
    pub fn classifier_chain(&self) -> [(&'static str, &'static str); 2] {
        [("groq", "versatile"), ("cerebras", "code_gen")]
    }
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    let mut providers = BTreeMap::new();

    let mut ollama = BTreeMap::new();
    ollama.insert("chat".into(), ModelConfig::new("qwen3-vl:235b-instruct-cloud", "ollama"));
    ollama.insert("code".into(), ModelConfig::new("glm-4.7:cloud", "ollama"));
    ollama.insert("reasoning".into(), ModelConfig::new("gpt-oss:20b-cloud", "ollama"));
    ollama.insert("agentic".into(), ModelConfig::new("devstral-small-2:24b-cloud", "ollama"));
    providers.insert(
        "ollama".into(),
        ProviderConfig {
            enabled: true,
            base_url: Some("http://localhost:11434/v1".into()),
            models: ollama,
        },
    );

    let mut cerebras = BTreeMap::new();
    cerebras.insert("orchestrator".into(), ModelConfig::new("qwen-3-32b", "cerebras"));
    cerebras.insert(
        "complex".into(),
        ModelConfig::new("qwen-3-235b-a22b-instruct-2507", "cerebras"),
    );
    cerebras.insert("code_gen".into(), ModelConfig::new("zai-glm-4.7", "cerebras"));
    providers.insert(
        "cerebras".into(),
        ProviderConfig {
            enabled: true,
            base_url: Some("https://api.cerebras.ai/v1".into()),
            models: cerebras,
        },
    );

    let mut groq = BTreeMap::new();
    groq.insert("fast".into(), ModelConfig::new("llama-3.1-8b-instant", "groq"));
    groq.insert("versatile".into(), ModelConfig::new("llama-3.3-70b-versatile", "groq"));
    groq.insert("code".into(), ModelConfig::new("llama-3.1-70b-versatile", "groq"));
    providers.insert(
        "groq".into(),
        ProviderConfig {
            enabled: true,
            base_url: Some("https://api.groq.com/openai/v1".into()),
            models: groq,
        },
    );

    let mut cloudflare = BTreeMap::new();
    cloudflare.insert(
        "llama".into(),
        ModelConfig::new("@cf/meta/llama-3.1-70b-instruct", "cloudflare"),
    );
    cloudflare.insert(
        "qwen".into(),
        ModelConfig::new("@cf/qwen/qwen2.5-coder-32b-instruct", "cloudflare"),
    );
    providers.insert(
        "cloudflare".into(),
        ProviderConfig {
            enabled: true,
            base_url: None,
            models: cloudflare,
        },
    );

    providers
}

fn default_task_models() -> BTreeMap<TaskType, Vec<(String, String)>> {
    fn chain(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries.iter().map(|(p, k)| (p.to_string(), k.to_string())).collect()
    }

    let mut map = BTreeMap::new();
    map.insert(TaskType::Chat, chain(&[("ollama", "chat"), ("groq", "fast")]));
    map.insert(
        TaskType::CodeExplainSimple,
        chain(&[("ollama", "code"), ("groq", "versatile")]),
    );
    map.insert(
        TaskType::CodeExplainComplex,
        chain(&[("ollama", "code"), ("cerebras", "orchestrator"), ("groq", "versatile")]),
    );
    map.insert(
        TaskType::CodeGeneration,
        chain(&[("ollama", "code"), ("cerebras", "code_gen"), ("groq", "code")]),
    );
    map.insert(
        TaskType::CodeGenerationMulti,
        chain(&[("ollama", "agentic"), ("cerebras", "complex"), ("ollama", "code")]),
    );
    map.insert(
        TaskType::BugFixing,
        chain(&[("ollama", "agentic"), ("ollama", "code"), ("groq", "versatile")]),
    );
    map.insert(
        TaskType::Refactor,
        chain(&[("ollama", "code"), ("cerebras", "orchestrator"), ("groq", "versatile")]),
    );
    map.insert(
        TaskType::Architecture,
        chain(&[("ollama", "reasoning"), ("cerebras", "complex")]),
    );
    map.insert(
        TaskType::TestGeneration,
        chain(&[("ollama", "code"), ("groq", "versatile")]),
    );
    map.insert(
        TaskType::Documentation,
        chain(&[("ollama", "chat"), ("groq", "fast")]),
    );
    map.insert(
        TaskType::Research,
        chain(&[("groq", "versatile"), ("cerebras", "orchestrator")]),
    );
    map
}

fn default_tool_enabled() -> BTreeSet<TaskType> {
    [
        TaskType::CodeGeneration,
        TaskType::CodeGenerationMulti,
        TaskType::BugFixing,
        TaskType::Refactor,
        TaskType::TestGeneration,
        TaskType::Architecture,
        TaskType::CodeExplainSimple,
        TaskType::CodeExplainComplex,
    ]
    .into_iter()
    .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_round_trips_through_str() {
        for t in TaskType::ALL {
            let parsed: TaskType = t.as_str().parse().unwrap();
            assert_eq!(parsed, t);
        }
    }

    #[test]
    fn task_type_rejects_unknown() {
        assert!("not_a_task".parse::<TaskType>().is_err());
    }

    #[test]
    fn task_type_serde_uses_snake_case() {
        let json = serde_json::to_string(&TaskType::BugFixing).unwrap();
        assert_eq!(json, "\"bug_fixing\"");
        let back: TaskType = serde_json::from_str("\"code_generation_multi\"").unwrap();
        assert_eq!(back, TaskType::CodeGenerationMulti);
    }

    #[test]
    fn every_task_has_a_chain() {
        let cfg = AgentConfig::new();
        for t in TaskType::ALL {
            assert!(
                !cfg.models_for_task(t).is_empty(),
                "missing chain for {t}"
            );
        }
    }

    #[test]
    fn chains_reference_configured_models() {
        let cfg = AgentConfig::new();
        for (task, chain) in &cfg.task_models {
            for (provider, key) in chain {
                assert!(
                    cfg.model_config(provider, key).is_some(),
                    "{task}: {provider}/{key} not in provider table"
                );
            }
        }
    }

    #[test]
    fn unknown_task_falls_back_to_chat_chain() {
        let mut cfg = AgentConfig::new();
        cfg.task_models.remove(&TaskType::Research);
        let chain = cfg.models_for_task(TaskType::Research);
        assert_eq!(chain, cfg.models_for_task(TaskType::Chat));
    }

    #[test]
    fn chat_and_documentation_are_tool_free() {
        let cfg = AgentConfig::new();
        assert!(!cfg.is_tool_enabled(TaskType::Chat));
        assert!(!cfg.is_tool_enabled(TaskType::Documentation));
        assert!(!cfg.is_tool_enabled(TaskType::Research));
        assert!(cfg.is_tool_enabled(TaskType::BugFixing));
    }

    #[test]
    fn resolve_model_prefers_config_keys() {
        let cfg = AgentConfig::new();
        let resolved = cfg.resolve_model("ollama", "code");
        assert_eq!(resolved.name, "glm-4.7:cloud");
        // A literal model name passes through unchanged.
        let literal = cfg.resolve_model("ollama", "qwen2.5-coder:7b");
        assert_eq!(literal.name, "qwen2.5-coder:7b");
    }

    #[test]
    fn default_settings_match_loop_contract() {
        let s = AgentSettings::default();
        assert_eq!(s.max_tool_iterations, 30);
        assert_eq!(s.tool_timeout, Duration::from_secs(30));
        assert_eq!(s.package_install_timeout, Duration::from_secs(180));
        assert_eq!(s.file_result_cap, 30_000);
        assert_eq!(s.generic_result_cap, 10_000);
    }
}
