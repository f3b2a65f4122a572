// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Task-aware model routing with fallback.
//!
//! A task type maps to an ordered `(provider, model_key)` chain.  The router
//! walks the chain, skipping providers without usable credentials, and hands
//! back a constructed [`ChatModel`].  `invoke_with_fallback` additionally
//! rotates credentials and advances the chain when an invocation fails.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use quasar_config::{AgentConfig, ModelConfig, TaskType};

use crate::{
    credentials::{CredentialScope, CredentialStore, RequestCredentials},
    openai_compat::{AuthStyle, OpenAICompatProvider},
    AssistantTurn, ChatModel, CompletionRequest, MockProvider,
};

/// The model the router falls back to when every chain entry is exhausted.
const EMERGENCY_MODEL: &str = "qwen2.5-coder:7b";

/// A constructed model handle plus the identity it was resolved from.
#[derive(Clone)]
pub struct SelectedModel {
    pub model: Arc<dyn ChatModel>,
    pub provider: String,
    pub model_name: String,
}

/// Builds a [`ChatModel`] from `(provider_id, model_config, credential,
/// base_url)`.  Swapped out in tests to inject scripted providers.
pub type ModelFactory =
    dyn Fn(&str, &ModelConfig, Option<&str>, Option<&str>) -> anyhow::Result<Arc<dyn ChatModel>>
        + Send
        + Sync;

pub struct ModelRouter {
    config: Arc<AgentConfig>,
    credentials: Arc<CredentialStore>,
    factory: Box<ModelFactory>,
}

impl ModelRouter {
    pub fn new(config: Arc<AgentConfig>, credentials: Arc<CredentialStore>) -> Self {
        Self::with_factory(config, credentials, Box::new(default_factory))
    }

    pub fn with_factory(
        config: Arc<AgentConfig>,
        credentials: Arc<CredentialStore>,
        factory: Box<ModelFactory>,
    ) -> Self {
        Self { config, credentials, factory }
    }

    pub fn config(&self) -> &Arc<AgentConfig> {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn scope<'a>(&'a self, overlay: Option<&'a RequestCredentials>) -> CredentialScope<'a> {
        CredentialScope::new(&self.credentials, overlay)
    }

    /// Providers that currently have usable credentials.
    pub fn available_providers(&self, overlay: Option<&RequestCredentials>) -> Vec<String> {
        let scope = self.scope(overlay);
        self.config
            .providers
            .keys()
            .filter(|p| scope.is_available(p))
            .cloned()
            .collect()
    }

    fn base_url_for(&self, provider: &str, scope: &CredentialScope<'_>) -> Option<String> {
        if provider == "ollama" {
            if let Some(url) = scope.setting("ollama_url") {
                return Some(url);
            }
        }
        self.config.provider(provider).and_then(|p| p.base_url.clone())
    }

    fn construct(
        &self,
        provider: &str,
        model_cfg: &ModelConfig,
        scope: &CredentialScope<'_>,
    ) -> anyhow::Result<Arc<dyn ChatModel>> {
        let credential = scope.get(provider);
        let base_url = self.base_url_for(provider, scope);
        (self.factory)(provider, model_cfg, credential.as_deref(), base_url.as_deref())
    }

    /// Resolve the model for `task` at the given fallback level, advancing
    /// past disabled or unavailable providers.  When the chain is exhausted
    /// the emergency local model is used.
    pub fn model_for_task(
        &self,
        task: TaskType,
        level: usize,
        overlay: Option<&RequestCredentials>,
    ) -> Option<SelectedModel> {
        let scope = self.scope(overlay);
        let chain = self.config.models_for_task(task);

        if level >= chain.len() {
            let cfg = ModelConfig::new(EMERGENCY_MODEL, "ollama");
            return match self.construct("ollama", &cfg, &scope) {
                Ok(model) => Some(SelectedModel {
                    model,
                    provider: "ollama".into(),
                    model_name: EMERGENCY_MODEL.into(),
                }),
                Err(e) => {
                    warn!("emergency model construction failed: {e}");
                    None
                }
            };
        }

        let (provider, key) = &chain[level];
        if !self.config.is_provider_enabled(provider) || !scope.is_available(provider) {
            return self.model_for_task(task, level + 1, overlay);
        }
        let Some(model_cfg) = self.config.model_config(provider, key) else {
            return self.model_for_task(task, level + 1, overlay);
        };
        match self.construct(provider, model_cfg, &scope) {
            Ok(model) => Some(SelectedModel {
                model,
                provider: provider.clone(),
                model_name: model_cfg.name.clone(),
            }),
            Err(e) => {
                warn!(provider = %provider, "model construction failed: {e}");
                self.model_for_task(task, level + 1, overlay)
            }
        }
    }

    /// Resolve a specific `(provider, model)` pair.  `key_or_name` may be a
    /// config key (`"code"`) or a literal model name.
    pub fn model_for_provider(
        &self,
        provider: &str,
        key_or_name: &str,
        overlay: Option<&RequestCredentials>,
    ) -> anyhow::Result<SelectedModel> {
        let scope = self.scope(overlay);
        let model_cfg = self.config.resolve_model(provider, key_or_name);
        let model = self
            .construct(provider, &model_cfg, &scope)
            .with_context(|| format!("could not load model {provider}/{key_or_name}"))?;
        Ok(SelectedModel {
            model,
            provider: provider.to_string(),
            model_name: model_cfg.name,
        })
    }

    /// Invoke the task's chain in order, rotating credentials and advancing
    /// on failure.  Returns the turn plus the identity that produced it.
    pub async fn invoke_with_fallback(
        &self,
        task: TaskType,
        req: CompletionRequest,
        overlay: Option<&RequestCredentials>,
    ) -> anyhow::Result<(AssistantTurn, String, String)> {
        let scope = self.scope(overlay);
        let chain = self.config.models_for_task(task).to_vec();
        info!(task = %task, levels = chain.len(), "invoking with fallback");

        for (level, (provider, key)) in chain.iter().enumerate() {
            if !self.config.is_provider_enabled(provider) || !scope.is_available(provider) {
                continue;
            }
            let Some(model_cfg) = self.config.model_config(provider, key) else {
                continue;
            };
            let model = match self.construct(provider, model_cfg, &scope) {
                Ok(m) => m,
                Err(e) => {
                    warn!(provider = %provider, level, "construction failed: {e}");
                    continue;
                }
            };
            match model.invoke(req.clone()).await {
                Ok(turn) => {
                    info!(provider = %provider, model = %model_cfg.name, "fallback level {level} succeeded");
                    return Ok((turn, provider.clone(), model_cfg.name.clone()));
                }
                Err(e) => {
                    warn!(provider = %provider, level, "invocation failed: {e}");
                    scope.rotate(provider);
                }
            }
        }

        // Chain exhausted: local emergency fallback.
        warn!("all chain entries failed, trying emergency local model");
        let cfg = ModelConfig::new(EMERGENCY_MODEL, "ollama");
        let model = self.construct("ollama", &cfg, &scope)?;
        let turn = model
            .invoke(req)
            .await
            .context("all models failed, including the emergency local fallback")?;
        Ok((turn, "ollama".into(), EMERGENCY_MODEL.into()))
    }
}

/// True when an error looks like a provider rate limit: an HTTP 429 status
/// or rate-limit / quota wording in the body.
pub fn is_rate_limit(err: &anyhow::Error) -> bool {
    let msg = format!("{err:#}");
    let lower = msg.to_lowercase();
    msg.contains("429") || lower.contains("rate limit") || lower.contains("quota")
}

/// Default factory: constructs the real HTTP-backed providers.
fn default_factory(
    provider: &str,
    cfg: &ModelConfig,
    credential: Option<&str>,
    base_url: Option<&str>,
) -> anyhow::Result<Arc<dyn ChatModel>> {
    match provider {
        "ollama" => {
            let base = base_url.unwrap_or("http://localhost:11434/v1");
            Ok(Arc::new(OpenAICompatProvider::new(
                "ollama",
                cfg.name.clone(),
                None,
                base,
                cfg.max_tokens,
                cfg.temperature,
                AuthStyle::None,
            )))
        }
        "cerebras" | "groq" => {
            let key = credential
                .with_context(|| format!("no active credential for {provider}"))?;
            let base = base_url.with_context(|| format!("no base_url configured for {provider}"))?;
            Ok(Arc::new(OpenAICompatProvider::new(
                provider.to_string(),
                cfg.name.clone(),
                Some(key.to_string()),
                base,
                cfg.max_tokens,
                cfg.temperature,
                AuthStyle::Bearer,
            )))
        }
        "cloudflare" => {
            // Credential is stored as `account_id:token`; the account id is
            // part of the URL, the token authenticates as a bearer.
            let pair = credential.context("no active credential for cloudflare")?;
            let (account, token) = pair
                .split_once(':')
                .context("cloudflare credential must be account_id:token")?;
            let chat_url = format!(
                "https://api.cloudflare.com/client/v4/accounts/{account}/ai/v1/chat/completions"
            );
            Ok(Arc::new(OpenAICompatProvider::with_full_chat_url(
                "cloudflare",
                cfg.name.clone(),
                Some(token.to_string()),
                chat_url,
                cfg.max_tokens,
                cfg.temperature,
                AuthStyle::Bearer,
            )))
        }
        "mock" => Ok(Arc::new(MockProvider)),
        other => anyhow::bail!("unknown provider: {other}"),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
