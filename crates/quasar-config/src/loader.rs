// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;
use std::env;

use tracing::info;

use crate::schema::AgentConfig;

/// Credentials and endpoint overrides read from the environment once at
/// startup.
///
/// Key slots follow the `<PROVIDER>_API_KEY_<n>` convention (two slots per
/// provider).  Cloudflare needs an account identifier as well; its pairs are
/// stored as a single `account_id:token` string so the rest of the credential
/// machinery can treat every provider uniformly.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    /// provider id → ordered list of keys
    pub providers: BTreeMap<String, Vec<String>>,
    pub ollama_url: Option<String>,
    pub tavily_api_key: Option<String>,
    pub searx_host: Option<String>,
}

impl EnvCredentials {
    pub fn keys_for(&self, provider: &str) -> &[String] {
        self.providers.get(provider).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Read all provider credentials and endpoint overrides from the process
/// environment.  Called once at startup; the result is immutable afterwards.
pub fn load_env() -> EnvCredentials {
    let mut providers: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for name in ["CEREBRAS", "GROQ"] {
        let mut keys = Vec::new();
        for i in 1..=2 {
            if let Ok(key) = env::var(format!("{name}_API_KEY_{i}")) {
                if !key.is_empty() {
                    keys.push(key);
                }
            }
        }
        let provider = name.to_ascii_lowercase();
        info!(provider = %provider, keys = keys.len(), "credentials loaded");
        providers.insert(provider, keys);
    }

    let mut cloudflare = Vec::new();
    for i in 1..=2 {
        let account = env::var(format!("CLOUDFLARE_ACCOUNT_ID_{i}")).ok();
        let token = env::var(format!("CLOUDFLARE_API_TOKEN_{i}")).ok();
        if let (Some(account), Some(token)) = (account, token) {
            if !account.is_empty() && !token.is_empty() {
                cloudflare.push(format!("{account}:{token}"));
            }
        }
    }
    info!(provider = "cloudflare", keys = cloudflare.len(), "credentials loaded");
    providers.insert("cloudflare".into(), cloudflare);

    EnvCredentials {
        providers,
        ollama_url: env::var("OLLAMA_URL").ok().filter(|s| !s.is_empty()),
        tavily_api_key: env::var("TAVILY_API_KEY").ok().filter(|s| !s.is_empty()),
        searx_host: env::var("SEARX_HOST").ok().filter(|s| !s.is_empty()),
    }
}

/// Apply environment overrides to the static configuration.
pub fn apply_env(config: &mut AgentConfig, env: &EnvCredentials) {
    if let Some(url) = &env.ollama_url {
        if let Some(ollama) = config.providers.get_mut("ollama") {
            ollama.base_url = Some(url.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_for_unknown_provider_is_empty() {
        let creds = EnvCredentials::default();
        assert!(creds.keys_for("groq").is_empty());
    }

    #[test]
    fn apply_env_overrides_ollama_url() {
        let mut cfg = AgentConfig::new();
        let env = EnvCredentials {
            ollama_url: Some("http://10.0.0.5:11434/v1".into()),
            ..Default::default()
        };
        apply_env(&mut cfg, &env);
        assert_eq!(
            cfg.providers["ollama"].base_url.as_deref(),
            Some("http://10.0.0.5:11434/v1")
        );
    }

    #[test]
    fn apply_env_without_override_keeps_default() {
        let mut cfg = AgentConfig::new();
        apply_env(&mut cfg, &EnvCredentials::default());
        assert_eq!(
            cfg.providers["ollama"].base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }
}
