// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Provider registry: static metadata for every supported model provider.
//!
//! This is the single source of truth for which provider ids exist and how
//! they authenticate.  Construction logic lives in [`crate::router`].

/// Metadata describing a registered provider.
#[derive(Debug, Clone)]
pub struct ProviderMeta {
    /// Unique provider id used in configuration and task chains.
    pub id: &'static str,
    /// Human-readable display name.
    pub name: &'static str,
    /// One-line description for status output.
    pub description: &'static str,
    /// Whether an API credential is required.
    pub requires_key: bool,
    /// Whether the credential carries an account id (`account:token` pairs).
    pub keyed_by_account: bool,
}

pub static PROVIDERS: &[ProviderMeta] = &[
    ProviderMeta {
        id: "ollama",
        name: "Ollama",
        description: "Local inference server (OpenAI-compatible endpoint)",
        requires_key: false,
        keyed_by_account: false,
    },
    ProviderMeta {
        id: "cerebras",
        name: "Cerebras",
        description: "Cerebras fast inference platform",
        requires_key: true,
        keyed_by_account: false,
    },
    ProviderMeta {
        id: "groq",
        name: "Groq",
        description: "Groq LPU fast inference",
        requires_key: true,
        keyed_by_account: false,
    },
    ProviderMeta {
        id: "cloudflare",
        name: "Cloudflare Workers AI",
        description: "Cloudflare account-scoped AI endpoint",
        requires_key: true,
        keyed_by_account: true,
    },
    ProviderMeta {
        id: "mock",
        name: "Mock",
        description: "Mock provider for tests (no network, echoes input)",
        requires_key: false,
        keyed_by_account: false,
    },
];

/// All registered providers in declaration order.
pub fn provider_metas() -> &'static [ProviderMeta] {
    PROVIDERS
}

/// Look up a provider by id.  Returns `None` for unknown ids.
pub fn get_provider_meta(id: &str) -> Option<&'static ProviderMeta> {
    PROVIDERS.iter().find(|p| p.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_non_empty() {
        assert!(!PROVIDERS.is_empty());
    }

    #[test]
    fn all_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for p in PROVIDERS {
            assert!(seen.insert(p.id), "duplicate provider id: {}", p.id);
        }
    }

    #[test]
    fn lookup_finds_known_provider() {
        let meta = get_provider_meta("cloudflare").expect("cloudflare must be registered");
        assert!(meta.keyed_by_account);
    }

    #[test]
    fn lookup_returns_none_for_unknown() {
        assert!(get_provider_meta("totally-unknown").is_none());
    }

    #[test]
    fn local_provider_needs_no_key() {
        assert!(!get_provider_meta("ollama").unwrap().requires_key);
    }
}
