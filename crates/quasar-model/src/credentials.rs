// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Credential storage with rotate-on-rate-limit semantics.
//!
//! The process owns one [`CredentialStore`].  A request may carry its own
//! keys; those live in a [`RequestCredentials`] overlay that is threaded
//! explicitly through the orchestrator and consulted before the store, so
//! user keys never leak across requests and rotations on user keys never
//! touch the process-wide state.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::Serialize;

use quasar_config::EnvCredentials;

/// A single credential entry.
#[derive(Debug, Clone)]
pub struct Credential {
    pub key: String,
    pub active: bool,
}

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), active: true }
    }
}

/// Ordered credentials for one provider plus the rotation cursor.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub credentials: Vec<Credential>,
    pub cursor: usize,
}

impl ProviderCredentials {
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Self {
        Self {
            credentials: keys.iter().map(|k| Credential::new(k.as_ref())).collect(),
            cursor: 0,
        }
    }

    /// The credential at the cursor, if it is still active.
    pub fn current(&self) -> Option<&str> {
        let cred = self.credentials.get(self.cursor)?;
        cred.active.then_some(cred.key.as_str())
    }

    /// Mark the current credential inactive and advance to the next active
    /// one (wrapping).  Returns `false` when no active credential remains.
    pub fn rotate(&mut self) -> bool {
        if self.credentials.is_empty() {
            return false;
        }
        if let Some(cred) = self.credentials.get_mut(self.cursor) {
            cred.active = false;
        }
        let len = self.credentials.len();
        for offset in 1..len {
            let idx = (self.cursor + offset) % len;
            if self.credentials[idx].active {
                self.cursor = idx;
                return true;
            }
        }
        false
    }

    pub fn any_active(&self) -> bool {
        self.credentials.iter().any(|c| c.active)
    }

    pub fn active_count(&self) -> usize {
        self.credentials.iter().filter(|c| c.active).count()
    }
}

/// Availability snapshot for one provider, as reported by the health surface.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialStatus {
    pub available: bool,
    pub total_keys: usize,
    pub active_keys: usize,
    pub user_provided: bool,
}

/// Process-wide credential store.  Rotations take the write lock so they are
/// atomic with respect to concurrent readers.
#[derive(Debug, Default)]
pub struct CredentialStore {
    providers: RwLock<BTreeMap<String, ProviderCredentials>>,
}

impl CredentialStore {
    pub fn from_env(env: &EnvCredentials) -> Self {
        let mut providers = BTreeMap::new();
        for (provider, keys) in &env.providers {
            providers.insert(provider.clone(), ProviderCredentials::from_keys(keys));
        }
        // Every remote provider gets an entry even with no keys, so the
        // health surface can report it as unavailable rather than unknown.
        for provider in ["cerebras", "groq", "cloudflare"] {
            providers.entry(provider.into()).or_default();
        }
        // Local provider needs no key; a single synthetic credential keeps
        // the rotation machinery uniform.
        providers.insert("ollama".into(), ProviderCredentials::from_keys(&["local"]));
        Self { providers: RwLock::new(providers) }
    }

    pub fn get(&self, provider: &str) -> Option<String> {
        let providers = self.providers.read().expect("credential lock poisoned");
        providers.get(provider)?.current().map(str::to_string)
    }

    pub fn rotate(&self, provider: &str) -> bool {
        let mut providers = self.providers.write().expect("credential lock poisoned");
        providers.get_mut(provider).map(|p| p.rotate()).unwrap_or(false)
    }

    pub fn is_available(&self, provider: &str) -> bool {
        if provider == "ollama" {
            return true;
        }
        let providers = self.providers.read().expect("credential lock poisoned");
        providers.get(provider).map(|p| p.any_active()).unwrap_or(false)
    }

    /// Reactivate every credential (daily quota reset).
    pub fn reset(&self) {
        let mut providers = self.providers.write().expect("credential lock poisoned");
        for creds in providers.values_mut() {
            for c in &mut creds.credentials {
                c.active = true;
            }
            creds.cursor = 0;
        }
    }

    /// Status of every provider, with request-scoped overrides reflected
    /// when an overlay is present.
    pub fn status(&self, overlay: Option<&RequestCredentials>) -> BTreeMap<String, CredentialStatus> {
        let providers = self.providers.read().expect("credential lock poisoned");
        let mut out = BTreeMap::new();
        for (name, creds) in providers.iter() {
            let (total, active, user_provided) = match overlay.and_then(|o| o.snapshot(name)) {
                Some(user) => (user.credentials.len(), user.active_count(), true),
                None => (creds.credentials.len(), creds.active_count(), false),
            };
            out.insert(
                name.clone(),
                CredentialStatus {
                    available: name == "ollama" || active > 0,
                    total_keys: total,
                    active_keys: active,
                    user_provided,
                },
            );
        }
        out
    }
}

/// Request-scoped credential overrides plus free-form settings (for example
/// a per-request Ollama URL).  Dropped when the request ends.
#[derive(Debug, Default)]
pub struct RequestCredentials {
    providers: RwLock<BTreeMap<String, ProviderCredentials>>,
    settings: BTreeMap<String, String>,
}

impl RequestCredentials {
    pub fn new(provider_keys: BTreeMap<String, Vec<String>>, settings: BTreeMap<String, String>) -> Self {
        let providers = provider_keys
            .into_iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(p, keys)| (p, ProviderCredentials::from_keys(&keys)))
            .collect();
        Self { providers: RwLock::new(providers), settings }
    }

    pub fn overrides(&self, provider: &str) -> bool {
        self.providers.read().expect("overlay lock poisoned").contains_key(provider)
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    fn get(&self, provider: &str) -> Option<String> {
        let providers = self.providers.read().expect("overlay lock poisoned");
        providers.get(provider)?.current().map(str::to_string)
    }

    fn rotate(&self, provider: &str) -> bool {
        let mut providers = self.providers.write().expect("overlay lock poisoned");
        providers.get_mut(provider).map(|p| p.rotate()).unwrap_or(false)
    }

    fn snapshot(&self, provider: &str) -> Option<ProviderCredentials> {
        self.providers.read().expect("overlay lock poisoned").get(provider).cloned()
    }
}

/// View over the store with an optional request overlay.  Lookups and
/// rotations go to the overlay first for providers it overrides.
#[derive(Clone, Copy)]
pub struct CredentialScope<'a> {
    pub store: &'a CredentialStore,
    pub overlay: Option<&'a RequestCredentials>,
}

impl<'a> CredentialScope<'a> {
    pub fn new(store: &'a CredentialStore, overlay: Option<&'a RequestCredentials>) -> Self {
        Self { store, overlay }
    }

    pub fn get(&self, provider: &str) -> Option<String> {
        if let Some(overlay) = self.overlay {
            if overlay.overrides(provider) {
                return overlay.get(provider);
            }
        }
        self.store.get(provider)
    }

    pub fn rotate(&self, provider: &str) -> bool {
        if let Some(overlay) = self.overlay {
            if overlay.overrides(provider) {
                return overlay.rotate(provider);
            }
        }
        self.store.rotate(provider)
    }

    pub fn is_available(&self, provider: &str) -> bool {
        if provider == "ollama" {
            return true;
        }
        if let Some(overlay) = self.overlay {
            if overlay.overrides(provider) {
                return overlay.snapshot(provider).map(|p| p.any_active()).unwrap_or(false);
            }
        }
        self.store.is_available(provider)
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.overlay.and_then(|o| o.setting(key)).map(str::to_string)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(provider: &str, keys: &[&str]) -> CredentialStore {
        let mut env = EnvCredentials::default();
        env.providers.insert(provider.into(), keys.iter().map(|k| k.to_string()).collect());
        CredentialStore::from_env(&env)
    }

    #[test]
    fn get_returns_first_key() {
        let store = store_with("groq", &["k1", "k2"]);
        assert_eq!(store.get("groq").as_deref(), Some("k1"));
    }

    #[test]
    fn rotate_advances_and_deactivates_current() {
        let store = store_with("groq", &["k1", "k2"]);
        assert!(store.rotate("groq"));
        assert_eq!(store.get("groq").as_deref(), Some("k2"));
        // k1 was marked inactive, so a second rotation finds nothing.
        assert!(!store.rotate("groq"));
        assert!(store.get("groq").is_none());
    }

    #[test]
    fn rotate_single_key_exhausts() {
        let store = store_with("cerebras", &["only"]);
        assert!(!store.rotate("cerebras"));
        assert!(!store.is_available("cerebras"));
    }

    #[test]
    fn rotate_unknown_provider_is_false() {
        let store = CredentialStore::from_env(&EnvCredentials::default());
        assert!(!store.rotate("nope"));
    }

    #[test]
    fn ollama_is_always_available() {
        let store = CredentialStore::from_env(&EnvCredentials::default());
        assert!(store.is_available("ollama"));
        assert_eq!(store.get("ollama").as_deref(), Some("local"));
    }

    #[test]
    fn provider_without_keys_is_unavailable() {
        let store = CredentialStore::from_env(&EnvCredentials::default());
        assert!(!store.is_available("groq"));
    }

    #[test]
    fn reset_reactivates_everything() {
        let store = store_with("groq", &["k1", "k2"]);
        store.rotate("groq");
        store.rotate("groq");
        assert!(!store.is_available("groq"));
        store.reset();
        assert!(store.is_available("groq"));
        assert_eq!(store.get("groq").as_deref(), Some("k1"));
    }

    #[test]
    fn overlay_takes_precedence_for_overridden_provider() {
        let store = store_with("groq", &["process-key"]);
        let overlay = RequestCredentials::new(
            [("groq".to_string(), vec!["user-key".to_string()])].into_iter().collect(),
            BTreeMap::new(),
        );
        let scope = CredentialScope::new(&store, Some(&overlay));
        assert_eq!(scope.get("groq").as_deref(), Some("user-key"));
        // Providers not overridden still resolve from the store.
        assert_eq!(scope.get("ollama").as_deref(), Some("local"));
    }

    #[test]
    fn overlay_rotation_never_touches_the_store() {
        let store = store_with("groq", &["process-key"]);
        let overlay = RequestCredentials::new(
            [("groq".to_string(), vec!["u1".to_string(), "u2".to_string()])]
                .into_iter()
                .collect(),
            BTreeMap::new(),
        );
        let scope = CredentialScope::new(&store, Some(&overlay));
        assert!(scope.rotate("groq"));
        assert_eq!(scope.get("groq").as_deref(), Some("u2"));
        // Process store is untouched.
        assert_eq!(store.get("groq").as_deref(), Some("process-key"));
    }

    #[test]
    fn status_reports_user_override() {
        let store = store_with("groq", &["k1", "k2"]);
        let overlay = RequestCredentials::new(
            [("groq".to_string(), vec!["u1".to_string()])].into_iter().collect(),
            BTreeMap::new(),
        );
        let status = store.status(Some(&overlay));
        let groq = &status["groq"];
        assert!(groq.user_provided);
        assert_eq!(groq.total_keys, 1);
        let without = store.status(None);
        assert!(!without["groq"].user_provided);
        assert_eq!(without["groq"].total_keys, 2);
    }

    #[test]
    fn scope_setting_reads_overlay_settings() {
        let store = CredentialStore::from_env(&EnvCredentials::default());
        let overlay = RequestCredentials::new(
            BTreeMap::new(),
            [("ollama_url".to_string(), "http://box:11434/v1".to_string())]
                .into_iter()
                .collect(),
        );
        let scope = CredentialScope::new(&store, Some(&overlay));
        assert_eq!(scope.setting("ollama_url").as_deref(), Some("http://box:11434/v1"));
        assert!(scope.setting("missing").is_none());
    }
}
