//! Provider router — builds the configured language-model provider.

use std::collections::HashMap;
use std::sync::Arc;
use fintrack_config::AppConfig;
use fintrack_core::provider::Provider;
use tracing::warn;
use crate::openai_compat::OpenAiCompatProvider;

/// Named providers plus the one requests go to by default.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// The provider named by `default_provider`.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn default_name(&self) -> &str {
        &self.default_provider
    }

    /// Registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// Every `[providers.<name>]` table becomes an OpenAI-compatible client. The
/// default provider is registered from the top-level API key and its
/// well-known base URL when it has no table of its own. Providers with
/// neither an `api_url` nor a well-known URL are skipped.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = provider_config
            .api_key
            .clone()
            .or_else(|| config.api_key.clone())
            .unwrap_or_default();

        let Some(base_url) = provider_config
            .api_url
            .clone()
            .or_else(|| default_base_url(name))
        else {
            warn!(provider = %name, "No api_url for provider, skipping");
            continue;
        };

        router.register(
            name.clone(),
            Arc::new(OpenAiCompatProvider::new(name, &base_url, &api_key)),
        );
    }

    if router.get(&config.default_provider).is_some() {
        return router;
    }

    if let Some(base_url) = default_base_url(&config.default_provider) {
        let api_key = config.api_key.clone().unwrap_or_default();
        router.register(
            config.default_provider.clone(),
            Arc::new(OpenAiCompatProvider::new(
                &config.default_provider,
                &base_url,
                &api_key,
            )),
        );
    }

    router
}

/// Model to use for the default provider: its own `default_model`, else the global one.
pub fn resolve_model(config: &AppConfig) -> String {
    config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone())
}

fn default_base_url(provider_name: &str) -> Option<String> {
    let url = match provider_name {
        "gemini" => "https://generativelanguage.googleapis.com/v1beta/openai",
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "groq" => "https://api.groq.com/openai/v1",
        "vllm" => "http://localhost:8000/v1",
        _ => return None,
    };
    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintrack_config::ProviderConfig;

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("gemini");
        router.register("gemini", Arc::new(OpenAiCompatProvider::new("gemini", "https://example.test/v1", "k")));

        assert!(router.get("gemini").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
        assert_eq!(router.default_name(), "gemini");
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("gemini").unwrap().contains("generativelanguage"));
        assert!(default_base_url("openai").unwrap().contains("api.openai.com"));
        assert!(default_base_url("ollama").unwrap().contains("localhost:11434"));
        assert!(default_base_url("mystery").is_none());
    }

    #[test]
    fn build_from_default_config() {
        let router = build_from_config(&AppConfig::default());
        let provider = router.default().unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn configured_providers_are_registered() {
        let mut config = AppConfig::default();
        config.default_provider = "openai".into();
        config.providers.insert(
            "local".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://localhost:9999/v1".into()),
                default_model: Some("llama3".into()),
            },
        );

        let router = build_from_config(&config);
        assert_eq!(router.list(), ["local", "openai"]);
        assert_eq!(router.default().unwrap().name(), "openai");
    }

    #[test]
    fn unknown_default_provider_is_not_registered() {
        let mut config = AppConfig::default();
        config.default_provider = "mystery".into();
        config.providers.insert(
            "nourl".into(),
            ProviderConfig {
                api_key: Some("k".into()),
                api_url: None,
                default_model: None,
            },
        );

        let router = build_from_config(&config);
        assert!(router.default().is_none());
        assert!(router.list().is_empty());
    }

    #[test]
    fn model_resolution_prefers_provider_default() {
        let mut config = AppConfig::default();
        assert_eq!(resolve_model(&config), config.default_model);

        config.providers.insert(
            "gemini".into(),
            ProviderConfig {
                api_key: None,
                api_url: None,
                default_model: Some("gemini-1.5-pro".into()),
            },
        );
        assert_eq!(resolve_model(&config), "gemini-1.5-pro");
    }
}
