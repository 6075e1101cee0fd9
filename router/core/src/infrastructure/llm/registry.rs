// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Provider Name Resolution and Adapter Construction
//
// Maps provider names (the prefix of a model identifier) to constructor
// closures. Populated once at start-up; every closure captures the shared
// upstream client for its provider, so constructing an adapter is cheap and
// performs no I/O.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::config::{resolve_secret, ProviderConfig, RouterConfig};
use crate::domain::llm::{LLMError, ProviderAdapter};
use crate::domain::routing::Route;

use super::client::UpstreamClient;
use super::deepseek::DeepSeekAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

/// Builds an adapter bound to one model name
pub type AdapterFactory = Arc<dyn Fn(&str) -> Box<dyn ProviderAdapter> + Send + Sync>;

/// Registry of adapter constructors keyed by provider name
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create provider registry from router configuration
    pub fn from_config(config: &RouterConfig) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        info!("Initializing LLM provider registry");

        for provider_config in &config.spec.providers {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            info!(
                "Registering provider: {} ({} at {})",
                provider_config.name, provider_config.provider_type, provider_config.endpoint
            );
            let factory = Self::create_factory(provider_config)?;
            registry.register(provider_config.name.clone(), factory);
        }

        if registry.factories.is_empty() {
            warn!("No LLM providers configured - every request will be rejected");
        }

        Ok(registry)
    }

    /// Create a constructor closure from provider configuration
    fn create_factory(config: &ProviderConfig) -> anyhow::Result<AdapterFactory> {
        let api_key = Self::resolve_api_key(config);
        let client = Arc::new(UpstreamClient::new(
            config.name.clone(),
            config.endpoint.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        ));

        let factory: AdapterFactory = match config.provider_type.as_str() {
            // OpenAI-compatible APIs (LM Studio, vLLM, etc.) share the OpenAI adapter
            "openai" | "openai-compatible" => Arc::new(move |model: &str| {
                Box::new(OpenAIAdapter::new(Arc::clone(&client), model)) as Box<dyn ProviderAdapter>
            }),
            "ollama" => Arc::new(move |model: &str| {
                Box::new(OllamaAdapter::new(Arc::clone(&client), model)) as Box<dyn ProviderAdapter>
            }),
            "deepseek" => Arc::new(move |model: &str| {
                Box::new(DeepSeekAdapter::new(Arc::clone(&client), model)) as Box<dyn ProviderAdapter>
            }),
            _ => anyhow::bail!("Unsupported provider type: {}", config.provider_type),
        };

        Ok(factory)
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax).
    /// A missing variable leaves the provider registered without credentials.
    fn resolve_api_key(config: &ProviderConfig) -> Option<String> {
        match resolve_secret(&config.api_key) {
            Ok(key) => key,
            Err(e) => {
                warn!(
                    "Provider '{}' has no usable API key: {}. Upstream calls will be unauthenticated.",
                    config.name, e
                );
                None
            }
        }
    }

    /// Register (or replace) the constructor for a provider name
    pub fn register(&mut self, provider: impl Into<String>, factory: AdapterFactory) {
        self.factories.insert(provider.into(), factory);
    }

    /// Look up the constructor for a provider name
    pub fn load(&self, provider: &str) -> Result<&AdapterFactory, LLMError> {
        self.factories
            .get(provider)
            .ok_or_else(|| LLMError::UnsupportedProvider(provider.to_string()))
    }

    /// Construct the adapter a route points at
    pub fn resolve(&self, route: &Route) -> Result<Box<dyn ProviderAdapter>, LLMError> {
        let factory = self.load(route.provider())?;
        Ok(factory(route.model_name()))
    }

    /// Registered provider names, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_provider(&self, provider: &str) -> bool {
        self.factories.contains_key(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model_id::ModelIdentifier;

    #[test]
    fn test_registry_from_default_config() {
        let registry = ProviderRegistry::from_config(&RouterConfig::default()).unwrap();
        assert_eq!(registry.providers(), vec!["deepseek", "ollama", "openai"]);
        assert!(registry.has_provider("ollama"));
    }

    #[test]
    fn test_disabled_provider_is_not_registered() {
        let mut config = RouterConfig::default();
        for provider in &mut config.spec.providers {
            provider.enabled = provider.name == "ollama";
        }

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.providers(), vec!["ollama"]);
        assert!(matches!(
            registry.load("openai"),
            Err(LLMError::UnsupportedProvider(name)) if name == "openai"
        ));
    }

    #[test]
    fn test_resolve_binds_model_name() {
        let registry = ProviderRegistry::from_config(&RouterConfig::default()).unwrap();

        let adapter = registry
            .resolve(&Route::new(ModelIdentifier::parse("ollama:llama3:8b", "openai")))
            .unwrap();
        assert_eq!(adapter.provider(), "ollama");
        assert_eq!(adapter.model(), "llama3:8b");

        let err = registry
            .resolve(&Route::new(ModelIdentifier::parse("unknown-provider:x", "openai")))
            .err()
            .unwrap();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.client_message(), "Unsupported provider: unknown-provider");
    }

    #[test]
    fn test_unknown_provider_type_fails() {
        let mut config = RouterConfig::default();
        config.spec.providers[0].provider_type = "mistral".to_string();
        assert!(ProviderRegistry::from_config(&config).is_err());
    }
}
