// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Gateway Service
//
// The single entry point used by the HTTP layer:
// validation -> dispatcher construction -> forwarding.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::dispatcher::Dispatcher;
use crate::domain::chat::{ChatRequest, ChatResult, EmbeddingRequest, EmbeddingResult};
use crate::domain::config::{LimitsConfig, RouterConfig};
use crate::domain::llm::{ChatStream, LLMError};
use crate::domain::routing::{DefaultRouteSelector, RequestKind, RequestPayload, Route, RouteSelector};
use crate::domain::validation::{validate_chat, validate_embedding, ValidationError};
use crate::infrastructure::llm::ProviderRegistry;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Adapter(#[from] LLMError),
}

impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Validation(e) => e.status_code(),
            GatewayError::Adapter(e) => e.status_code(),
        }
    }

    /// Message safe to return to the caller
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Validation(e) => e.to_string(),
            GatewayError::Adapter(e) => e.client_message(),
        }
    }
}

pub struct GatewayService {
    limits: LimitsConfig,
    selector: Arc<dyn RouteSelector>,
    registry: Arc<ProviderRegistry>,
}

impl GatewayService {
    pub fn new(
        limits: LimitsConfig,
        selector: Arc<dyn RouteSelector>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            limits,
            selector,
            registry,
        }
    }

    pub fn from_config(config: &RouterConfig) -> anyhow::Result<Self> {
        let registry = ProviderRegistry::from_config(config)?;
        let selector = DefaultRouteSelector::new(config.spec.routing.clone());
        Ok(Self::new(
            config.spec.limits.clone(),
            Arc::new(selector),
            Arc::new(registry),
        ))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    fn dispatcher(
        &self,
        kind: RequestKind,
        payload: RequestPayload<'_>,
    ) -> Result<Dispatcher, LLMError> {
        let dispatcher = Dispatcher::new(kind, payload, self.selector.as_ref(), &self.registry)
            .inspect_err(|e| warn!(kind = kind.as_str(), "Route rejected: {}", e))?;

        info!(
            kind = kind.as_str(),
            provider = dispatcher.route().provider(),
            model = dispatcher.route().model_name(),
            "Dispatching request"
        );
        Ok(dispatcher)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResult, GatewayError> {
        validate_chat(request, &self.limits)?;
        let dispatcher = self.dispatcher(RequestKind::Chat, RequestPayload::Chat(request))?;

        let result = dispatcher
            .chat(&request.messages, &request.generation_options())
            .await
            .inspect_err(|e| warn!("Chat failed: {}", e))?;
        Ok(result)
    }

    /// Open a stream. Validation and routing errors surface here, before
    /// any chunk is produced.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, GatewayError> {
        validate_chat(request, &self.limits)?;
        let dispatcher = self.dispatcher(RequestKind::StreamChat, RequestPayload::Chat(request))?;

        let stream = dispatcher
            .chat_stream(&request.messages, &request.generation_options())
            .await
            .inspect_err(|e| warn!("Streaming chat failed: {}", e))?;
        Ok(stream)
    }

    pub async fn embed(&self, request: &EmbeddingRequest) -> Result<EmbeddingResult, GatewayError> {
        validate_embedding(request)?;
        let dispatcher = self.dispatcher(RequestKind::Embed, RequestPayload::Embedding(request))?;

        let result = dispatcher
            .embed(&request.input)
            .await
            .inspect_err(|e| warn!("Embedding failed: {}", e))?;
        Ok(result)
    }

    /// Default route for a request kind
    pub fn default_route(&self, kind: RequestKind) -> Route {
        self.selector.select(kind, RequestPayload::Empty)
    }

    /// Check the provider behind the default route for `kind`
    pub async fn health_check(&self, kind: RequestKind) -> Result<(), LLMError> {
        Dispatcher::new(kind, RequestPayload::Empty, self.selector.as_ref(), &self.registry)?
            .health_check()
            .await
    }

    /// Health check the providers behind the default chat and embedding
    /// routes. Errors are keyed by provider name.
    pub async fn readiness(&self) -> Result<(), BTreeMap<String, String>> {
        let mut errors = BTreeMap::new();
        let mut checked = Vec::new();

        for kind in [RequestKind::Chat, RequestKind::Embed] {
            let route = self.default_route(kind);
            if checked.contains(&route) {
                continue;
            }

            let provider = route.provider().to_string();
            if let Err(e) = self.health_check(kind).await {
                warn!(provider = %provider, "Readiness check failed: {}", e);
                errors.entry(provider).or_insert_with(|| e.client_message());
            }
            checked.push(route);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::{ChatMessage, ChatStreamChunk, GenerationOptions, Role, TokenUsage};
    use crate::domain::config::RoutingConfig;
    use crate::domain::llm::{Operation, ProviderAdapter, UpstreamFailure};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAdapter {
        calls: Arc<AtomicUsize>,
        healthy: bool,
    }

    #[async_trait]
    impl ProviderAdapter for CountingAdapter {
        fn provider(&self) -> &str {
            "openai"
        }

        fn model(&self) -> &str {
            "gpt"
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            options: &GenerationOptions,
        ) -> Result<ChatResult, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResult {
                id: "1".to_string(),
                model: "gpt".to_string(),
                role: Role::Assistant,
                content: format!("max_tokens={:?}", options.max_tokens),
                finish_reason: None,
                usage: None,
            })
        }

        async fn chat_stream(
            &self,
            _messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> Result<ChatStream, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Box::pin(futures::stream::empty::<Result<ChatStreamChunk, LLMError>>()))
        }

        async fn embed(&self, inputs: &[String]) -> Result<EmbeddingResult, LLMError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingResult {
                vectors: inputs.iter().map(|_| vec![0.0]).collect(),
                model: "gpt".to_string(),
                usage: TokenUsage::default(),
            })
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            if self.healthy {
                Ok(())
            } else {
                Err(LLMError::upstream(
                    "openai",
                    Operation::HealthCheck,
                    UpstreamFailure::Transport("connection refused".to_string()),
                ))
            }
        }
    }

    fn gateway(calls: Arc<AtomicUsize>, healthy: bool, routing: RoutingConfig) -> GatewayService {
        let mut registry = ProviderRegistry::new();
        registry.register(
            "openai",
            Arc::new(move |_model: &str| {
                Box::new(CountingAdapter {
                    calls: calls.clone(),
                    healthy,
                }) as Box<dyn ProviderAdapter>
            }),
        );

        GatewayService::new(
            LimitsConfig {
                max_input_chars: 16,
                max_model_tokens: 4096,
            },
            Arc::new(DefaultRouteSelector::new(routing)),
            Arc::new(registry),
        )
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_upstream_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = gateway(calls.clone(), true, RoutingConfig::default());

        let oversized = ChatRequest::new(vec![ChatMessage::user("x".repeat(17))]);
        let err = gateway.chat(&oversized).await.unwrap_err();
        assert_eq!(err.status_code(), 422);

        let mut greedy = ChatRequest::new(vec![ChatMessage::user("hi")]);
        greedy.max_tokens = Some(999_999);
        let err = gateway.chat_stream(&greedy).await.err().unwrap();
        assert!(err.client_message().contains("4096"));

        let err = gateway.embed(&EmbeddingRequest::new(vec![])).await.unwrap_err();
        assert_eq!(err.status_code(), 422);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_defaults_are_forwarded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = gateway(calls.clone(), true, RoutingConfig::default());

        let result = gateway
            .chat(&ChatRequest::new(vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        assert_eq!(result.content, "max_tokens=Some(1024)");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_400() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = gateway(calls.clone(), true, RoutingConfig::default());

        let mut request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        request.model = Some("unknown-provider:x".to_string());
        let err = gateway.chat(&request).await.unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.client_message(), "Unsupported provider: unknown-provider");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_readiness_reports_errors_by_provider() {
        let routing = RoutingConfig {
            default_embed_model: "ollama:nomic-embed-text".to_string(),
            ..RoutingConfig::default()
        };

        let ready = gateway(Arc::new(AtomicUsize::new(0)), true, routing.clone());
        let errors = ready.readiness().await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["ollama"], "Unsupported provider: ollama");

        let unhealthy = gateway(Arc::new(AtomicUsize::new(0)), false, RoutingConfig::default());
        let errors = unhealthy.readiness().await.unwrap_err();
        assert_eq!(errors["openai"], "Upstream openai health check failed");

        let mut healthy_routing = routing;
        healthy_routing.default_embed_model = "openai:text-embedding-3-small".to_string();
        let healthy = gateway(Arc::new(AtomicUsize::new(0)), true, healthy_routing);
        assert!(healthy.readiness().await.is_ok());
    }
}
