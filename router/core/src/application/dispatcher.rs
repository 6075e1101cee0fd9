// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Unified Dispatcher
//
// Per-request facade: resolves the route once, constructs the adapter once,
// then forwards every call to it. An unsupported provider fails here, before
// any upstream traffic.

use crate::domain::chat::{ChatMessage, ChatResult, EmbeddingResult, GenerationOptions};
use crate::domain::llm::{ChatStream, LLMError, ProviderAdapter};
use crate::domain::routing::{RequestKind, RequestPayload, Route, RouteSelector};
use crate::infrastructure::llm::ProviderRegistry;

pub struct Dispatcher {
    route: Route,
    adapter: Box<dyn ProviderAdapter>,
}

impl Dispatcher {
    pub fn new(
        kind: RequestKind,
        payload: RequestPayload<'_>,
        selector: &dyn RouteSelector,
        registry: &ProviderRegistry,
    ) -> Result<Self, LLMError> {
        let route = selector.select(kind, payload);
        let adapter = registry.resolve(&route)?;
        Ok(Self { route, adapter })
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<ChatResult, LLMError> {
        self.adapter.chat(messages, options).await
    }

    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<ChatStream, LLMError> {
        self.adapter.chat_stream(messages, options).await
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<EmbeddingResult, LLMError> {
        self.adapter.embed(inputs).await
    }

    pub async fn health_check(&self) -> Result<(), LLMError> {
        self.adapter.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::{ChatRequest, ChatStreamChunk, EmbeddingRequest, Role, TokenUsage};
    use crate::domain::config::RoutingConfig;
    use crate::domain::routing::DefaultRouteSelector;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct EchoAdapter {
        provider: String,
        model: String,
    }

    #[async_trait]
    impl ProviderAdapter for EchoAdapter {
        fn provider(&self) -> &str {
            &self.provider
        }

        fn model(&self) -> &str {
            &self.model
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> Result<ChatResult, LLMError> {
            Ok(ChatResult {
                id: "echo".to_string(),
                model: self.model.clone(),
                role: Role::Assistant,
                content: messages.last().map(|m| m.content.clone()).unwrap_or_default(),
                finish_reason: None,
                usage: None,
            })
        }

        async fn chat_stream(
            &self,
            _messages: &[ChatMessage],
            _options: &GenerationOptions,
        ) -> Result<ChatStream, LLMError> {
            let chunk = ChatStreamChunk {
                id: "echo".to_string(),
                model: self.model.clone(),
                delta: "x".to_string(),
                finish_reason: None,
            };
            Ok(Box::pin(futures::stream::iter(vec![Ok::<_, LLMError>(chunk)])))
        }

        async fn embed(&self, inputs: &[String]) -> Result<EmbeddingResult, LLMError> {
            Ok(EmbeddingResult {
                vectors: inputs.iter().map(|i| vec![i.len() as f32]).collect(),
                model: self.model.clone(),
                usage: TokenUsage::default(),
            })
        }

        async fn health_check(&self) -> Result<(), LLMError> {
            Ok(())
        }
    }

    fn registry(constructed: Arc<AtomicUsize>) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(
            "openai",
            Arc::new(move |model: &str| {
                constructed.fetch_add(1, Ordering::SeqCst);
                Box::new(EchoAdapter {
                    provider: "openai".to_string(),
                    model: model.to_string(),
                }) as Box<dyn ProviderAdapter>
            }),
        );
        registry
    }

    fn selector() -> DefaultRouteSelector {
        DefaultRouteSelector::new(RoutingConfig {
            default_embed_model: "openai:text-embedding-3-small".to_string(),
            ..RoutingConfig::default()
        })
    }

    #[tokio::test]
    async fn test_dispatch_constructs_adapter_once() {
        let constructed = Arc::new(AtomicUsize::new(0));
        let registry = registry(constructed.clone());
        let request = ChatRequest::new(vec![ChatMessage::user("hello")]);

        let dispatcher = Dispatcher::new(
            RequestKind::Chat,
            RequestPayload::Chat(&request),
            &selector(),
            &registry,
        )
        .unwrap();

        assert_eq!(dispatcher.route().provider(), "openai");
        assert_eq!(dispatcher.route().model_name(), "gpt-3.5-turbo-0125");

        let options = request.generation_options();
        assert_eq!(dispatcher.chat(&request.messages, &options).await.unwrap().content, "hello");
        assert!(dispatcher.chat(&request.messages, &options).await.is_ok());
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_embed_route() {
        let registry = registry(Arc::new(AtomicUsize::new(0)));
        let request = EmbeddingRequest::new(vec!["ab".to_string(), "abc".to_string()]);

        let dispatcher = Dispatcher::new(
            RequestKind::Embed,
            RequestPayload::Embedding(&request),
            &selector(),
            &registry,
        )
        .unwrap();

        assert_eq!(dispatcher.route().model_name(), "text-embedding-3-small");
        let result = dispatcher.embed(&request.input).await.unwrap();
        assert_eq!(result.vectors, vec![vec![2.0], vec![3.0]]);
    }

    #[test]
    fn test_unsupported_provider_constructs_nothing() {
        let constructed = Arc::new(AtomicUsize::new(0));
        let registry = registry(constructed.clone());
        let mut request = ChatRequest::new(vec![ChatMessage::user("hello")]);
        request.model = Some("unknown-provider:x".to_string());

        let result = Dispatcher::new(
            RequestKind::Chat,
            RequestPayload::Chat(&request),
            &selector(),
            &registry,
        );

        assert!(matches!(result, Err(LLMError::UnsupportedProvider(p)) if p == "unknown-provider"));
        assert_eq!(constructed.load(Ordering::SeqCst), 0);
    }
}
