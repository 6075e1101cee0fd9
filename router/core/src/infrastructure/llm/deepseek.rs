// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// DeepSeek LLM Provider Adapter
//
// DeepSeek exposes OpenAI-compatible chat and embedding endpoints, so the
// wire translation is delegated to the OpenAI adapter. Streaming is
// single-shot: one complete chat call delivered as a single chunk.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::chat::{ChatMessage, ChatResult, ChatStreamChunk, EmbeddingResult, GenerationOptions};
use crate::domain::llm::{ChatStream, LLMError, Operation, ProviderAdapter};
use crate::infrastructure::llm::client::UpstreamClient;
use crate::infrastructure::llm::openai::OpenAIAdapter;

pub struct DeepSeekAdapter {
    inner: OpenAIAdapter,
}

impl DeepSeekAdapter {
    pub fn new(client: Arc<UpstreamClient>, model: impl Into<String>) -> Self {
        Self {
            inner: OpenAIAdapter::new(client, model),
        }
    }
}

#[async_trait]
impl ProviderAdapter for DeepSeekAdapter {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<ChatResult, LLMError> {
        self.inner.chat(messages, options).await
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<ChatStream, LLMError> {
        let result = self.inner.chat(messages, options).await.map_err(|e| match e {
            LLMError::Upstream {
                provider, failure, ..
            } => LLMError::upstream(provider, Operation::ChatStream, failure),
            other => other,
        })?;

        let chunk = ChatStreamChunk {
            id: result.id,
            model: result.model,
            delta: result.content,
            finish_reason: result.finish_reason,
        };

        Ok(Box::pin(futures::stream::once(async move { Ok::<_, LLMError>(chunk) })))
    }

    async fn embed(&self, inputs: &[String]) -> Result<EmbeddingResult, LLMError> {
        self.inner.embed(inputs).await
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::FinishReason;
    use futures::TryStreamExt;
    use std::time::Duration;

    fn adapter(server: &mockito::Server) -> DeepSeekAdapter {
        let client = UpstreamClient::new(
            "deepseek",
            server.url(),
            Some("ds-key".to_string()),
            Duration::from_secs(5),
        );
        DeepSeekAdapter::new(Arc::new(client), "deepseek-chat")
    }

    #[tokio::test]
    async fn test_stream_is_single_chunk() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"stream": false})))
            .with_status(200)
            .with_body(
                r#"{"id":"ds-1","model":"deepseek-chat",
                "choices":[{"index":0,"message":{"role":"assistant","content":"whole answer"},"finish_reason":"stop"}]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let chunks: Vec<ChatStreamChunk> = adapter(&server)
            .chat_stream(&[ChatMessage::user("hi")], &GenerationOptions::default())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].delta, "whole answer");
        assert_eq!(chunks[0].finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_stream_failure_is_labelled_as_streaming() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .create_async()
            .await;

        let result = adapter(&server)
            .chat_stream(&[ChatMessage::user("hi")], &GenerationOptions::default())
            .await;

        match result {
            Err(err) => assert_eq!(err.client_message(), "Upstream deepseek streaming failed"),
            Ok(_) => panic!("expected an upstream failure"),
        }
    }
}
