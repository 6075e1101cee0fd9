// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for the OpenAI REST API
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, DeepSeek, etc.)

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::chat::{
    ChatMessage, ChatResult, ChatStreamChunk, EmbeddingResult, FinishReason, GenerationOptions,
    Role, TokenUsage,
};
use crate::domain::llm::{ChatStream, LLMError, Operation, ProviderAdapter, UpstreamFailure};
use crate::infrastructure::llm::client::UpstreamClient;
use crate::infrastructure::llm::framing::sse_data;

const CHAT_PATH: &str = "/v1/chat/completions";
const EMBEDDINGS_PATH: &str = "/v1/embeddings";
const MODELS_PATH: &str = "/v1/models";

pub struct OpenAIAdapter {
    client: Arc<UpstreamClient>,
    model: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIChatResponse {
    id: String,
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<OpenAIUsage> for TokenUsage {
    fn from(usage: OpenAIUsage) -> Self {
        TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbedding>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIAdapter {
    pub fn new(client: Arc<UpstreamClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn chat_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &GenerationOptions,
        stream: bool,
    ) -> OpenAIChatRequest<'a> {
        OpenAIChatRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAIAdapter {
    fn provider(&self) -> &str {
        self.client.provider()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<ChatResult, LLMError> {
        info!(
            provider = %self.provider(),
            model = %self.model,
            temperature = ?options.temperature,
            max_tokens = ?options.max_tokens,
            "OpenAI chat request"
        );

        let request = self.chat_request(messages, options, false);
        let response = self
            .client
            .post_json(Operation::Chat, CHAT_PATH, &request, false)
            .await?;
        let response: OpenAIChatResponse = self.client.read_json(Operation::Chat, response).await?;

        // Translate OpenAI's response to our domain types
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            self.client.error(
                Operation::Chat,
                UpstreamFailure::MalformedResponse("No choices in response".into()),
            )
        })?;

        Ok(ChatResult {
            id: response.id,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            role: choice
                .message
                .role
                .as_deref()
                .map(Role::from_upstream)
                .unwrap_or(Role::Assistant),
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_upstream),
            usage: response.usage.map(TokenUsage::from),
        })
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<ChatStream, LLMError> {
        info!(
            provider = %self.provider(),
            model = %self.model,
            temperature = ?options.temperature,
            max_tokens = ?options.max_tokens,
            "OpenAI chat_stream request"
        );

        let request = self.chat_request(messages, options, true);
        let response = self
            .client
            .post_json(Operation::ChatStream, CHAT_PATH, &request, true)
            .await?;

        let lines = self.client.lines(response);
        let client = Arc::clone(&self.client);
        let model = self.model.clone();
        let stream_id = uuid::Uuid::new_v4().to_string();

        let stream = async_stream::stream! {
            let mut lines = Box::pin(lines);

            while let Some(line) = lines.next().await {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                let Some(data) = sse_data(&line) else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == "[DONE]" {
                    return;
                }

                let chunk: OpenAIStreamChunk = match serde_json::from_str(data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(client.error(
                            Operation::ChatStream,
                            UpstreamFailure::MalformedResponse(format!("Invalid stream chunk: {}", e)),
                        ));
                        return;
                    }
                };

                // Keep-alive and usage-only chunks carry no choices
                let Some(choice) = chunk.choices.into_iter().next() else {
                    continue;
                };

                yield Ok(ChatStreamChunk {
                    id: chunk.id.unwrap_or_else(|| stream_id.clone()),
                    model: chunk.model.unwrap_or_else(|| model.clone()),
                    delta: choice.delta.content.unwrap_or_default(),
                    finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_upstream),
                });
            }
        };

        Ok(Box::pin(stream))
    }

    async fn embed(&self, inputs: &[String]) -> Result<EmbeddingResult, LLMError> {
        info!(
            provider = %self.provider(),
            model = %self.model,
            input_len = inputs.len(),
            "OpenAI embedding request"
        );

        let request = OpenAIEmbeddingRequest {
            model: &self.model,
            input: inputs,
        };
        let response = self
            .client
            .post_json(Operation::Embed, EMBEDDINGS_PATH, &request, false)
            .await?;
        let mut response: OpenAIEmbeddingResponse =
            self.client.read_json(Operation::Embed, response).await?;

        response.data.sort_by_key(|e| e.index);
        let aligned = response.data.len() == inputs.len()
            && response.data.iter().enumerate().all(|(i, e)| e.index == i);
        if !aligned {
            return Err(self.client.error(
                Operation::Embed,
                UpstreamFailure::MalformedResponse(format!(
                    "Expected {} embeddings, got {}",
                    inputs.len(),
                    response.data.len()
                )),
            ));
        }

        Ok(EmbeddingResult {
            vectors: response.data.into_iter().map(|e| e.embedding).collect(),
            model: response.model.unwrap_or_else(|| self.model.clone()),
            usage: response.usage.map(TokenUsage::from).unwrap_or_default(),
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        self.client.check_reachable(MODELS_PATH).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::time::Duration;

    fn adapter(server: &mockito::Server) -> OpenAIAdapter {
        let client = UpstreamClient::new(
            "openai",
            server.url(),
            Some("sk-test".to_string()),
            Duration::from_secs(5),
        );
        OpenAIAdapter::new(Arc::new(client), "gpt-3.5-turbo-0125")
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            temperature: Some(0.7),
            max_tokens: Some(1024),
        }
    }

    #[tokio::test]
    async fn test_chat_translates_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "gpt-3.5-turbo-0125",
                "messages": [{"role": "user", "content": "hi"}],
                "max_tokens": 1024,
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"id":"chatcmpl-1","object":"chat.completion","model":"gpt-3.5-turbo-0125",
                "choices":[{"index":0,"message":{"role":"assistant","content":"Hello!"},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#,
            )
            .create_async()
            .await;

        let result = adapter(&server)
            .chat(&[ChatMessage::user("hi")], &options())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.id, "chatcmpl-1");
        assert_eq!(result.role, Role::Assistant);
        assert_eq!(result.content, "Hello!");
        assert_eq!(result.finish_reason, Some(FinishReason::Stop));
        assert_eq!(result.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn test_chat_upstream_error_is_labelled() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let err = adapter(&server)
            .chat(&[ChatMessage::user("hi")], &options())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 502);
        assert_eq!(err.client_message(), "Upstream openai chat failed");
    }

    #[tokio::test]
    async fn test_chat_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = adapter(&server)
            .chat(&[ChatMessage::user("hi")], &options())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LLMError::Upstream {
                failure: UpstreamFailure::MalformedResponse(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_chat_stream_parses_sse() {
        let body = concat!(
            "data: {\"id\":\"c1\",\"model\":\"gpt\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
            ": keep-alive\n\n",
            "data: {\"id\":\"c1\",\"model\":\"gpt\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"id\":\"c1\",\"model\":\"gpt\",\"choices\":[]}\n\n",
            "data: {\"id\":\"c1\",\"model\":\"gpt\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"id\":\"late\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"stream": true})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let chunks: Vec<ChatStreamChunk> = adapter(&server)
            .chat_stream(&[ChatMessage::user("hi")], &options())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let deltas: Vec<&str> = chunks.iter().map(|c| c.delta.as_str()).collect();
        assert_eq!(deltas, vec!["", "Hel", "lo"]);
        assert_eq!(chunks[2].finish_reason, Some(FinishReason::Stop));
        assert!(chunks.iter().all(|c| c.id == "c1"));
    }

    #[tokio::test]
    async fn test_chat_stream_error_status_fails_before_first_chunk() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let result = adapter(&server)
            .chat_stream(&[ChatMessage::user("hi")], &options())
            .await;

        match result {
            Err(err) => assert_eq!(err.client_message(), "Upstream openai streaming failed"),
            Ok(_) => panic!("expected an error before streaming"),
        }
    }

    #[tokio::test]
    async fn test_embed_reorders_by_index() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(
                r#"{"object":"list","model":"text-embedding-3-small",
                "data":[{"object":"embedding","index":1,"embedding":[0.2]},{"object":"embedding","index":0,"embedding":[0.1]}],
                "usage":{"prompt_tokens":4,"total_tokens":4}}"#,
            )
            .create_async()
            .await;

        let result = adapter(&server)
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(result.vectors, vec![vec![0.1], vec![0.2]]);
        assert_eq!(result.usage.prompt_tokens, 4);
        assert_eq!(result.usage.completion_tokens, 0);
    }

    #[tokio::test]
    async fn test_embed_count_mismatch_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"index":0,"embedding":[0.1]}]}"#)
            .create_async()
            .await;

        let err = adapter(&server)
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LLMError::Upstream {
                operation: Operation::Embed,
                failure: UpstreamFailure::MalformedResponse(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_health_check_lists_models() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/models")
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        assert!(adapter(&server).health_check().await.is_ok());
        mock.assert_async().await;
    }
}
