// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama LLM Provider Adapter
//
// Anti-Corruption Layer for Ollama local models
// Supports air-gapped deployments with local LLMs

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

const CHAT_PATH: &str = "/api/chat";
const EMBED_PATH: &str = "/api/embed";
const TAGS_PATH: &str = "/api/tags";

pub struct OllamaAdapter {
    client: Arc<UpstreamClient>,
    model: String,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: String,
}

/// Shape of both the single response and each streamed line
#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaChatResponse {
    fn finish_reason(&self) -> Option<FinishReason> {
        if !self.done {
            return None;
        }
        Some(
            self.done_reason
                .as_deref()
                .map(FinishReason::from_upstream)
                .unwrap_or(FinishReason::Stop),
        )
    }

    fn usage(&self) -> Option<TokenUsage> {
        if self.prompt_eval_count.is_none() && self.eval_count.is_none() {
            return None;
        }
        let prompt_tokens = self.prompt_eval_count.unwrap_or(0);
        let completion_tokens = self.eval_count.unwrap_or(0);
        Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        })
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    model: Option<String>,
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
}

impl OllamaAdapter {
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
    ) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &self.model,
            messages,
            stream,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
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
            messages = messages.len(),
            "Ollama chat request"
        );

        let request = self.chat_request(messages, options, false);
        let response = self
            .client
            .post_json(Operation::Chat, CHAT_PATH, &request, false)
            .await?;
        let mut response: OllamaChatResponse =
            self.client.read_json(Operation::Chat, response).await?;

        if let Some(error) = response.error.take() {
            return Err(self.client.error(
                Operation::Chat,
                UpstreamFailure::MalformedResponse(error),
            ));
        }

        let finish_reason = response.finish_reason();
        let usage = response.usage();
        let message = response.message.ok_or_else(|| {
            self.client.error(
                Operation::Chat,
                UpstreamFailure::MalformedResponse("No message in response".into()),
            )
        })?;

        Ok(ChatResult {
            id: uuid::Uuid::new_v4().to_string(),
            model: response.model.unwrap_or_else(|| self.model.clone()),
            role: message
                .role
                .as_deref()
                .map(Role::from_upstream)
                .unwrap_or(Role::Assistant),
            content: message.content,
            finish_reason,
            usage,
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
            messages = messages.len(),
            "Ollama chat_stream request"
        );

        let request = self.chat_request(messages, options, true);
        let response = self
            .client
            .post_json(Operation::ChatStream, CHAT_PATH, &request, true)
            .await?;

        let lines = self.client.lines(response);
        let client = Arc::clone(&self.client);
        let model = self.model.clone();
        // Ollama does not identify responses
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
                if line.trim().is_empty() {
                    continue;
                }

                let mut chunk: OllamaChatResponse = match serde_json::from_str(&line) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(client.error(
                            Operation::ChatStream,
                            UpstreamFailure::MalformedResponse(format!("Invalid stream line: {}", e)),
                        ));
                        return;
                    }
                };

                if let Some(error) = chunk.error.take() {
                    yield Err(client.error(
                        Operation::ChatStream,
                        UpstreamFailure::MalformedResponse(error),
                    ));
                    return;
                }

                let finish_reason = chunk.finish_reason();
                yield Ok(ChatStreamChunk {
                    id: stream_id.clone(),
                    model: chunk.model.unwrap_or_else(|| model.clone()),
                    delta: chunk.message.map(|m| m.content).unwrap_or_default(),
                    finish_reason,
                });

                if chunk.done {
                    return;
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn embed(&self, inputs: &[String]) -> Result<EmbeddingResult, LLMError> {
        info!(
            provider = %self.provider(),
            model = %self.model,
            input_len = inputs.len(),
            "Ollama embedding request"
        );

        let request = OllamaEmbedRequest {
            model: &self.model,
            input: inputs,
        };
        let response = self
            .client
            .post_json(Operation::Embed, EMBED_PATH, &request, false)
            .await?;
        let response: OllamaEmbedResponse = self.client.read_json(Operation::Embed, response).await?;

        if response.embeddings.len() != inputs.len() {
            return Err(self.client.error(
                Operation::Embed,
                UpstreamFailure::MalformedResponse(format!(
                    "Expected {} embeddings, got {}",
                    inputs.len(),
                    response.embeddings.len()
                )),
            ));
        }

        let prompt_tokens = response.prompt_eval_count.unwrap_or(0);
        Ok(EmbeddingResult {
            vectors: response.embeddings,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens: 0,
                total_tokens: prompt_tokens,
            },
        })
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        self.client.check_reachable(TAGS_PATH).await
    }
}
