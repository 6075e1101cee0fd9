// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Chat & Embedding Model
//!
//! Inbound request payloads and the normalized results every provider
//! adapter must produce, whatever the upstream wire format looks like.
//!
//! | Type | Direction | Description |
//! |------|-----------|-------------|
//! | `ChatRequest` | inbound | `/v1/chat/completions` body |
//! | `EmbeddingRequest` | inbound | `/v1/embeddings` body |
//! | `ChatResult` | outbound | one complete assistant message |
//! | `ChatStreamChunk` | outbound | one incremental delta of a streamed reply |
//! | `EmbeddingResult` | outbound | vectors aligned with `EmbeddingRequest::input` |

use serde::{Deserialize, Serialize};

/// Temperature forwarded upstream when the caller does not set one
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Generation cap forwarded upstream when the caller does not set one
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Map a role string reported by an upstream provider.
    /// Anything we do not model (e.g. "tool") is reported as assistant output.
    pub fn from_upstream(role: &str) -> Self {
        match role {
            "system" => Role::System,
            "user" => Role::User,
            _ => Role::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Body of a chat-completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Optional `<provider>:<model>` identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Conversation history, oldest first
    pub messages: Vec<ChatMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Server-Sent Events instead of one JSON document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: None,
            messages,
            temperature: None,
            max_tokens: None,
            stream: None,
        }
    }

    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Total number of characters across all message contents
    pub fn total_chars(&self) -> usize {
        self.messages.iter().map(|m| m.content.chars().count()).sum()
    }

    /// Generation options with the router defaults filled in
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: Some(self.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            max_tokens: Some(self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        }
    }
}

/// Sampling options forwarded to a provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature (0.0 = deterministic)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

/// Body of an embedding request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Strings to embed; output order follows this order
    pub input: Vec<String>,
}

impl EmbeddingRequest {
    pub fn new(input: Vec<String>) -> Self {
        Self { model: None, input }
    }
}

/// Reason why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion (model decided to stop)
    Stop,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,
}

impl FinishReason {
    pub fn from_upstream(reason: &str) -> Self {
        match reason {
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One complete assistant reply
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResult {
    pub id: String,
    pub model: String,
    pub role: Role,
    pub content: String,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<TokenUsage>,
}

/// One incremental piece of a streamed reply
#[derive(Debug, Clone, PartialEq)]
pub struct ChatStreamChunk {
    pub id: String,
    pub model: String,
    pub delta: String,
    pub finish_reason: Option<FinishReason>,
}

/// Embedding vectors, positionally aligned with the request input
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub vectors: Vec<Vec<f32>>,
    pub model: String,
    pub usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_parses_openai_shape() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"model":"openai:gpt-4o","messages":[{"role":"system","content":"be brief"},{"role":"user","content":"hi"}],"stream":true}"#,
        )
        .unwrap();

        assert_eq!(request.model.as_deref(), Some("openai:gpt-4o"));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.is_stream());
        assert_eq!(request.max_tokens, None);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let parsed = serde_json::from_str::<ChatRequest>(
            r#"{"messages":[{"role":"wizard","content":"hi"}]}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_total_chars_counts_characters_not_bytes() {
        let request = ChatRequest::new(vec![
            ChatMessage::user("héllo"),
            ChatMessage::new(Role::Assistant, "日本"),
        ]);
        assert_eq!(request.total_chars(), 7);
    }

    #[test]
    fn test_generation_options_fill_defaults() {
        let mut request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        assert_eq!(
            request.generation_options(),
            GenerationOptions {
                temperature: Some(DEFAULT_TEMPERATURE),
                max_tokens: Some(DEFAULT_MAX_TOKENS),
            }
        );

        request.temperature = Some(0.1);
        request.max_tokens = Some(32);
        let options = request.generation_options();
        assert_eq!(options.temperature, Some(0.1));
        assert_eq!(options.max_tokens, Some(32));
    }

    #[test]
    fn test_upstream_mappings() {
        assert_eq!(Role::from_upstream("tool"), Role::Assistant);
        assert_eq!(Role::from_upstream("user"), Role::User);
        assert_eq!(FinishReason::from_upstream("length"), FinishReason::Length);
        assert_eq!(FinishReason::from_upstream("tool_calls"), FinishReason::Stop);
    }
}
