// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Domain Interface (Anti-Corruption Layer)
//
// Every upstream provider is wrapped behind `ProviderAdapter`. Adapters
// translate upstream wire formats into the normalized shapes in
// `domain::chat` and upstream failures into `LLMError`, so nothing above
// the adapter ever sees a provider-specific type.
//
// Implementations live in infrastructure/llm/.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::chat::{
    ChatMessage, ChatResult, ChatStreamChunk, EmbeddingResult, GenerationOptions,
};

/// Lazy, pull-based sequence of stream chunks.
///
/// The sequence ends with `None` after a clean upstream completion. An
/// `Err` item means the stream aborted; no items follow it. Dropping the
/// stream releases the upstream connection.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatStreamChunk, LLMError>> + Send>>;

/// Uniform capability set every provider exposes
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Registry name of the provider this adapter talks to (e.g. "openai")
    fn provider(&self) -> &str;

    /// Model name with the provider prefix stripped
    fn model(&self) -> &str;

    /// Single-shot chat completion
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<ChatResult, LLMError>;

    /// Open a fresh upstream stream. Failures that happen before the first
    /// chunk are returned here rather than inside the stream.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<ChatStream, LLMError>;

    /// Embed every input. Either all vectors are returned, in input order, or an error.
    async fn embed(&self, inputs: &[String]) -> Result<EmbeddingResult, LLMError>;

    /// Check if provider is healthy and accessible
    async fn health_check(&self) -> Result<(), LLMError>;
}

/// Provider operation, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Chat,
    ChatStream,
    Embed,
    HealthCheck,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Chat => "chat",
            Operation::ChatStream => "streaming",
            Operation::Embed => "embedding",
            Operation::HealthCheck => "health check",
        };
        f.write_str(label)
    }
}

/// What went wrong talking to the upstream
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamFailure {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors that can occur while resolving or calling a provider
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Upstream {provider} {operation} failed: {failure}")]
    Upstream {
        provider: String,
        operation: Operation,
        failure: UpstreamFailure,
    },
}

impl LLMError {
    pub fn upstream(
        provider: impl Into<String>,
        operation: Operation,
        failure: UpstreamFailure,
    ) -> Self {
        LLMError::Upstream {
            provider: provider.into(),
            operation,
            failure,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LLMError::Upstream {
                failure: UpstreamFailure::Timeout,
                ..
            }
        )
    }

    /// HTTP status surfaced to the caller
    pub fn status_code(&self) -> u16 {
        match self {
            LLMError::UnsupportedProvider(_) => 400,
            _ if self.is_timeout() => 504,
            LLMError::Upstream { .. } => 502,
        }
    }

    /// Caller-facing message. Upstream details stay in the server log.
    pub fn client_message(&self) -> String {
        match self {
            LLMError::UnsupportedProvider(provider) => format!("Unsupported provider: {}", provider),
            LLMError::Upstream {
                provider,
                operation,
                failure: UpstreamFailure::Timeout,
            } => format!("Upstream {} {} timed out", provider, operation),
            LLMError::Upstream {
                provider, operation, ..
            } => format!("Upstream {} {} failed", provider, operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(LLMError::UnsupportedProvider("x".into()).status_code(), 400);

        let failed = LLMError::upstream(
            "openai",
            Operation::Chat,
            UpstreamFailure::Status {
                status: 500,
                body: "boom".into(),
            },
        );
        assert_eq!(failed.status_code(), 502);

        let timed_out = LLMError::upstream("ollama", Operation::Embed, UpstreamFailure::Timeout);
        assert!(timed_out.is_timeout());
        assert_eq!(timed_out.status_code(), 504);
    }

    #[test]
    fn test_client_message_hides_upstream_details() {
        let err = LLMError::upstream(
            "openai",
            Operation::Chat,
            UpstreamFailure::Status {
                status: 401,
                body: "invalid key sk-123".into(),
            },
        );
        assert_eq!(err.client_message(), "Upstream openai chat failed");
        assert!(err.to_string().contains("sk-123"));

        let err = LLMError::upstream("ollama", Operation::ChatStream, UpstreamFailure::Timeout);
        assert_eq!(err.client_message(), "Upstream ollama streaming timed out");
    }
}
