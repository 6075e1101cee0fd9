// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Request Validation
//!
//! Payload checks that run before any provider is resolved. A request that
//! fails here never reaches an upstream.
//!
//! | Check | Applies to | Error |
//! |-------|------------|-------|
//! | non-empty `messages` | chat | `EmptyMessages` |
//! | total content chars <= `max_input_chars` | chat | `InputTooLarge` |
//! | `max_tokens` <= `max_model_tokens` | chat | `MaxTokensExceeded` |
//! | `model`, when given, names a model | chat, embeddings | `MissingModelName` |
//! | non-empty `input` | embeddings | `EmptyInput` |

use thiserror::Error;

use crate::domain::chat::{ChatRequest, EmbeddingRequest};
use crate::domain::config::LimitsConfig;
use crate::domain::model_id::ModelIdentifier;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Total message content too large ({actual} chars); max is {max}")]
    InputTooLarge { actual: usize, max: usize },

    #[error("Requested max_tokens ({requested}) exceeds limit ({max})")]
    MaxTokensExceeded { requested: u32, max: u32 },

    #[error("messages must contain at least one message")]
    EmptyMessages,

    #[error("input must contain at least one string")]
    EmptyInput,

    #[error("model '{0}' names no model after the provider prefix")]
    MissingModelName(String),

    #[error("Malformed request body: {0}")]
    Malformed(String),
}

impl ValidationError {
    pub fn status_code(&self) -> u16 {
        422
    }
}

/// A blank `model` falls back to the defaults; a prefix with nothing after
/// it (`openai:`) is rejected.
fn validate_model(model: Option<&str>) -> Result<(), ValidationError> {
    let Some(raw) = model.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(());
    };

    if ModelIdentifier::parse(raw, "").name().trim().is_empty() {
        return Err(ValidationError::MissingModelName(raw.to_string()));
    }
    Ok(())
}

pub fn validate_chat(request: &ChatRequest, limits: &LimitsConfig) -> Result<(), ValidationError> {
    if request.messages.is_empty() {
        return Err(ValidationError::EmptyMessages);
    }
    validate_model(request.model.as_deref())?;

    let actual = request.total_chars();
    if actual > limits.max_input_chars {
        return Err(ValidationError::InputTooLarge {
            actual,
            max: limits.max_input_chars,
        });
    }

    if let Some(requested) = request.max_tokens {
        if requested > limits.max_model_tokens {
            return Err(ValidationError::MaxTokensExceeded {
                requested,
                max: limits.max_model_tokens,
            });
        }
    }

    Ok(())
}

pub fn validate_embedding(request: &EmbeddingRequest) -> Result<(), ValidationError> {
    if request.input.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    validate_model(request.model.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::ChatMessage;

    fn limits() -> LimitsConfig {
        LimitsConfig {
            max_input_chars: 10,
            max_model_tokens: 4096,
        }
    }

    #[test]
    fn test_input_limit_is_inclusive() {
        let request = ChatRequest::new(vec![ChatMessage::user("12345"), ChatMessage::user("67890")]);
        assert!(validate_chat(&request, &limits()).is_ok());

        let request = ChatRequest::new(vec![ChatMessage::user("12345"), ChatMessage::user("678901")]);
        assert_eq!(
            validate_chat(&request, &limits()),
            Err(ValidationError::InputTooLarge { actual: 11, max: 10 })
        );
    }

    #[test]
    fn test_max_tokens_limit() {
        let mut request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        request.max_tokens = Some(4096);
        assert!(validate_chat(&request, &limits()).is_ok());

        request.max_tokens = Some(999_999);
        let err = validate_chat(&request, &limits()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("max_tokens"));
        assert!(message.contains("4096"));
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn test_empty_payloads() {
        assert_eq!(
            validate_chat(&ChatRequest::new(vec![]), &limits()),
            Err(ValidationError::EmptyMessages)
        );
        assert_eq!(
            validate_embedding(&EmbeddingRequest::new(vec![])),
            Err(ValidationError::EmptyInput)
        );
        assert!(validate_embedding(&EmbeddingRequest::new(vec!["a".into()])).is_ok());
    }

    #[test]
    fn test_prefix_without_model_name() {
        let mut request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        for raw in ["openai:", "ollama: ", ":"] {
            request.model = Some(raw.to_string());
            assert_eq!(
                validate_chat(&request, &limits()),
                Err(ValidationError::MissingModelName(raw.trim().to_string()))
            );
        }

        request.model = Some("ollama:llama3:8b".to_string());
        assert!(validate_chat(&request, &limits()).is_ok());
        request.model = Some("  ".to_string());
        assert!(validate_chat(&request, &limits()).is_ok());

        let mut embed = EmbeddingRequest::new(vec!["a".into()]);
        embed.model = Some("openai:".to_string());
        assert_eq!(
            validate_embedding(&embed),
            Err(ValidationError::MissingModelName("openai:".to_string()))
        );
    }
}
