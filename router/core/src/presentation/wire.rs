// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI-style response documents returned by the HTTP API

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::chat::{ChatResult, ChatStreamChunk, EmbeddingResult, FinishReason, Role, TokenUsage};

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub role: Role,
    pub content: String,
    pub finish_reason: Option<FinishReason>,
}

impl From<ChatResult> for ChatCompletionResponse {
    fn from(result: ChatResult) -> Self {
        Self {
            id: result.id,
            object: "chat.completion",
            model: result.model,
            choices: vec![ChatCompletionChoice {
                index: 0,
                role: result.role,
                content: result.content,
                finish_reason: result.finish_reason,
            }],
            usage: result.usage,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Serialize)]
pub struct ChunkDelta {
    pub content: String,
}

impl From<ChatStreamChunk> for ChatCompletionChunk {
    fn from(chunk: ChatStreamChunk) -> Self {
        Self {
            id: chunk.id,
            object: "chat.completion.chunk",
            model: chunk.model,
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    content: chunk.delta,
                },
                finish_reason: chunk.finish_reason,
            }],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmbeddingResponse {
    pub object: &'static str,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub usage: EmbeddingUsage,
}

#[derive(Debug, Serialize)]
pub struct EmbeddingData {
    pub object: &'static str,
    pub index: usize,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
pub struct EmbeddingUsage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

impl From<EmbeddingResult> for EmbeddingResponse {
    fn from(result: EmbeddingResult) -> Self {
        Self {
            object: "list",
            data: result
                .vectors
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| EmbeddingData {
                    object: "embedding",
                    index,
                    embedding,
                })
                .collect(),
            model: result.model,
            usage: EmbeddingUsage {
                prompt_tokens: result.usage.prompt_tokens,
                total_tokens: result.usage.total_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}
