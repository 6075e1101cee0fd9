// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Route selection: which provider and model serve a request.

use crate::domain::chat::{ChatRequest, EmbeddingRequest};
use crate::domain::config::RoutingConfig;
use crate::domain::model_id::ModelIdentifier;

/// Category of work a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Chat,
    StreamChat,
    Embed,
}

impl RequestKind {
    /// Unknown labels route like plain chat.
    pub fn from_label(label: &str) -> Self {
        match label {
            "stream_chat" | "chat_stream" => RequestKind::StreamChat,
            "embed" | "embedding" | "embeddings" => RequestKind::Embed,
            _ => RequestKind::Chat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Chat => "chat",
            RequestKind::StreamChat => "stream_chat",
            RequestKind::Embed => "embed",
        }
    }
}

/// Request body handed to the selector
#[derive(Debug, Clone, Copy)]
pub enum RequestPayload<'a> {
    Chat(&'a ChatRequest),
    Embedding(&'a EmbeddingRequest),
    /// No body, e.g. readiness checks
    Empty,
}

impl RequestPayload<'_> {
    fn requested_model(&self) -> Option<&str> {
        let model = match self {
            RequestPayload::Chat(request) => request.model.as_deref(),
            RequestPayload::Embedding(request) => request.model.as_deref(),
            RequestPayload::Empty => None,
        };
        model.map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Decision produced by a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub model: ModelIdentifier,
}

impl Route {
    pub fn new(model: ModelIdentifier) -> Self {
        Self { model }
    }

    pub fn provider(&self) -> &str {
        self.model.provider()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}

/// Routing policy seam. Implementations must be pure and never fail.
pub trait RouteSelector: Send + Sync {
    fn select(&self, kind: RequestKind, payload: RequestPayload<'_>) -> Route;
}

/// Configured defaults per request kind, optionally overridden by the
/// request's own `model` field.
pub struct DefaultRouteSelector {
    config: RoutingConfig,
}

impl DefaultRouteSelector {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    fn default_for(&self, kind: RequestKind) -> &str {
        match kind {
            RequestKind::Chat | RequestKind::StreamChat => &self.config.default_chat_model,
            RequestKind::Embed => &self.config.default_embed_model,
        }
    }
}

impl RouteSelector for DefaultRouteSelector {
    fn select(&self, kind: RequestKind, payload: RequestPayload<'_>) -> Route {
        let raw = match payload.requested_model() {
            Some(requested) if self.config.honor_requested_model => requested,
            _ => self.default_for(kind),
        };
        Route::new(ModelIdentifier::parse(raw, &self.config.default_provider))
    }
}
