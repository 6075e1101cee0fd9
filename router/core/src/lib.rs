// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM router core
//!
//! Routes chat-completion and embedding requests to upstream LLM providers
//! behind one OpenAI-style HTTP surface.
//!
//! # Architecture
//!
//! - **Domain:** request/response model, provider contract, routing policy, validation, configuration
//! - **Application:** per-request dispatcher and the gateway service
//! - **Infrastructure:** provider adapters, adapter registry, auth, rate limiting
//! - **Presentation:** Axum router, middleware and SSE streaming

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
