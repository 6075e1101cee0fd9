// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each provider adapter translates between the domain `ProviderAdapter`
// interface and one upstream API.

pub mod client;
pub mod deepseek;
pub mod framing;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use client::UpstreamClient;
pub use registry::{AdapterFactory, ProviderRegistry};
