// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: upstream provider adapters, client authentication
//! and rate limiting.

pub mod auth;
pub mod llm;
pub mod rate_limit;
