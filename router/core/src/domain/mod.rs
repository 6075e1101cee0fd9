// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: the types every other layer speaks.

pub mod chat;
pub mod config;
pub mod llm;
pub mod model_id;
pub mod routing;
pub mod validation;
