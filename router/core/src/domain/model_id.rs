// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::fmt;

/// A `<provider>:<model-name>` identifier.
///
/// Only the first colon separates the provider, so `ollama:llama3:8b`
/// names model `llama3:8b` on provider `ollama`. Without a prefix the
/// caller-supplied default provider applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelIdentifier {
    provider: String,
    name: String,
}

impl ModelIdentifier {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
        }
    }

    pub fn parse(raw: &str, default_provider: &str) -> Self {
        let raw = raw.trim();
        match raw.split_once(':') {
            Some((provider, name)) if !provider.is_empty() => Self::new(provider, name),
            Some((_, name)) => Self::new(default_provider, name),
            None => Self::new(default_provider, raw),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ModelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_identifier() {
        let id = ModelIdentifier::parse("openai:gpt-3.5-turbo-0125", "ollama");
        assert_eq!(id.provider(), "openai");
        assert_eq!(id.name(), "gpt-3.5-turbo-0125");
        assert_eq!(id.to_string(), "openai:gpt-3.5-turbo-0125");
    }

    #[test]
    fn test_only_first_colon_splits() {
        let id = ModelIdentifier::parse("ollama:llama3.2:latest", "openai");
        assert_eq!(id.provider(), "ollama");
        assert_eq!(id.name(), "llama3.2:latest");
    }

    #[test]
    fn test_missing_prefix_uses_default_provider() {
        let id = ModelIdentifier::parse("llama3", "ollama");
        assert_eq!(id.provider(), "ollama");
        assert_eq!(id.name(), "llama3");

        let id = ModelIdentifier::parse(":gpt-4o", "openai");
        assert_eq!(id.provider(), "openai");
        assert_eq!(id.name(), "gpt-4o");
    }
}
