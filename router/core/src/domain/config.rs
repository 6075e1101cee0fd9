// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Router Configuration Types
//
// Defines the configuration schema for the LLM router process:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - HTTP server settings (bind address, body ceiling, CORS)
// - Client authentication secrets and token lifetime
// - Payload limits enforced before dispatch
// - Per-endpoint rate limits
// - Routing defaults and upstream provider definitions
//
// Secrets accept "env:VAR_NAME" so the file itself can be committed.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::model_id::ModelIdentifier;

pub const API_VERSION: &str = "llm-router/v1";
pub const CONFIG_KIND: &str = "RouterConfig";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "LLM_ROUTER_CONFIG_PATH";

/// Provider types the adapter registry knows how to construct
pub const SUPPORTED_PROVIDER_TYPES: &[&str] = &["openai", "openai-compatible", "ollama", "deepseek"];

/// Top-level Kubernetes-style router configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// API version (must be "llm-router/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "RouterConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: RouterConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfigSpec {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    /// Upstream providers, keyed by `name` in model identifiers
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Requests declaring a larger Content-Length are rejected with 413
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Allowed browser origins; "*" allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Check the default providers before accepting traffic
    #[serde(default = "default_true")]
    pub startup_healthcheck: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared client API key (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// HS256 signing secret for issued tokens (supports "env:VAR_NAME")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    /// Lifetime of tokens issued by /v1/token
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Max total character count across all chat message contents
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Max `max_tokens` a caller may request
    #[serde(default = "default_max_model_tokens")]
    pub max_model_tokens: u32,
}

/// Rate limits in "<count>/<unit>" form, e.g. "30/minute"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_token")]
    pub token: String,

    #[serde(default = "default_rate_limit_chat")]
    pub chat: String,

    #[serde(default = "default_rate_limit_embed")]
    pub embed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Provider assumed when a model identifier has no prefix
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used for chat and streaming chat
    #[serde(default = "default_chat_model")]
    pub default_chat_model: String,

    /// Model used for embeddings
    #[serde(default = "default_embed_model")]
    pub default_embed_model: String,

    /// Let a `model` field in the request body override the defaults
    #[serde(default = "default_true")]
    pub honor_requested_model: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name, used as the model identifier prefix
    pub name: String,

    /// Provider type
    #[serde(rename = "type")]
    pub provider_type: String, // "openai", "openai-compatible", "ollama", "deepseek"

    /// API base URL, without the version path
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Whether this provider is active
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Request timeout; for streams, the longest allowed gap between chunks
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Unit of a rate-limit rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePeriod {
    Second,
    Minute,
    Hour,
    Day,
}

impl RatePeriod {
    pub fn as_secs(&self) -> u64 {
        match self {
            RatePeriod::Second => 1,
            RatePeriod::Minute => 60,
            RatePeriod::Hour => 3_600,
            RatePeriod::Day => 86_400,
        }
    }
}

/// Parsed "<count>/<unit>" rate-limit rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub count: NonZeroU32,
    pub period: RatePeriod,
}

impl FromStr for RateLimitRule {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (count, unit) = raw.split_once('/').ok_or_else(|| {
            format!(
                "rate limits must be of form `<num>/<unit>`, e.g. `30/minute` (got '{}')",
                raw
            )
        })?;

        let count = count
            .trim()
            .parse::<NonZeroU32>()
            .map_err(|_| format!("invalid rate limit count in '{}'", raw))?;

        let period = match unit.trim().to_lowercase().as_str() {
            "second" | "seconds" | "s" => RatePeriod::Second,
            "minute" | "minutes" | "m" => RatePeriod::Minute,
            "hour" | "hours" | "h" => RatePeriod::Hour,
            "day" | "days" | "d" => RatePeriod::Day,
            other => return Err(format!("unknown rate limit unit '{}' in '{}'", other, raw)),
        };

        Ok(Self { count, period })
    }
}

impl fmt::Display for RateLimitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.period {
            RatePeriod::Second => "second",
            RatePeriod::Minute => "minute",
            RatePeriod::Hour => "hour",
            RatePeriod::Day => "day",
        };
        write!(f, "{}/{}", self.count, unit)
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    1_048_576
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_token_ttl() -> u64 {
    60
}

fn default_max_input_chars() -> usize {
    16_000
}

fn default_max_model_tokens() -> u32 {
    4_096
}

fn default_rate_limit_token() -> String {
    "10/minute".to_string()
}

fn default_rate_limit_chat() -> String {
    "30/minute".to_string()
}

fn default_rate_limit_embed() -> String {
    "60/minute".to_string()
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_chat_model() -> String {
    "openai:gpt-3.5-turbo-0125".to_string()
}

fn default_embed_model() -> String {
    "openai:text-embedding-3-small".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "openai".to_string(),
            provider_type: "openai".to_string(),
            endpoint: "https://api.openai.com".to_string(),
            api_key: Some("env:OPENAI_API_KEY".to_string()),
            enabled: true,
            timeout_secs: default_timeout_secs(),
        },
        ProviderConfig {
            name: "ollama".to_string(),
            provider_type: "ollama".to_string(),
            endpoint: "http://host.docker.internal:11434".to_string(),
            api_key: None,
            enabled: true,
            timeout_secs: default_timeout_secs(),
        },
        ProviderConfig {
            name: "deepseek".to_string(),
            provider_type: "deepseek".to_string(),
            endpoint: "https://api.deepseek.com".to_string(),
            api_key: Some("env:DEEPSEEK_API_KEY".to_string()),
            enabled: true,
            timeout_secs: default_timeout_secs(),
        },
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
            max_body_bytes: default_max_body_bytes(),
            cors_origins: default_cors_origins(),
            startup_healthcheck: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            jwt_secret: None,
            token_ttl_minutes: default_token_ttl(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            max_model_tokens: default_max_model_tokens(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            token: default_rate_limit_token(),
            chat: default_rate_limit_chat(),
            embed: default_rate_limit_embed(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            default_chat_model: default_chat_model(),
            default_embed_model: default_embed_model(),
            honor_requested_model: true,
        }
    }
}

impl Default for RouterConfigSpec {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            rate_limits: RateLimitConfig::default(),
            routing: RoutingConfig::default(),
            providers: default_providers(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: CONFIG_KIND.to_string(),
            metadata: ManifestMetadata {
                name: "llm-router".to_string(),
                labels: None,
            },
            spec: RouterConfigSpec::default(),
        }
    }
}

/// Resolve a secret value (supports "env:VAR_NAME" syntax)
pub fn resolve_secret(value: &Option<String>) -> anyhow::Result<Option<String>> {
    match value {
        Some(v) => match v.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map(Some)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(Some(v.clone())),
        },
        None => Ok(None),
    }
}

impl RouterConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. LLM_ROUTER_CONFIG_PATH environment variable
    /// 2. ./llm-router.yaml (working directory)
    /// 3. ~/.llm-router/config.yaml (user home)
    /// 4. /etc/llm-router/config.yaml (system, Unix) or C:\ProgramData\LLMRouter\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./llm-router.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".llm-router").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/llm-router/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\LLMRouter\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let spec = &mut self.spec;

        if let Some(val) = lookup("LLM_ROUTER_API_KEY") {
            tracing::info!("Environment override: LLM_ROUTER_API_KEY");
            spec.auth.api_key = Some(val);
        }
        if let Some(val) = lookup("JWT_SECRET_KEY") {
            tracing::info!("Environment override: JWT_SECRET_KEY");
            spec.auth.jwt_secret = Some(val);
        }

        if let Some(val) = lookup("MAX_INPUT_CHARS") {
            match val.trim().parse() {
                Ok(n) => spec.limits.max_input_chars = n,
                Err(_) => tracing::warn!("Invalid value for MAX_INPUT_CHARS: '{}'. Ignoring.", val),
            }
        }
        if let Some(val) = lookup("MAX_MODEL_TOKENS") {
            match val.trim().parse() {
                Ok(n) => spec.limits.max_model_tokens = n,
                Err(_) => tracing::warn!("Invalid value for MAX_MODEL_TOKENS: '{}'. Ignoring.", val),
            }
        }

        for (var, target) in [
            ("RATE_LIMIT_TOKEN", &mut spec.rate_limits.token),
            ("RATE_LIMIT_CHAT", &mut spec.rate_limits.chat),
            ("RATE_LIMIT_EMBED", &mut spec.rate_limits.embed),
            ("DEFAULT_CHAT_MODEL", &mut spec.routing.default_chat_model),
            ("DEFAULT_EMBED_MODEL", &mut spec.routing.default_embed_model),
        ] {
            if let Some(val) = lookup(var) {
                tracing::info!("Environment override: {}={}", var, val);
                *target = val;
            }
        }

        for (var, provider_name) in [("OPENAI_API_BASE", "openai"), ("OLLAMA_URL", "ollama")] {
            if let Some(val) = lookup(var) {
                match spec.providers.iter_mut().find(|p| p.name == provider_name) {
                    Some(provider) => {
                        tracing::info!("Environment override: {}={}", var, val);
                        provider.endpoint = val;
                    }
                    None => tracing::warn!(
                        "{} is set but no provider named '{}' is configured. Ignoring.",
                        var,
                        provider_name
                    ),
                }
            }
        }

        if let Some(val) = lookup("CORS_ORIGINS") {
            spec.server.cors_origins = val
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.spec.providers.iter().find(|p| p.name == name)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != CONFIG_KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, CONFIG_KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;

        for (field, value) in [
            ("spec.auth.api_key", &spec.auth.api_key),
            ("spec.auth.jwt_secret", &spec.auth.jwt_secret),
        ] {
            match resolve_secret(value)? {
                Some(secret) if !secret.is_empty() => {}
                _ => anyhow::bail!("{} must be set", field),
            }
        }

        if spec.auth.token_ttl_minutes == 0 {
            anyhow::bail!("spec.auth.token_ttl_minutes must be greater than zero");
        }

        if spec.limits.max_input_chars == 0 || spec.limits.max_model_tokens == 0 {
            anyhow::bail!("spec.limits values must be greater than zero");
        }

        if spec.server.max_body_bytes == 0 {
            anyhow::bail!("spec.server.max_body_bytes must be greater than zero");
        }

        for (field, rule) in [
            ("token", &spec.rate_limits.token),
            ("chat", &spec.rate_limits.chat),
            ("embed", &spec.rate_limits.embed),
        ] {
            rule.parse::<RateLimitRule>()
                .map_err(|e| anyhow::anyhow!("spec.rate_limits.{}: {}", field, e))?;
        }

        let mut seen = HashSet::new();
        for provider in &spec.providers {
            if provider.name.is_empty() {
                anyhow::bail!("Provider name cannot be empty");
            }

            if provider.name.contains(':') {
                anyhow::bail!("Provider name cannot contain ':': {}", provider.name);
            }

            if !seen.insert(provider.name.as_str()) {
                anyhow::bail!("Duplicate provider name: {}", provider.name);
            }

            if !SUPPORTED_PROVIDER_TYPES.contains(&provider.provider_type.as_str()) {
                anyhow::bail!(
                    "Unsupported provider type '{}' for provider: {}",
                    provider.provider_type,
                    provider.name
                );
            }

            if provider.endpoint.is_empty() {
                anyhow::bail!("Provider endpoint cannot be empty for: {}", provider.name);
            }

            if provider.timeout_secs == 0 {
                anyhow::bail!("Provider timeout must be greater than zero for: {}", provider.name);
            }
        }

        let routing = &spec.routing;
        if routing.default_provider.is_empty() {
            anyhow::bail!("spec.routing.default_provider cannot be empty");
        }

        for (field, raw) in [
            ("default_chat_model", &routing.default_chat_model),
            ("default_embed_model", &routing.default_embed_model),
        ] {
            let model = ModelIdentifier::parse(raw, &routing.default_provider);
            if model.name().is_empty() {
                anyhow::bail!("spec.routing.{} has no model name: '{}'", field, raw);
            }
            match self.provider(model.provider()) {
                Some(provider) if provider.enabled => {}
                Some(_) => anyhow::bail!(
                    "spec.routing.{} uses disabled provider '{}'",
                    field,
                    model.provider()
                ),
                None => anyhow::bail!(
                    "spec.routing.{} uses unknown provider '{}'",
                    field,
                    model.provider()
                ),
            }
        }

        Ok(())
    }
}
