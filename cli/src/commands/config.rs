// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use llm_router_core::domain::config::{RouterConfig, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./llm-router.yaml)
        #[arg(short, long, default_value = "./llm-router.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate {
            output,
            examples,
            force,
        } => generate(&output, examples, force).await,
    }
}

fn redact(secret: &Option<String>) -> String {
    match secret.as_deref() {
        None => "(not set)".to_string(),
        Some(value) if value.starts_with("env:") => value.to_string(),
        Some(_) => "********".to_string(),
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = RouterConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./llm-router.yaml");
        println!("  4. ~/.llm-router/config.yaml");
        println!("  5. /etc/llm-router/config.yaml");
        println!();
    }

    if as_yaml {
        let mut redacted = config.clone();
        redacted.spec.auth.api_key = Some(redact(&config.spec.auth.api_key));
        redacted.spec.auth.jwt_secret = Some(redact(&config.spec.auth.jwt_secret));
        for provider in &mut redacted.spec.providers {
            if provider.api_key.is_some() {
                provider.api_key = Some(redact(&provider.api_key));
            }
        }
        print!("{}", redacted.to_yaml_string()?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", spec.server.bind_address, spec.server.port);
    println!("  Max body: {} bytes", spec.server.max_body_bytes);
    println!("  CORS origins: {}", spec.server.cors_origins.join(", "));
    println!();

    println!("{}", "Auth:".bold());
    println!("  API key: {}", redact(&spec.auth.api_key));
    println!("  JWT secret: {}", redact(&spec.auth.jwt_secret));
    println!("  Token TTL: {} minutes", spec.auth.token_ttl_minutes);
    println!();

    println!("{}", "Limits:".bold());
    println!("  Max input chars: {}", spec.limits.max_input_chars);
    println!("  Max model tokens: {}", spec.limits.max_model_tokens);
    println!(
        "  Rate limits: token {}, chat {}, embed {}",
        spec.rate_limits.token, spec.rate_limits.chat, spec.rate_limits.embed
    );
    println!();

    println!("{}", "Routing:".bold());
    println!("  Default provider: {}", spec.routing.default_provider);
    println!("  Chat model: {}", spec.routing.default_chat_model);
    println!("  Embedding model: {}", spec.routing.default_embed_model);
    println!("  Honor requested model: {}", spec.routing.honor_requested_model);
    println!();

    println!("{}", "LLM Providers:".bold());
    for provider in &spec.providers {
        let status = if provider.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!("  {} ({}) {}", provider.name.bold(), provider.provider_type, status);
        println!("    Endpoint: {}", provider.endpoint);
        println!("    API key: {}", redact(&provider.api_key));
        println!("    Timeout: {}s", provider.timeout_secs);
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = RouterConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn template(with_examples: bool) -> &'static str {
    if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    }
}

fn write_template(output: &Path, with_examples: bool, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    std::fs::write(output, template(with_examples))
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    Ok(())
}

async fn generate(output: &Path, with_examples: bool, force: bool) -> Result<()> {
    write_template(output, with_examples, force)?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
