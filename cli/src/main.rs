// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # LLM Router CLI
//!
//! The `llm-router` binary runs the gateway server and manages its
//! configuration.
//!
//! ## Commands
//!
//! - `llm-router serve` - Run the HTTP gateway (default when no command is given)
//! - `llm-router config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use llm_router::commands::{self, ConfigCommand};
use llm_router::server::{self, ServeOptions};

/// LLM Router - one OpenAI-style API in front of many model providers
#[derive(Parser)]
#[command(name = "llm-router")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "LLM_ROUTER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP bind address (overrides spec.server.bind_address)
    #[arg(long, global = true, env = "LLM_ROUTER_HOST")]
    host: Option<String>,

    /// HTTP port (overrides spec.server.port)
    #[arg(long, global = true, env = "LLM_ROUTER_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LLM_ROUTER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(
        long,
        global = true,
        env = "LLM_ROUTER_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Compact
    )]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    #[command(name = "serve")]
    Serve,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is not an error
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    if let Ok(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            server::run(ServeOptions {
                config_path: cli.config,
                host: cli.host,
                port: cli.port,
            })
            .await
        }
        Commands::Config { command } => {
            commands::config::handle_command(command, cli.config).await
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().flatten_event(true).init(),
    }

    Ok(())
}
