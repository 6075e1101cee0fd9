// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gateway HTTP server bootstrap

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use llm_router_core::{
    application::GatewayService,
    domain::{config::RouterConfig, routing::RequestKind},
    infrastructure::{auth::TokenAuthority, rate_limit::GovernorLimiter},
    presentation::{app, AppState},
};

const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct ServeOptions {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Load the effective configuration: file or defaults, then environment
/// overrides, then command-line overrides.
pub fn load_config(options: &ServeOptions) -> Result<RouterConfig> {
    let mut config = RouterConfig::load_or_default(options.config_path.clone())
        .context("Failed to load configuration")?;

    if let Some(host) = &options.host {
        config.spec.server.bind_address = host.clone();
    }
    if let Some(port) = options.port {
        config.spec.server.port = port;
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

pub async fn run(options: ServeOptions) -> Result<()> {
    let config = load_config(&options)?;
    info!("Configuration loaded: {}", config.metadata.name);

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let gateway = Arc::new(
        GatewayService::from_config(&config).context("Failed to initialize LLM providers")?,
    );
    info!(
        providers = ?gateway.registry().providers(),
        "Provider registry ready"
    );

    if config.spec.server.startup_healthcheck {
        startup_healthcheck(&gateway).await?;
    }

    let auth = Arc::new(
        TokenAuthority::from_config(&config.spec.auth).context("Failed to initialize auth")?,
    );
    let limiter = Arc::new(
        GovernorLimiter::from_config(&config.spec.rate_limits)
            .context("Failed to initialize rate limits")?,
    );

    let sweeper = limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.retain_recent();
        }
    });

    let state = AppState::new(gateway, auth, limiter)
        .with_metrics(metrics)
        .with_max_body_bytes(config.spec.server.max_body_bytes);
    let router = app(state, &config.spec.server)?;

    let addr = format!(
        "{}:{}",
        config.spec.server.bind_address, config.spec.server.port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("LLM router listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server failed")?;

    info!("LLM router shut down");

    Ok(())
}

/// The default chat provider must answer before traffic is accepted. An
/// unreachable embedding provider only degrades readiness.
async fn startup_healthcheck(gateway: &GatewayService) -> Result<()> {
    let chat = gateway.default_route(RequestKind::Chat);
    gateway
        .health_check(RequestKind::Chat)
        .await
        .with_context(|| format!("Default chat provider '{}' is unreachable", chat.provider()))?;
    info!(provider = chat.provider(), "Startup healthcheck passed");

    let embed = gateway.default_route(RequestKind::Embed);
    if embed.provider() != chat.provider() {
        if let Err(e) = gateway.health_check(RequestKind::Embed).await {
            warn!(provider = embed.provider(), "Embedding provider healthcheck failed: {}", e);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
