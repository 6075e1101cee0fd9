// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// HTTP API
//
// axum router exposing the OpenAI-style endpoints plus token issuance,
// health checks and the Prometheus scrape endpoint. Every protected handler runs
// rate limit -> authentication -> body parsing -> gateway.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_SECURITY_POLICY, CONTENT_TYPE},
        request::Parts,
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware::{self, Next},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{Stream, StreamExt};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, warn};

use crate::application::gateway::{GatewayError, GatewayService};
use crate::domain::chat::{ChatRequest, EmbeddingRequest};
use crate::domain::config::ServerConfig;
use crate::domain::llm::ChatStream;
use crate::domain::validation::ValidationError;
use crate::infrastructure::auth::{AuthError, Credential, Identity, TokenAuthority};
use crate::infrastructure::rate_limit::{LimitRule, RequestLimiter};
use crate::presentation::wire::{
    ChatCompletionChunk, ChatCompletionResponse, EmbeddingResponse, ErrorBody, ReadinessResponse,
    TokenRequest, TokenResponse,
};

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayService>,
    pub auth: Arc<TokenAuthority>,
    pub limiter: Arc<dyn RequestLimiter>,
    pub metrics: Option<PrometheusHandle>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(
        gateway: Arc<GatewayService>,
        auth: Arc<TokenAuthority>,
        limiter: Arc<dyn RequestLimiter>,
    ) -> Self {
        Self {
            gateway,
            auth,
            limiter,
            metrics: None,
            max_body_bytes: ServerConfig::default().max_body_bytes,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    fn check_rate_limit(&self, parts: &Parts, rule: LimitRule) -> Result<(), ApiError> {
        let key = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if self.limiter.allow(&key, rule) {
            Ok(())
        } else {
            warn!(client = %key, ?rule, "Rate limit exceeded");
            Err(ApiError::RateLimited)
        }
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                value
                    .strip_prefix("Bearer ")
                    .or_else(|| value.strip_prefix("bearer "))
            });
        if let Some(token) = bearer {
            return self.auth.verify(Credential::Bearer(token.trim()));
        }

        match headers.get(API_KEY_HEADER).and_then(|value| value.to_str().ok()) {
            Some(key) => self.auth.verify(Credential::ApiKey(key)),
            None => Err(AuthError::Missing),
        }
    }
}

/// Every failure the API can return, rendered as `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    Gateway(GatewayError),
    Auth(AuthError),
    Validation(ValidationError),
    RateLimited,
    PayloadTooLarge,
    NotFound(&'static str),
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError::Gateway(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Gateway(e) => (e.status_code(), e.client_message()),
            ApiError::Auth(AuthError::Signing(e)) => {
                error!("Token signing failed: {}", e);
                (500, "Internal server error".to_string())
            }
            ApiError::Auth(e) => (e.status_code(), e.to_string()),
            ApiError::Validation(e) => (e.status_code(), e.to_string()),
            ApiError::RateLimited => (429, "Rate limit exceeded".to_string()),
            ApiError::PayloadTooLarge => (413, "Request body too large".to_string()),
            ApiError::NotFound(what) => (404, what.to_string()),
        };

        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// Build the HTTP application
pub fn app(state: AppState, config: &ServerConfig) -> anyhow::Result<Router> {
    let cors = cors_layer(&config.cors_origins)?;
    let max_body_bytes = state.max_body_bytes;

    let router = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/token", post(issue_token))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(render_metrics))
        .layer(middleware::from_fn_with_state(max_body_bytes, enforce_body_limit))
        .layer(middleware::from_fn(track_metrics))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'"),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        }))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state);

    Ok(router)
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, API_KEY_HEADER])
        .max_age(Duration::from_secs(3600));

    if origins.iter().any(|origin| origin == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let allowed = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(layer.allow_origin(allowed))
}

/// Reject bodies whose declared length exceeds the configured ceiling
async fn enforce_body_limit(
    State(max_body_bytes): State<usize>,
    request: Request,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    match declared {
        Some(length) if length > max_body_bytes as u64 => {
            warn!(length, max_body_bytes, "Request body too large");
            ApiError::PayloadTooLarge.into_response()
        }
        _ => next.run(request).await,
    }
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = request.method().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "endpoint" => endpoint.clone(),
        "http_status" => status
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "endpoint" => endpoint
    )
    .record(start.elapsed().as_secs_f64());

    response
}

async fn read_json<T: DeserializeOwned>(body: Body, limit: usize) -> Result<T, ApiError> {
    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| ApiError::PayloadTooLarge)?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::Validation(ValidationError::Malformed(e.to_string())))
}

async fn chat_completions(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    state.check_rate_limit(&parts, LimitRule::Chat)?;
    let identity = state.authenticate(&parts.headers)?;
    let payload: ChatRequest = read_json(body, state.max_body_bytes).await?;

    debug!(subject = %identity.subject, stream = payload.is_stream(), "Chat completion request");

    if payload.is_stream() {
        let stream = state.gateway.chat_stream(&payload).await?;
        Ok(sse_response(stream).into_response())
    } else {
        let result = state.gateway.chat(&payload).await?;
        Ok(Json(ChatCompletionResponse::from(result)).into_response())
    }
}

async fn embeddings(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let (parts, body) = request.into_parts();
    state.check_rate_limit(&parts, LimitRule::Embed)?;
    let identity = state.authenticate(&parts.headers)?;
    let payload: EmbeddingRequest = read_json(body, state.max_body_bytes).await?;

    debug!(subject = %identity.subject, inputs = payload.input.len(), "Embedding request");

    let result = state.gateway.embed(&payload).await?;
    Ok(Json(EmbeddingResponse::from(result)))
}

async fn issue_token(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<TokenResponse>, ApiError> {
    let (parts, body) = request.into_parts();
    state.check_rate_limit(&parts, LimitRule::Token)?;
    let payload: TokenRequest = read_json(body, state.max_body_bytes).await?;

    let token = state.auth.issue(&payload.api_key)?;
    Ok(Json(TokenResponse {
        access_token: token.access_token,
        token_type: "bearer",
    }))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn readyz(State(state): State<AppState>) -> Response {
    match state.gateway.readiness().await {
        Ok(()) => Json(ReadinessResponse {
            ready: true,
            errors: Default::default(),
        })
        .into_response(),
        Err(errors) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                errors,
            }),
        )
            .into_response(),
    }
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => ApiError::NotFound("Metrics are not enabled").into_response(),
    }
}

fn error_event(detail: &str) -> Event {
    Event::default()
        .event("error")
        .data(serde_json::json!({ "detail": detail }).to_string())
}

/// Server-Sent Events body for a chat stream.
///
/// Chunks are forwarded as they are pulled. A clean end is followed by
/// `data: [DONE]`; a failure emits one `error` event and closes without it.
fn sse_response(stream: ChatStream) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send> {
    let events = async_stream::stream! {
        let mut stream = stream;

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => match Event::default().json_data(ChatCompletionChunk::from(chunk)) {
                    Ok(event) => yield Ok::<Event, Infallible>(event),
                    Err(e) => {
                        error!("Failed to encode stream chunk: {}", e);
                        yield Ok(error_event("Failed to encode stream chunk"));
                        return;
                    }
                },
                Err(e) => {
                    warn!("Stream aborted: {}", e);
                    yield Ok(error_event(&e.client_message()));
                    return;
                }
            }
        }

        yield Ok(Event::default().data("[DONE]"));
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}
