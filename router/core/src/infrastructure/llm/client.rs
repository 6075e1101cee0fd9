// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Shared Upstream HTTP Client
//
// One instance per configured provider, created at start-up and shared by
// every adapter constructed for that provider. Holds the connection pool,
// endpoint, credentials and timeout; per-request values are call arguments.

use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::llm::{LLMError, Operation, UpstreamFailure};
use crate::infrastructure::llm::framing::{LineBuffer, MAX_LINE_BYTES};

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    provider: String,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            provider: provider.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
            timeout,
        }
    }

    /// Registry name of the provider this client serves
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// POST a JSON body and return the response once a 2xx status arrives.
    ///
    /// Non-streaming requests are bounded end to end by the provider timeout.
    /// Streaming requests only bound the wait for response headers; the body
    /// is read under an idle timeout by [`UpstreamClient::lines`].
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        operation: Operation,
        path: &str,
        body: &B,
        streaming: bool,
    ) -> Result<reqwest::Response, LLMError> {
        let url = self.url(path);
        debug!(provider = %self.provider, %operation, %url, "Sending upstream request");

        let request = self.authorize(self.http.post(&url)).json(body);
        let response = if streaming {
            tokio::time::timeout(self.timeout, request.send())
                .await
                .map_err(|_| self.error(operation, UpstreamFailure::Timeout))?
        } else {
            request.timeout(self.timeout).send().await
        };

        let response = response.map_err(|e| self.transport_error(operation, &e))?;
        self.check_status(operation, response).await
    }

    /// Reachability check: any HTTP reply counts, only transport failures
    /// and timeouts are errors. A non-2xx reply is logged.
    pub async fn check_reachable(&self, path: &str) -> Result<(), LLMError> {
        let response = self
            .authorize(self.http.get(self.url(path)))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(Operation::HealthCheck, &e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(provider = %self.provider, %status, path, "Health check answered with non-success status");
        }
        Ok(())
    }

    async fn check_status(
        &self,
        operation: Operation,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, LLMError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(self.error(
            operation,
            UpstreamFailure::Status {
                status: status.as_u16(),
                body,
            },
        ))
    }

    /// Read and decode a complete JSON response body
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        response: reqwest::Response,
    ) -> Result<T, LLMError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(operation, &e))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            self.error(
                operation,
                UpstreamFailure::MalformedResponse(format!("Failed to parse response: {}", e)),
            )
        })
    }

    /// Split a streaming response body into lines.
    ///
    /// Each upstream network chunk is pulled only when the consumer asks for
    /// the next line. A gap longer than the provider timeout ends the
    /// sequence with a timeout error, and a broken connection ends it with a
    /// transport error. An unterminated line longer than [`MAX_LINE_BYTES`]
    /// is malformed. A trailing line without a newline is still yielded.
    pub fn lines(
        &self,
        response: reqwest::Response,
    ) -> impl Stream<Item = Result<String, LLMError>> + Send + 'static {
        let client = self.clone();

        async_stream::stream! {
            let mut body = Box::pin(response.bytes_stream());
            let mut buffer = LineBuffer::default();

            loop {
                match tokio::time::timeout(client.timeout, body.next()).await {
                    Err(_) => {
                        yield Err(client.error(Operation::ChatStream, UpstreamFailure::Timeout));
                        return;
                    }
                    Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        yield Err(client.transport_error(Operation::ChatStream, &e));
                        return;
                    }
                    Ok(Some(Ok(bytes))) => {
                        if let Err(e) = buffer.push(&bytes) {
                            yield Err(client.error(
                                Operation::ChatStream,
                                UpstreamFailure::MalformedResponse(e.to_string()),
                            ));
                            return;
                        }
                        while let Some(line) = buffer.next_line() {
                            yield Ok(line);
                        }
                    }
                }
            }

            if let Some(line) = buffer.finish() {
                yield Ok(line);
            }
        }
    }

    pub fn error(&self, operation: Operation, failure: UpstreamFailure) -> LLMError {
        LLMError::upstream(self.provider.clone(), operation, failure)
    }

    pub fn transport_error(&self, operation: Operation, err: &reqwest::Error) -> LLMError {
        self.error(operation, failure_from_reqwest(err))
    }
}

/// Classify a reqwest error
pub fn failure_from_reqwest(err: &reqwest::Error) -> UpstreamFailure {
    if err.is_timeout() {
        UpstreamFailure::Timeout
    } else if err.is_decode() {
        UpstreamFailure::MalformedResponse(err.to_string())
    } else {
        UpstreamFailure::Transport(err.to_string())
    }
}
