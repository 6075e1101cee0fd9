// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Client Authentication
//
// Callers present either the shared API key (X-API-Key) or a short-lived
// HS256 JWT obtained from /v1/token by exchanging that key.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::config::{resolve_secret, AuthConfig};

/// Subject of every token this router issues
pub const TOKEN_SUBJECT: &str = "router-client";

const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Credential extracted from a request
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    Bearer(&'a str),
    ApiKey(&'a str),
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    Missing,

    #[error("Invalid or missing API Key")]
    InvalidApiKey,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid API key")]
    TokenExchangeDenied,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Signing(_) => 500,
            _ => 403,
        }
    }
}

pub struct TokenAuthority {
    api_key: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenAuthority {
    pub fn new(api_key: impl Into<String>, jwt_secret: &str, ttl_minutes: u64) -> Self {
        Self {
            api_key: api_key.into(),
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            ttl: Duration::minutes(i64::try_from(ttl_minutes).unwrap_or(MAX_TTL_MINUTES).min(MAX_TTL_MINUTES)),
        }
    }

    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let api_key = resolve_secret(&config.api_key)?
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow::anyhow!("auth.api_key is not configured"))?;
        let jwt_secret = resolve_secret(&config.jwt_secret)?
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| anyhow::anyhow!("auth.jwt_secret is not configured"))?;

        Ok(Self::new(api_key, &jwt_secret, config.token_ttl_minutes))
    }

    fn api_key_matches(&self, presented: &str) -> bool {
        presented.as_bytes().ct_eq(self.api_key.as_bytes()).into()
    }

    /// Exchange the shared API key for a signed access token
    pub fn issue(&self, presented_key: &str) -> Result<IssuedToken, AuthError> {
        if !self.api_key_matches(presented_key) {
            warn!("Token request rejected: invalid API key");
            return Err(AuthError::TokenExchangeDenied);
        }

        let now = Utc::now();
        let claims = Claims {
            sub: TOKEN_SUBJECT.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            expires_in: self.ttl.num_seconds(),
        })
    }

    pub fn verify(&self, credential: Credential<'_>) -> Result<Identity, AuthError> {
        match credential {
            Credential::ApiKey(key) => {
                if self.api_key_matches(key) {
                    Ok(Identity {
                        subject: TOKEN_SUBJECT.to_string(),
                    })
                } else {
                    warn!("Rejected request with invalid API key");
                    Err(AuthError::InvalidApiKey)
                }
            }
            Credential::Bearer(token) => {
                let mut validation = Validation::new(Algorithm::HS256);
                validation.set_required_spec_claims(&["exp", "sub"]);

                let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                    debug!("JWT verification failed: {}", e);
                    AuthError::InvalidToken
                })?;

                Ok(Identity {
                    subject: data.claims.sub,
                })
            }
        }
    }
}
