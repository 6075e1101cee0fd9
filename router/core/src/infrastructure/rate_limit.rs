// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Per-client rate limiting
//
// One keyed GCRA limiter per endpoint rule. Keys are client addresses.

use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::info;

use crate::domain::config::{RateLimitConfig, RateLimitRule, RatePeriod};

/// Which endpoint budget a request draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitRule {
    Token,
    Chat,
    Embed,
}

pub trait RequestLimiter: Send + Sync {
    /// Consume one unit for `key`; false when the budget is exhausted
    fn allow(&self, key: &str, rule: LimitRule) -> bool;
}

pub struct GovernorLimiter {
    token: DefaultKeyedRateLimiter<String>,
    chat: DefaultKeyedRateLimiter<String>,
    embed: DefaultKeyedRateLimiter<String>,
}

fn quota(rule: RateLimitRule) -> Quota {
    match rule.period {
        RatePeriod::Second => Quota::per_second(rule.count),
        RatePeriod::Minute => Quota::per_minute(rule.count),
        RatePeriod::Hour => Quota::per_hour(rule.count),
        RatePeriod::Day => Quota::with_period(Duration::from_secs(rule.period.as_secs()) / rule.count.get())
            .map(|q| q.allow_burst(rule.count))
            .unwrap_or_else(|| Quota::per_hour(rule.count)),
    }
}

impl GovernorLimiter {
    pub fn new(token: RateLimitRule, chat: RateLimitRule, embed: RateLimitRule) -> Self {
        Self {
            token: RateLimiter::keyed(quota(token)),
            chat: RateLimiter::keyed(quota(chat)),
            embed: RateLimiter::keyed(quota(embed)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> anyhow::Result<Self> {
        let parse = |field: &str, raw: &str| {
            raw.parse::<RateLimitRule>()
                .map_err(|e| anyhow::anyhow!("rate_limits.{}: {}", field, e))
        };

        let token = parse("token", &config.token)?;
        let chat = parse("chat", &config.chat)?;
        let embed = parse("embed", &config.embed)?;
        info!(%token, %chat, %embed, "Rate limits configured");

        Ok(Self::new(token, chat, embed))
    }

    fn limiter(&self, rule: LimitRule) -> &DefaultKeyedRateLimiter<String> {
        match rule {
            LimitRule::Token => &self.token,
            LimitRule::Chat => &self.chat,
            LimitRule::Embed => &self.embed,
        }
    }

    /// Drop state for keys whose budget has fully refilled
    pub fn retain_recent(&self) {
        self.token.retain_recent();
        self.chat.retain_recent();
        self.embed.retain_recent();
    }
}

impl RequestLimiter for GovernorLimiter {
    fn allow(&self, key: &str, rule: LimitRule) -> bool {
        self.limiter(rule).check_key(&key.to_string()).is_ok()
    }
}
