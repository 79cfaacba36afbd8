// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Rate-limited, retrying page fetcher.
//!
//! Providers implement [`ActivitySource`]; the [`Fetcher`] gates each call
//! through the [`RateLimiter`] and retries transient failures with bounded
//! backoff. Auth and other non-retryable errors are returned immediately.

use crate::config::{Config, RetrySettings};
use crate::error::{Result, SyncError};
use crate::models::Provider;
use crate::services::rate_limit::{RateLimiter, WindowCap};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Time bounds for one pass. Both ends are exclusive.
///
/// A provider may return records outside the window; the sync loop stops
/// once a newest-first pass reaches a record at or below `after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchWindow {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

/// One page request inside a fixed window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub window: FetchWindow,
    /// Opaque continuation; `None` is the top of the window
    pub token: Option<String>,
    pub per_page: u32,
}

/// One page of provider-native records, newest first.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<serde_json::Value>,
    /// `None` when the window has no more pages
    pub next_token: Option<String>,
    /// Per-window call counts reported by the provider, if any
    pub reported_usage: Option<Vec<u32>>,
}

/// An authenticated "fetch a page of activities" capability.
///
/// Pages are expected newest-first. Sources that cannot guarantee it are
/// still safe: coverage and resume points are only derived from ordered
/// pages.
pub trait ActivitySource {
    fn provider(&self) -> Provider;

    /// Stable account identifier, used only to derive a fingerprint.
    fn account_id(&self) -> impl Future<Output = Result<Option<String>>>;

    fn fetch_page(&self, request: &PageRequest) -> impl Future<Output = Result<Page>>;
}

/// Why a pass stopped before the window was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    RateLimited,
    RetriesExhausted,
    NoProgress,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::RateLimited => "rate_limited",
            StopReason::RetriesExhausted => "retries_exhausted",
            StopReason::NoProgress => "no_progress",
        }
    }
}

/// Outcome of a gated fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    Page(Page),
    Stopped(StopReason),
}

/// Exponential backoff schedule with a hard ceiling on attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: settings.base_delay,
        }
    }

    /// Delay before attempt `attempt` (0-based); the first attempt is immediate.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay.saturating_mul(1u32 << (attempt - 1).min(16))
    }
}

/// Drives provider calls through the limiter and retry policy.
#[derive(Debug)]
pub struct Fetcher {
    limiter: RateLimiter,
    retry: RetryPolicy,
    calls: u32,
}

impl Fetcher {
    pub fn new(limiter: RateLimiter, retry: RetryPolicy) -> Self {
        Self {
            limiter,
            retry,
            calls: 0,
        }
    }

    /// Build the limiter and retry policy for the configured provider.
    pub fn for_config(config: &Config) -> Self {
        let caps = config
            .rate_limits
            .caps
            .clone()
            .unwrap_or_else(|| WindowCap::provider_defaults(config.provider));
        Self::new(
            RateLimiter::new(caps, config.rate_limits.max_wait),
            RetryPolicy::new(&config.retry),
        )
    }

    /// Outbound calls made so far, retries included.
    pub fn calls(&self) -> u32 {
        self.calls
    }

    /// Fetch one page, or report why the run should stop.
    pub async fn fetch<S: ActivitySource>(
        &mut self,
        source: &S,
        request: &PageRequest,
    ) -> Result<FetchOutcome> {
        let mut last_error = None;

        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            if !self.limiter.admit_call().await {
                tracing::warn!(
                    provider = %source.provider(),
                    calls = self.calls,
                    "Rate limit budget exhausted for this run"
                );
                return Ok(FetchOutcome::Stopped(StopReason::RateLimited));
            }
            self.calls += 1;

            match source.fetch_page(request).await {
                Ok(page) => {
                    if let Some(usage) = &page.reported_usage {
                        self.limiter.observe_usage(usage, Instant::now());
                    }
                    return Ok(FetchOutcome::Page(page));
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        provider = %source.provider(),
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "Transient fetch failure"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(e) = last_error {
            tracing::error!(
                provider = %source.provider(),
                error = %e,
                "Giving up on page after retries"
            );
        }
        Ok(FetchOutcome::Stopped(StopReason::RetriesExhausted))
    }
}

/// Parse a numeric continuation token, defaulting when absent.
pub fn parse_numeric_token(token: Option<&str>, default: u32) -> Result<u32> {
    match token {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            SyncError::Internal(anyhow::anyhow!(
                "Invalid continuation token '{}'",
                raw
            ))
        }),
    }
}
