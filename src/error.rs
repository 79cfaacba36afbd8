// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync error taxonomy.
//!
//! Transient failures are retried by the fetcher and end a run cleanly once
//! the retry ceiling is hit. Auth, configuration and integrity failures stop
//! the run before any persisted artifact is touched.

use crate::config::ConfigError;
use std::path::PathBuf;

/// Run-level error type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Network timeout, 5xx, 429 or an undecodable page.
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Expired or invalid credentials. Never retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Non-retryable provider response (4xx other than auth/rate limit).
    #[error("Provider API error: {0}")]
    ProviderApi(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A persisted artifact exists but cannot be trusted.
    #[error("Persisted state at {} is unreadable ({reason}); repair it or run with SYNC_FULL_BACKFILL=true", path.display())]
    Integrity { path: PathBuf, reason: String },

    #[error("Failed to write {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    /// Message used when the provider answers 429.
    pub const RATE_LIMITED: &'static str = "Rate limit exceeded";

    /// Message used when the provider rejects the access token.
    pub const TOKEN_REJECTED: &'static str = "Access token rejected; refresh the provider credentials";

    /// Whether the fetcher may retry the failed call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transient(_))
    }

    /// Whether this error requires an external token refresh.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::Auth(_))
    }

    /// Whether the provider reported rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SyncError::Transient(msg) if msg.contains(Self::RATE_LIMITED))
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
