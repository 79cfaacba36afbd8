// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Source marker and reset guard.
//!
//! History, cursors and aggregates are only meaningful for the provider and
//! account that produced them. When either changes, everything is discarded.

use crate::models::{Provider, SourceMarker};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
const FINGERPRINT_LEN: usize = 16;

/// Non-identifying fingerprint of a provider account.
pub fn fingerprint(provider: Provider, account_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(account_id.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}

/// Why persisted state must be discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetReason {
    ProviderChanged { from: Provider, to: Provider },
    AccountChanged,
    /// No marker, but history holds another provider's records
    ForeignHistory,
}

impl std::fmt::Display for ResetReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetReason::ProviderChanged { from, to } => {
                write!(f, "provider changed from {} to {}", from, to)
            }
            ResetReason::AccountChanged => f.write_str("account fingerprint changed"),
            ResetReason::ForeignHistory => f.write_str("history belongs to another provider"),
        }
    }
}

/// Compare the configured source against the persisted marker.
///
/// A fingerprint mismatch only counts when both sides have one.
pub fn check_reset(
    marker: Option<&SourceMarker>,
    provider: Provider,
    fingerprint: Option<&str>,
    history_has_foreign: bool,
) -> Option<ResetReason> {
    let Some(marker) = marker else {
        return history_has_foreign.then_some(ResetReason::ForeignHistory);
    };

    if marker.active_provider != provider {
        return Some(ResetReason::ProviderChanged {
            from: marker.active_provider,
            to: provider,
        });
    }

    match (marker.fingerprint.as_deref(), fingerprint) {
        (Some(stored), Some(current)) if stored != current => Some(ResetReason::AccountChanged),
        _ => None,
    }
}

/// The marker to persist at the end of a run.
///
/// A missing current fingerprint keeps the stored one.
pub fn next_marker(
    previous: Option<&SourceMarker>,
    provider: Provider,
    fingerprint: Option<String>,
    now: DateTime<Utc>,
) -> SourceMarker {
    let fingerprint = fingerprint.or_else(|| {
        previous
            .filter(|m| m.active_provider == provider)
            .and_then(|m| m.fingerprint.clone())
    });
    SourceMarker {
        active_provider: provider,
        fingerprint,
        updated_at: now,
    }
}
