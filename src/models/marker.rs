// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Source marker recording which provider/account produced the history.

use crate::models::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMarker {
    /// Provider of the last successful sync
    pub active_provider: Provider,
    /// Truncated SHA-256 of the account id; never the id itself
    #[serde(default)]
    pub fingerprint: Option<String>,
    pub updated_at: DateTime<Utc>,
}
