// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer (JSON artifacts on disk).

pub mod store;

pub use store::{ArtifactStore, PersistedState};

/// Artifact file names under the data directory.
pub mod artifacts {
    /// Canonical activity history
    pub const ACTIVITIES: &str = "activities.json";
    pub const BACKFILL_STATE: &str = "backfill_state.json";
    pub const SOURCE: &str = "source.json";
    /// Daily aggregates (metric)
    pub const DAILY: &str = "daily.json";
}
