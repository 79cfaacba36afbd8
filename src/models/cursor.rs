// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Per-provider backfill cursor.

use crate::models::Provider;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How far into history backfill has progressed for one provider.
///
/// Backfill pages newest-first below `window_before`. Progress is kept as
/// a time keyset, `resume_before`, rather than a page offset, so records
/// appearing or disappearing upstream between runs never shift a resumed
/// run past unfetched activities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillCursor {
    /// Earliest local date successfully paged to
    #[serde(default)]
    pub oldest_reached_date: Option<NaiveDate>,
    #[serde(default)]
    pub complete: bool,
    /// Continuation: the next run pages below this instant
    #[serde(default)]
    pub resume_before: Option<DateTime<Utc>>,
    /// Upper bound of the backfill window, stamped on the first run
    #[serde(default)]
    pub window_before: Option<DateTime<Utc>>,
    /// Lower bound in force when backfill completed; `None` is unbounded
    #[serde(default)]
    pub completed_bound: Option<NaiveDate>,
    #[serde(default)]
    pub last_run_timestamp: Option<DateTime<Utc>>,
}

impl BackfillCursor {
    /// A cursor for a backfill starting at `now`.
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            window_before: Some(now),
            ..Self::default()
        }
    }

    /// Upper bound for this run's backfill pass.
    pub fn next_before(&self) -> Option<DateTime<Utc>> {
        self.resume_before.or(self.window_before)
    }

    /// Commit a fully processed page whose oldest record started at
    /// `page_oldest_start`.
    ///
    /// The next run resumes one second above that start, so activities
    /// sharing the instant are refetched rather than skipped. Neither
    /// `oldest_reached_date` nor `resume_before` ever moves forward.
    pub fn advance(
        &mut self,
        page_oldest_date: Option<NaiveDate>,
        page_oldest_start: Option<DateTime<Utc>>,
    ) {
        if let Some(date) = page_oldest_date {
            self.oldest_reached_date = Some(match self.oldest_reached_date {
                Some(current) => current.min(date),
                None => date,
            });
        }
        let resume = page_oldest_start.and_then(|t| t.checked_add_signed(Duration::seconds(1)));
        if let Some(resume) = resume {
            self.resume_before = Some(match self.resume_before {
                Some(current) => current.min(resume),
                None => resume,
            });
        }
    }

    /// Mark the window exhausted down to `bound`.
    pub fn mark_complete(&mut self, bound: Option<NaiveDate>) {
        self.complete = true;
        self.resume_before = None;
        self.completed_bound = bound;
    }

    /// Whether `bound` reaches further back than the completed backfill did.
    pub fn is_shallower_than(&self, bound: Option<NaiveDate>) -> bool {
        match (self.completed_bound, bound) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(done), Some(wanted)) => wanted < done,
        }
    }

    /// Resume a completed backfill below `resume_before`.
    pub fn reopen(&mut self, resume_before: DateTime<Utc>) {
        self.complete = false;
        self.completed_bound = None;
        self.resume_before = Some(resume_before);
    }
}

/// All cursors, keyed by provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CursorSet(pub BTreeMap<Provider, BackfillCursor>);

impl CursorSet {
    pub fn get(&self, provider: Provider) -> Option<&BackfillCursor> {
        self.0.get(&provider)
    }

    pub fn set(&mut self, provider: Provider, cursor: BackfillCursor) {
        self.0.insert(provider, cursor);
    }

    pub fn remove(&mut self, provider: Provider) -> Option<BackfillCursor> {
        self.0.remove(&provider)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
