// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! History merger and prune guard.
//!
//! Merging is last-write-wins on the full record. Pruning only removes a
//! stored activity when its local date lies inside a range this run saw
//! completely and the activity was absent from what was fetched.

use crate::models::{ActivityKey, CanonicalActivity, History, Provider};
use crate::services::fetcher::FetchWindow;
use crate::time_utils::{first_full_day, last_full_day};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;

/// Inclusive range of local dates; `None` ends are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }

    pub fn is_empty(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }
}

/// Union of the date ranges a run saw completely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoveredRanges(Vec<DateRange>);

impl CoveredRanges {
    pub fn add(&mut self, range: DateRange) {
        if !range.is_empty() {
            self.0.push(range);
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.iter().any(|range| range.contains(date))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Tracks what one fetch pass actually saw.
///
/// A pass always starts at the top of its window. Until it reaches the end,
/// it can only vouch for the span between its window top and the oldest
/// record seen, and only while pages keep arriving newest-first. A pass
/// whose pages break that order covers nothing unless it exhausts the window.
#[derive(Debug, Clone)]
pub struct PassCoverage {
    window: FetchWindow,
    newest_first: bool,
    previous_oldest: Option<DateTime<Utc>>,
    oldest_seen: Option<DateTime<Utc>>,
    reached_end: bool,
}

impl PassCoverage {
    pub fn new(window: FetchWindow) -> Self {
        Self {
            window,
            newest_first: true,
            previous_oldest: None,
            oldest_seen: None,
            reached_end: false,
        }
    }

    /// Record a processed page, in the order the provider returned it.
    pub fn observe_page(&mut self, activities: &[CanonicalActivity]) {
        let starts: Vec<DateTime<Utc>> =
            activities.iter().map(|a| a.start_timestamp_utc).collect();
        let descending = starts.windows(2).all(|pair| pair[0] >= pair[1]);
        let follows_previous = match (self.previous_oldest, starts.first()) {
            (Some(previous), Some(first)) => *first <= previous,
            _ => true,
        };
        if self.newest_first && !(descending && follows_previous) {
            tracing::warn!(
                window = ?self.window,
                "Provider pages are not newest-first; coverage limited to a complete window"
            );
            self.newest_first = false;
        }

        if let Some(oldest) = starts.iter().min().copied() {
            self.previous_oldest = Some(oldest);
            self.oldest_seen = Some(self.oldest_seen.map_or(oldest, |o| o.min(oldest)));
        }
    }

    /// Whether every page so far arrived newest-first.
    pub fn is_newest_first(&self) -> bool {
        self.newest_first
    }

    /// The pass exhausted its window (or crossed its lower edge).
    pub fn mark_reached_end(&mut self) {
        self.reached_end = true;
    }

    pub fn reached_end(&self) -> bool {
        self.reached_end
    }

    /// Dates this pass saw completely, if any.
    pub fn covered(&self) -> Option<DateRange> {
        let end = self.window.before.map(last_full_day);
        let start = if self.reached_end {
            self.window.after.map(first_full_day)
        } else if self.newest_first {
            Some(first_full_day(self.oldest_seen?))
        } else {
            return None;
        };

        let range = DateRange::new(start, end);
        (!range.is_empty()).then_some(range)
    }
}

/// Counts from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: u32,
    pub updated: u32,
    pub unchanged: u32,
}

impl MergeStats {
    pub fn merged(&self) -> u32 {
        self.inserted + self.updated + self.unchanged
    }

    pub fn add(&mut self, other: MergeStats) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }
}

/// Upsert a batch into history. A key repeated within the batch keeps its
/// last occurrence.
pub fn merge_batch(history: &mut History, batch: Vec<CanonicalActivity>) -> MergeStats {
    let mut stats = MergeStats::default();
    for activity in batch {
        match history.get(&activity.key()) {
            None => stats.inserted += 1,
            Some(existing) if *existing == activity => stats.unchanged += 1,
            Some(_) => stats.updated += 1,
        }
        history.upsert(activity);
    }
    stats
}

/// Remove `provider` activities inside `covered` that were not fetched.
pub fn prune_absent(
    history: &mut History,
    provider: Provider,
    covered: &CoveredRanges,
    seen: &BTreeSet<ActivityKey>,
) -> u32 {
    if covered.is_empty() {
        return 0;
    }

    let mut pruned = 0;
    history.retain(|activity| {
        let remove = activity.provider == provider
            && covered.contains(activity.local_date)
            && !seen.contains(&activity.key());
        if remove {
            tracing::debug!(key = %activity.key(), date = %activity.local_date, "Pruning activity absent upstream");
            pruned += 1;
        }
        !remove
    });
    pruned
}
