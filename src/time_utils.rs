// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and local-day edges.
//!
//! An activity's local date depends on its own UTC offset, which can be
//! anywhere from -12h to +14h. A local day is only known to lie inside a
//! UTC interval once the interval is widened by those offsets.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, Utc};

/// Furthest any zone runs ahead of UTC (Line Islands), in hours.
const MAX_OFFSET_AHEAD_HOURS: i64 = 14;
/// Furthest any zone runs behind UTC (Baker Island), in hours.
const MAX_OFFSET_BEHIND_HOURS: i64 = 12;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// First local date all of whose instants fall at or after `instant`.
pub fn first_full_day(instant: DateTime<Utc>) -> NaiveDate {
    let shifted = instant + Duration::hours(MAX_OFFSET_AHEAD_HOURS);
    let date = shifted.date_naive();
    if shifted.time() == NaiveTime::MIN {
        date
    } else {
        date.succ_opt().unwrap_or(date)
    }
}

/// Last local date all of whose instants fall at or before `instant`.
pub fn last_full_day(instant: DateTime<Utc>) -> NaiveDate {
    let date = (instant - Duration::hours(MAX_OFFSET_BEHIND_HOURS)).date_naive();
    date.pred_opt().unwrap_or(date)
}

/// Earliest UTC instant that can carry the given local date.
pub fn earliest_instant_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc() - Duration::hours(MAX_OFFSET_AHEAD_HOURS)
}
