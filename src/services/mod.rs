// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync pipeline stages and provider adapters.

pub mod aggregate;
pub mod dashboard;
pub mod fetcher;
pub mod garmin;
pub mod merge;
pub mod normalize;
pub mod rate_limit;
pub mod source_marker;
pub mod strava;
pub mod sync;

pub use aggregate::{Aggregator, TypeFilter};
pub use fetcher::{ActivitySource, FetchWindow, Fetcher, Page, PageRequest, RetryPolicy, StopReason};
pub use garmin::{GarminClient, GarminService};
pub use merge::{CoveredRanges, DateRange, MergeStats};
pub use normalize::{NormalizeError, Normalizer};
pub use rate_limit::{RateLimiter, WindowCap};
pub use strava::{StravaClient, StravaService};
pub use sync::{SyncReport, SyncService};
