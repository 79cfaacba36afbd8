// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the sync pipeline.

pub mod activity;
pub mod cursor;
pub mod dashboard;
pub mod history;
pub mod marker;
pub mod stats;
pub mod units;

pub use activity::{ActivityKey, CanonicalActivity, Provider, RawTypeFields};
pub use cursor::{BackfillCursor, CursorSet};
pub use dashboard::{DashboardData, DashboardDay, DashboardSummary, DashboardTotals, DashboardUnits};
pub use history::History;
pub use marker::SourceMarker;
pub use stats::{DailyAggregate, Totals};
pub use units::{DistanceUnit, ElevationUnit, Units};
