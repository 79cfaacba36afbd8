//! Per-day aggregates for the calendar heatmap.
//!
//! These are rebuilt from the full canonical history on every run, so
//! edits and prunes upstream never leave stale totals behind.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::CanonicalActivity;

/// Summed measures for a set of activities (metric base units).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub distance_meters: f64,
    #[serde(default)]
    pub elevation_gain_meters: f64,
    #[serde(default)]
    pub moving_time_seconds: u64,
}

impl Totals {
    /// Add one activity's measures.
    pub fn add_activity(&mut self, activity: &CanonicalActivity) {
        self.count += 1;
        self.distance_meters += activity.distance_meters;
        self.elevation_gain_meters += activity.elevation_gain_meters;
        self.moving_time_seconds += activity.moving_time_seconds;
    }

    /// Add another set of totals.
    pub fn merge(&mut self, other: &Totals) {
        self.count += other.count;
        self.distance_meters += other.distance_meters;
        self.elevation_gain_meters += other.elevation_gain_meters;
        self.moving_time_seconds += other.moving_time_seconds;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Rollup of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    /// Totals per canonical type (or group bucket)
    #[serde(default)]
    pub per_type_totals: BTreeMap<String, Totals>,
    /// Sum across included types only
    #[serde(default)]
    pub totals: Totals,
}

impl DailyAggregate {
    /// An empty day (kept so the heatmap has no gaps).
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            per_type_totals: BTreeMap::new(),
            totals: Totals::default(),
        }
    }

    /// Fold an activity into this day.
    pub fn add_activity(&mut self, activity: &CanonicalActivity) {
        self.per_type_totals
            .entry(activity.canonical_type.clone())
            .or_default()
            .add_activity(activity);
        self.totals.add_activity(activity);
    }
}
