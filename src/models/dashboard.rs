// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Dashboard artifact consumed by the static heatmap front end.
//!
//! Values here are already converted to display units.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Root of `data.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "site/src/generated/")
)]
pub struct DashboardData {
    pub generated_at: String,
    pub provider: String,
    pub units: DashboardUnits,
    /// Legend: included types observed in the history
    pub types: Vec<String>,
    pub years: Vec<i32>,
    pub days: Vec<DashboardDay>,
    pub summary: DashboardSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "site/src/generated/")
)]
pub struct DashboardUnits {
    pub distance: String,
    pub elevation: String,
}

/// Measures for a day or a single type within a day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "site/src/generated/")
)]
pub struct DashboardTotals {
    pub count: u32,
    pub distance: f64,
    pub elevation: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub moving_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "site/src/generated/")
)]
pub struct DashboardDay {
    pub date: String,
    #[serde(flatten)]
    pub totals: DashboardTotals,
    pub types: BTreeMap<String, DashboardTotals>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "site/src/generated/")
)]
pub struct DashboardSummary {
    #[serde(flatten)]
    pub totals: DashboardTotals,
    pub active_days: u32,
}
