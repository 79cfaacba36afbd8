// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Projection of daily aggregates into the front-end artifact.

use crate::models::{
    DailyAggregate, DashboardData, DashboardDay, DashboardSummary, DashboardTotals,
    DashboardUnits, Provider, Totals, Units,
};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeSet;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Convert metric totals to display units.
pub fn display_totals(totals: &Totals, units: Units) -> DashboardTotals {
    DashboardTotals {
        count: totals.count,
        distance: round_to(units.distance.from_meters(totals.distance_meters), 2),
        elevation: round_to(units.elevation.from_meters(totals.elevation_gain_meters), 1),
        moving_time: totals.moving_time_seconds,
    }
}

/// Build `data.json` from the aggregate sequence.
pub fn build_dashboard(
    aggregates: &[DailyAggregate],
    types: Vec<String>,
    provider: Provider,
    units: Units,
    generated_at: DateTime<Utc>,
) -> DashboardData {
    let mut summary = Totals::default();
    let mut active_days = 0;
    let mut years = BTreeSet::new();

    let days = aggregates
        .iter()
        .map(|day| {
            summary.merge(&day.totals);
            if !day.totals.is_empty() {
                active_days += 1;
            }
            years.insert(day.date.year());

            DashboardDay {
                date: day.date.to_string(),
                totals: display_totals(&day.totals, units),
                types: day
                    .per_type_totals
                    .iter()
                    .map(|(kind, totals)| (kind.clone(), display_totals(totals, units)))
                    .collect(),
            }
        })
        .collect();

    DashboardData {
        generated_at: format_utc_rfc3339(generated_at),
        provider: provider.to_string(),
        units: DashboardUnits {
            distance: units.distance.to_string(),
            elevation: units.elevation.to_string(),
        },
        types,
        years: years.into_iter().collect(),
        days,
        summary: DashboardSummary {
            totals: display_totals(&summary, units),
            active_days,
        },
    }
}
