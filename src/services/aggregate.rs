// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily aggregation over the full canonical history.
//!
//! Always a total recompute; nothing here is patched incrementally.

use crate::config::TypeRules;
use crate::models::{CanonicalActivity, DailyAggregate, History};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Which canonical types count toward aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// Everything except the listed types
    AllExcept(BTreeSet<String>),
    /// Only the listed types
    Only(BTreeSet<String>),
}

impl TypeFilter {
    pub fn from_rules(rules: &TypeRules) -> Self {
        if rules.include_all_types {
            TypeFilter::AllExcept(rules.exclude.clone())
        } else {
            TypeFilter::Only(rules.include.clone())
        }
    }

    pub fn includes(&self, canonical_type: &str) -> bool {
        match self {
            TypeFilter::AllExcept(excluded) => !excluded.contains(canonical_type),
            TypeFilter::Only(included) => included.contains(canonical_type),
        }
    }
}

/// Builds the date-ordered aggregate sequence.
#[derive(Debug, Clone)]
pub struct Aggregator {
    filter: TypeFilter,
}

impl Aggregator {
    pub fn new(filter: TypeFilter) -> Self {
        Self { filter }
    }

    pub fn for_rules(rules: &TypeRules) -> Self {
        Self::new(TypeFilter::from_rules(rules))
    }

    pub fn qualifies(&self, activity: &CanonicalActivity) -> bool {
        self.filter.includes(&activity.canonical_type)
    }

    /// One entry per day from the first to the last qualifying day.
    pub fn aggregate(&self, history: &History) -> Vec<DailyAggregate> {
        let mut days: BTreeMap<NaiveDate, DailyAggregate> = BTreeMap::new();
        for activity in history.iter().filter(|a| self.qualifies(a)) {
            days.entry(activity.local_date)
                .or_insert_with(|| DailyAggregate::empty(activity.local_date))
                .add_activity(activity);
        }

        let (Some(&first), Some(&last)) = (days.keys().next(), days.keys().next_back()) else {
            return Vec::new();
        };

        first
            .iter_days()
            .take_while(|date| *date <= last)
            .map(|date| {
                days.remove(&date)
                    .unwrap_or_else(|| DailyAggregate::empty(date))
            })
            .collect()
    }

    /// Qualifying types present in the history, sorted.
    pub fn observed_types(&self, history: &History) -> Vec<String> {
        history
            .iter()
            .filter(|a| self.qualifies(a))
            .map(|a| a.canonical_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
