// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Canonical activity history keyed by `(provider, source_id)`.

use crate::models::{ActivityKey, CanonicalActivity, Provider};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted canonical history.
///
/// Stored on disk as an array ordered by key so re-serialization is stable.
/// Loading an array with repeated keys keeps the last entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "Vec<CanonicalActivity>",
    into = "Vec<CanonicalActivity>"
)]
pub struct History(BTreeMap<ActivityKey, CanonicalActivity>);

impl History {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &ActivityKey) -> Option<&CanonicalActivity> {
        self.0.get(key)
    }

    /// Insert or overwrite, returning the previous record.
    pub fn upsert(&mut self, activity: CanonicalActivity) -> Option<CanonicalActivity> {
        self.0.insert(activity.key(), activity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalActivity> {
        self.0.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CanonicalActivity> {
        self.0.values_mut()
    }

    /// Keep only records for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&CanonicalActivity) -> bool) {
        self.0.retain(|_, activity| keep(activity));
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Drop every record from one provider.
    pub fn clear_provider(&mut self, provider: Provider) -> usize {
        let before = self.0.len();
        self.0.retain(|key, _| key.provider != provider);
        before - self.0.len()
    }
}

impl From<Vec<CanonicalActivity>> for History {
    fn from(activities: Vec<CanonicalActivity>) -> Self {
        Self(
            activities
                .into_iter()
                .map(|activity| (activity.key(), activity))
                .collect(),
        )
    }
}

impl From<History> for Vec<CanonicalActivity> {
    fn from(history: History) -> Self {
        history.0.into_values().collect()
    }
}

impl FromIterator<CanonicalActivity> for History {
    fn from_iter<I: IntoIterator<Item = CanonicalActivity>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}
