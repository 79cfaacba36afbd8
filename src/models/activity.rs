// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Canonical activity model shared by both providers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream fitness provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Strava,
    Garmin,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Strava => "strava",
            Provider::Garmin => "garmin",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strava" => Ok(Provider::Strava),
            "garmin" => Ok(Provider::Garmin),
            other => Err(format!("unknown provider '{}' (expected strava or garmin)", other)),
        }
    }
}

/// Global identity of an activity: `(provider, source_id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActivityKey {
    pub provider: Provider,
    pub source_id: String,
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.source_id)
    }
}

/// Original type signals, kept so types can be re-resolved when rules change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTypeFields {
    /// Fine-grained type (Strava `sport_type`, Garmin `activityType.typeKey`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    /// Legacy/coarse type (Strava `type`, Garmin parent type)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

/// Normalized activity record in the stable cross-provider schema.
///
/// Measures are always metric base units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalActivity {
    pub source_id: String,
    pub provider: Provider,
    /// Type after alias and grouping rules
    pub canonical_type: String,
    pub raw_type_fields: RawTypeFields,
    pub start_timestamp_utc: DateTime<Utc>,
    /// Calendar bucket derived from the activity's own UTC offset
    pub local_date: NaiveDate,
    pub distance_meters: f64,
    pub elevation_gain_meters: f64,
    pub moving_time_seconds: u64,
}

impl CanonicalActivity {
    pub fn key(&self) -> ActivityKey {
        ActivityKey {
            provider: self.provider,
            source_id: self.source_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_is_case_insensitive() {
        assert_eq!("Strava".parse::<Provider>(), Ok(Provider::Strava));
        assert_eq!(" garmin ".parse::<Provider>(), Ok(Provider::Garmin));
        assert!("polar".parse::<Provider>().is_err());
    }

    #[test]
    fn test_key_display() {
        let key = ActivityKey {
            provider: Provider::Garmin,
            source_id: "42".to_string(),
        };
        assert_eq!(key.to_string(), "garmin:42");
    }
}
