// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider record normalization.
//!
//! Each provider's raw record is parsed into its own typed struct and then
//! mapped by one pure function into [`CanonicalActivity`]. Type resolution
//! order:
//! 1. provider fine-grained type field
//! 2. provider coarse/legacy type field
//! 3. built-in provider alias table
//! 4. user alias overrides
//! 5. grouping into buckets (when enabled)

use crate::config::TypeRules;
use crate::models::{CanonicalActivity, Provider, RawTypeFields};
use crate::services::garmin::GarminActivity;
use crate::services::strava::StravaActivitySummary;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Garmin type keys that need more than snake_case → CamelCase.
const GARMIN_ALIASES: &[(&str, &str)] = &[
    ("running", "Run"),
    ("street_running", "Run"),
    ("track_running", "Run"),
    ("treadmill_running", "Run"),
    ("trail_running", "TrailRun"),
    ("virtual_run", "VirtualRun"),
    ("cycling", "Ride"),
    ("road_biking", "Ride"),
    ("mountain_biking", "MountainBikeRide"),
    ("gravel_cycling", "GravelRide"),
    ("indoor_cycling", "VirtualRide"),
    ("virtual_ride", "VirtualRide"),
    ("e_bike_fitness", "EBikeRide"),
    ("e_bike_mountain", "EMountainBikeRide"),
    ("walking", "Walk"),
    ("casual_walking", "Walk"),
    ("speed_walking", "Walk"),
    ("hiking", "Hike"),
    ("swimming", "Swim"),
    ("lap_swimming", "Swim"),
    ("open_water_swimming", "Swim"),
    ("strength_training", "WeightTraining"),
    ("indoor_rowing", "Rowing"),
    ("rowing", "Rowing"),
    ("resort_skiing_snowboarding", "AlpineSki"),
    ("resort_skiing", "AlpineSki"),
    ("backcountry_skiing", "BackcountrySki"),
    ("cross_country_skiing", "NordicSki"),
    ("skate_skiing", "NordicSki"),
    ("stand_up_paddleboarding", "StandUpPaddling"),
    ("elliptical", "Elliptical"),
    ("yoga", "Yoga"),
    ("other", "Workout"),
];

/// Garmin `parentTypeId` → coarse type key.
const GARMIN_PARENT_TYPES: &[(u32, &str)] = &[
    (1, "running"),
    (2, "cycling"),
    (3, "hiking"),
    (4, "other"),
    (9, "walking"),
    (26, "swimming"),
];

/// Buckets used when grouping is on and no groups are configured.
const DEFAULT_GROUPS: &[(&str, &[&str])] = &[
    (
        "Ride",
        &[
            "Ride",
            "VirtualRide",
            "GravelRide",
            "MountainBikeRide",
            "EBikeRide",
            "EMountainBikeRide",
            "Velomobile",
            "Handcycle",
        ],
    ),
    ("Run", &["Run", "TrailRun", "VirtualRun"]),
    ("Walk", &["Walk", "Hike"]),
    ("Swim", &["Swim"]),
    (
        "WinterSport",
        &[
            "AlpineSki",
            "BackcountrySki",
            "NordicSki",
            "Snowboard",
            "Snowshoe",
            "IceSkate",
        ],
    ),
    (
        "Workout",
        &[
            "Workout",
            "WeightTraining",
            "Crossfit",
            "Elliptical",
            "StairStepper",
            "Yoga",
            "Pilates",
            "HighIntensityIntervalTraining",
        ],
    ),
];

/// Per-record data errors. The record is skipped and counted.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NormalizeError {
    #[error("Malformed {provider} record: {reason}")]
    Malformed { provider: Provider, reason: String },

    #[error("Record {id} has no type field")]
    MissingType { id: String },

    #[error("Record {id} has an invalid timestamp: {value}")]
    InvalidTimestamp { id: String, value: String },
}

/// A provider-native record, one variant per provider schema.
#[derive(Debug, Clone)]
pub enum RawActivity {
    Strava(StravaActivitySummary),
    Garmin(GarminActivity),
}

impl RawActivity {
    /// Parse a JSON record in the given provider's schema.
    pub fn parse(provider: Provider, value: &serde_json::Value) -> Result<Self, NormalizeError> {
        let malformed = |e: serde_json::Error| NormalizeError::Malformed {
            provider,
            reason: e.to_string(),
        };
        match provider {
            Provider::Strava => StravaActivitySummary::deserialize(value)
                .map(RawActivity::Strava)
                .map_err(malformed),
            Provider::Garmin => GarminActivity::deserialize(value)
                .map(RawActivity::Garmin)
                .map_err(malformed),
        }
    }
}

/// Resolves raw type signals into canonical type names.
#[derive(Debug, Clone)]
pub struct TypeResolver {
    aliases: BTreeMap<String, String>,
    /// member type -> bucket, only populated when grouping is on
    buckets: BTreeMap<String, String>,
}

impl TypeResolver {
    pub fn new(rules: &TypeRules) -> Self {
        let mut buckets = BTreeMap::new();
        if rules.group_types {
            if rules.groups.is_empty() {
                for (bucket, members) in DEFAULT_GROUPS {
                    for member in *members {
                        buckets.insert(member.to_string(), bucket.to_string());
                    }
                }
            } else {
                for (bucket, members) in &rules.groups {
                    for member in members {
                        buckets.insert(member.clone(), bucket.clone());
                    }
                }
            }
        }
        Self {
            aliases: rules.aliases.clone(),
            buckets,
        }
    }

    /// Resolve a type, or `None` if neither raw field carries one.
    pub fn resolve(&self, provider: Provider, raw: &RawTypeFields) -> Option<String> {
        let signal = raw
            .primary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| raw.fallback.as_deref().filter(|s| !s.trim().is_empty()))?
            .trim();

        let name = provider_alias(provider, signal);
        let name = self.aliases.get(&name).cloned().unwrap_or(name);
        Some(self.buckets.get(&name).cloned().unwrap_or(name))
    }
}

fn provider_alias(provider: Provider, signal: &str) -> String {
    match provider {
        // Strava's sport types are the canonical vocabulary.
        Provider::Strava => signal.to_string(),
        Provider::Garmin => {
            let key = signal.to_ascii_lowercase();
            GARMIN_ALIASES
                .iter()
                .find(|(from, _)| *from == key)
                .map(|(_, to)| to.to_string())
                .unwrap_or_else(|| camel_case(&key))
        }
    }
}

/// `stand_up_paddleboarding` → `StandUpPaddleboarding`
fn camel_case(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Result of normalizing one page.
#[derive(Debug, Default)]
pub struct NormalizedPage {
    pub activities: Vec<CanonicalActivity>,
    pub skipped: u32,
}

/// Pure mapping from provider records to canonical activities.
#[derive(Debug, Clone)]
pub struct Normalizer {
    resolver: TypeResolver,
}

impl Normalizer {
    pub fn new(rules: &TypeRules) -> Self {
        Self {
            resolver: TypeResolver::new(rules),
        }
    }

    /// Normalize one JSON record in the given provider's schema.
    pub fn normalize(
        &self,
        provider: Provider,
        value: &serde_json::Value,
    ) -> Result<CanonicalActivity, NormalizeError> {
        match RawActivity::parse(provider, value)? {
            RawActivity::Strava(raw) => self.normalize_strava(&raw),
            RawActivity::Garmin(raw) => self.normalize_garmin(&raw),
        }
    }

    /// Normalize a page, skipping and counting malformed records.
    pub fn normalize_page(&self, provider: Provider, records: &[serde_json::Value]) -> NormalizedPage {
        let mut page = NormalizedPage::default();
        for record in records {
            match self.normalize(provider, record) {
                Ok(activity) => page.activities.push(activity),
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "Skipping record");
                    page.skipped += 1;
                }
            }
        }
        page
    }

    /// Re-resolve the canonical type from retained raw fields.
    pub fn renormalize(&self, activity: &CanonicalActivity) -> CanonicalActivity {
        let mut updated = activity.clone();
        if let Some(resolved) = self
            .resolver
            .resolve(activity.provider, &activity.raw_type_fields)
        {
            updated.canonical_type = resolved;
        }
        updated
    }

    fn normalize_strava(
        &self,
        raw: &StravaActivitySummary,
    ) -> Result<CanonicalActivity, NormalizeError> {
        let id = raw.id.to_string();
        let raw_type_fields = RawTypeFields {
            primary: raw.sport_type.clone(),
            fallback: raw.activity_type.clone(),
        };
        let canonical_type = self
            .resolver
            .resolve(Provider::Strava, &raw_type_fields)
            .ok_or_else(|| NormalizeError::MissingType { id: id.clone() })?;

        let start = DateTime::parse_from_rfc3339(&raw.start_date)
            .map_err(|_| NormalizeError::InvalidTimestamp {
                id: id.clone(),
                value: raw.start_date.clone(),
            })?
            .with_timezone(&Utc);

        // Strava renders local wall-clock time with a misleading `Z` suffix.
        let local_date = match raw.start_date_local.as_deref() {
            Some(local) => parse_wall_clock(local)
                .ok_or_else(|| NormalizeError::InvalidTimestamp {
                    id: id.clone(),
                    value: local.to_string(),
                })?
                .date(),
            None => local_date_from_offset(start, raw.utc_offset),
        };

        Ok(CanonicalActivity {
            source_id: id,
            provider: Provider::Strava,
            canonical_type,
            raw_type_fields,
            start_timestamp_utc: start,
            local_date,
            distance_meters: non_negative(raw.distance),
            elevation_gain_meters: non_negative(raw.total_elevation_gain),
            moving_time_seconds: raw.moving_time.unwrap_or(0),
        })
    }

    fn normalize_garmin(&self, raw: &GarminActivity) -> Result<CanonicalActivity, NormalizeError> {
        let id = raw.activity_id.to_string();
        let activity_type = raw.activity_type.as_ref();
        let raw_type_fields = RawTypeFields {
            primary: activity_type.and_then(|t| t.type_key.clone()),
            fallback: activity_type
                .and_then(|t| t.parent_type_id)
                .and_then(|parent| {
                    GARMIN_PARENT_TYPES
                        .iter()
                        .find(|(type_id, _)| *type_id == parent)
                        .map(|(_, key)| key.to_string())
                }),
        };
        let canonical_type = self
            .resolver
            .resolve(Provider::Garmin, &raw_type_fields)
            .ok_or_else(|| NormalizeError::MissingType { id: id.clone() })?;

        let start = parse_wall_clock(&raw.start_time_gmt)
            .ok_or_else(|| NormalizeError::InvalidTimestamp {
                id: id.clone(),
                value: raw.start_time_gmt.clone(),
            })?
            .and_utc();

        let local_date = match raw.start_time_local.as_deref() {
            Some(local) => parse_wall_clock(local)
                .ok_or_else(|| NormalizeError::InvalidTimestamp {
                    id: id.clone(),
                    value: local.to_string(),
                })?
                .date(),
            None => start.date_naive(),
        };

        let moving = raw.moving_duration.or(raw.duration).unwrap_or(0.0);

        Ok(CanonicalActivity {
            source_id: id,
            provider: Provider::Garmin,
            canonical_type,
            raw_type_fields,
            start_timestamp_utc: start,
            local_date,
            distance_meters: non_negative(raw.distance),
            elevation_gain_meters: non_negative(raw.elevation_gain),
            moving_time_seconds: if moving.is_finite() && moving > 0.0 {
                moving.round() as u64
            } else {
                0
            },
        })
    }
}

/// Parse a timestamp as wall-clock time, ignoring any zone designator.
fn parse_wall_clock(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim().trim_end_matches('Z');
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

fn local_date_from_offset(start: DateTime<Utc>, utc_offset: Option<f64>) -> NaiveDate {
    match utc_offset {
        Some(offset) if offset.is_finite() => {
            (start + Duration::seconds(offset.round() as i64)).date_naive()
        }
        _ => start.date_naive(),
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::new(&TypeRules::default())
    }

    fn strava_run() -> serde_json::Value {
        json!({
            "id": 101,
            "name": "Morning Run",
            "sport_type": "TrailRun",
            "type": "Run",
            "start_date": "2024-01-05T23:30:00Z",
            "start_date_local": "2024-01-05T15:30:00Z",
            "utc_offset": -28800.0,
            "distance": 5000.0,
            "total_elevation_gain": 120.5,
            "moving_time": 1800
        })
    }

    #[test]
    fn test_strava_record_normalizes() {
        let activity = normalizer().normalize(Provider::Strava, &strava_run()).unwrap();

        assert_eq!(activity.source_id, "101");
        assert_eq!(activity.canonical_type, "TrailRun");
        assert_eq!(activity.raw_type_fields.fallback.as_deref(), Some("Run"));
        assert_eq!(activity.local_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(activity.distance_meters, 5000.0);
        assert_eq!(activity.moving_time_seconds, 1800);
    }

    #[test]
    fn test_local_date_uses_activity_offset_not_utc() {
        let mut record = strava_run();
        record["start_date"] = json!("2024-01-06T02:00:00Z");
        record.as_object_mut().unwrap().remove("start_date_local");

        let activity = normalizer().normalize(Provider::Strava, &record).unwrap();
        // 02:00 UTC at UTC-8 is still the 5th locally.
        assert_eq!(activity.local_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn test_legacy_type_is_fallback() {
        let mut record = strava_run();
        record.as_object_mut().unwrap().remove("sport_type");
        let activity = normalizer().normalize(Provider::Strava, &record).unwrap();
        assert_eq!(activity.canonical_type, "Run");
    }

    #[test]
    fn test_missing_type_is_data_error() {
        let mut record = strava_run();
        let obj = record.as_object_mut().unwrap();
        obj.remove("sport_type");
        obj.remove("type");
        let err = normalizer().normalize(Provider::Strava, &record).unwrap_err();
        assert_eq!(err, NormalizeError::MissingType { id: "101".to_string() });
    }

    #[test]
    fn test_garmin_record_converges_on_strava_names() {
        let record = json!({
            "activityId": 9001,
            "activityType": { "typeKey": "road_biking", "parentTypeId": 2 },
            "startTimeGMT": "2024-02-10 16:00:00",
            "startTimeLocal": "2024-02-10 08:00:00",
            "distance": 42195.0,
            "elevationGain": 300.0,
            "movingDuration": 5400.4
        });
        let activity = normalizer().normalize(Provider::Garmin, &record).unwrap();

        assert_eq!(activity.provider, Provider::Garmin);
        assert_eq!(activity.canonical_type, "Ride");
        assert_eq!(activity.moving_time_seconds, 5400);
        assert_eq!(activity.local_date, NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
    }

    #[test]
    fn test_garmin_unknown_key_is_camel_cased() {
        let record = json!({
            "activityId": 9002,
            "activityType": { "typeKey": "kite_boarding" },
            "startTimeGMT": "2024-02-10 16:00:00"
        });
        let activity = normalizer().normalize(Provider::Garmin, &record).unwrap();
        assert_eq!(activity.canonical_type, "KiteBoarding");
    }

    #[test]
    fn test_garmin_parent_type_fallback() {
        let record = json!({
            "activityId": 9003,
            "activityType": { "parentTypeId": 1 },
            "startTimeGMT": "2024-02-10 16:00:00"
        });
        let activity = normalizer().normalize(Provider::Garmin, &record).unwrap();
        assert_eq!(activity.canonical_type, "Run");
    }

    #[test]
    fn test_user_alias_then_group() {
        let mut rules = TypeRules::default();
        rules.aliases.insert("Walk".to_string(), "Hike".to_string());
        rules.group_types = true;
        rules
            .groups
            .insert("OnFoot".to_string(), vec!["Hike".to_string(), "Run".to_string()]);
        let resolver = TypeResolver::new(&rules);

        let walk = RawTypeFields {
            primary: Some("Walk".to_string()),
            fallback: None,
        };
        assert_eq!(resolver.resolve(Provider::Strava, &walk).as_deref(), Some("OnFoot"));

        let ride = RawTypeFields {
            primary: Some("Ride".to_string()),
            fallback: None,
        };
        assert_eq!(resolver.resolve(Provider::Strava, &ride).as_deref(), Some("Ride"));
    }

    #[test]
    fn test_default_groups_when_none_configured() {
        let rules = TypeRules {
            group_types: true,
            ..TypeRules::default()
        };
        let resolver = TypeResolver::new(&rules);
        let virtual_ride = RawTypeFields {
            primary: Some("VirtualRide".to_string()),
            fallback: None,
        };
        assert_eq!(
            resolver.resolve(Provider::Strava, &virtual_ride).as_deref(),
            Some("Ride")
        );
    }

    #[test]
    fn test_normalize_page_counts_skips() {
        let records = vec![strava_run(), json!({"id": "not-a-number"}), json!(42)];
        let page = normalizer().normalize_page(Provider::Strava, &records);
        assert_eq!(page.activities.len(), 1);
        assert_eq!(page.skipped, 2);
    }

    #[test]
    fn test_normalization_is_pure() {
        let n = normalizer();
        let a = n.normalize(Provider::Strava, &strava_run()).unwrap();
        let b = n.normalize(Provider::Strava, &strava_run()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_renormalize_applies_new_rules() {
        let activity = normalizer().normalize(Provider::Strava, &strava_run()).unwrap();
        let mut rules = TypeRules::default();
        rules.aliases.insert("TrailRun".to_string(), "Run".to_string());

        let updated = Normalizer::new(&rules).renormalize(&activity);
        assert_eq!(updated.canonical_type, "Run");
        assert_eq!(updated.distance_meters, activity.distance_meters);
    }

    #[test]
    fn test_negative_measures_clamp_to_zero() {
        let mut record = strava_run();
        record["distance"] = json!(-5.0);
        let activity = normalizer().normalize(Provider::Strava, &record).unwrap();
        assert_eq!(activity.distance_meters, 0.0);
    }
}
