// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync configuration loaded from environment variables.
//!
//! The configuration is an immutable value built once at startup and passed
//! explicitly into every component; nothing reads ambient state after that.

use crate::models::{DistanceUnit, ElevationUnit, Provider, Units};
use crate::services::rate_limit::WindowCap;
use chrono::{Datelike, Months, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Largest page size either provider accepts.
pub const MAX_PER_PAGE: u32 = 200;

/// Longest recent window, in days.
pub const MAX_RECENT_DAYS: u32 = 36_500;

/// Deepest lookback, in years.
pub const MAX_LOOKBACK_YEARS: u32 = 100;

/// Providers filter on epoch seconds; nothing predates this year.
const EARLIEST_START_YEAR: i32 = 1970;

/// Sync configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,
    pub sync: SyncSettings,
    pub types: TypeRules,
    pub units: Units,
    pub rate_limits: RateLimitSettings,
    pub retry: RetrySettings,
    pub paths: PathSettings,
    pub credentials: Credentials,
}

/// Date-range and merge behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub start_date: Option<NaiveDate>,
    pub lookback_years: Option<u32>,
    pub recent_days: u32,
    pub resume_backfill: bool,
    pub prune_deleted: bool,
    /// Clear cursors and outputs for the current provider before running
    pub full_backfill: bool,
    pub per_page: u32,
}

/// Type inclusion, alias and grouping rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRules {
    pub include_all_types: bool,
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
    /// User overrides applied after the built-in provider aliases
    pub aliases: BTreeMap<String, String>,
    pub group_types: bool,
    /// Bucket name -> member types. Empty means built-in buckets.
    pub groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Explicit caps; `None` means the provider's documented defaults
    pub caps: Option<Vec<WindowCap>>,
    /// Longest single wait before a run gives up for this invocation
    pub max_wait: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSettings {
    pub data_dir: PathBuf,
    pub site_data_path: PathBuf,
}

/// Provider credentials. Token acquisition itself happens outside this crate.
#[derive(Clone, Default)]
pub struct Credentials {
    pub strava_access_token: Option<String>,
    pub strava_client_id: Option<String>,
    pub strava_client_secret: Option<String>,
    pub strava_refresh_token: Option<String>,
    pub garmin_access_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("strava_access_token", &self.strava_access_token.is_some())
            .field("strava_client_id", &self.strava_client_id)
            .field("strava_refresh_token", &self.strava_refresh_token.is_some())
            .field("garmin_access_token", &self.garmin_access_token.is_some())
            .finish()
    }
}

impl Default for Config {
    /// Defaults for a Strava sync with no credentials (tests only).
    fn default() -> Self {
        Self {
            provider: Provider::Strava,
            sync: SyncSettings {
                start_date: None,
                lookback_years: None,
                recent_days: 7,
                resume_backfill: true,
                prune_deleted: true,
                full_backfill: false,
                per_page: MAX_PER_PAGE,
            },
            types: TypeRules::default(),
            units: Units::US,
            rate_limits: RateLimitSettings {
                caps: None,
                max_wait: Duration::from_secs(960),
            },
            retry: RetrySettings {
                max_attempts: 4,
                base_delay: Duration::from_millis(1000),
            },
            paths: PathSettings {
                data_dir: PathBuf::from("data"),
                site_data_path: PathBuf::from("site/data.json"),
            },
            credentials: Credentials::default(),
        }
    }
}

impl Default for TypeRules {
    fn default() -> Self {
        Self {
            include_all_types: true,
            include: BTreeSet::new(),
            exclude: BTreeSet::new(),
            aliases: BTreeMap::new(),
            group_types: false,
            groups: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Config::default();

        let provider = match get("SYNC_PROVIDER") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                setting: "SYNC_PROVIDER",
                reason,
            })?,
            None => defaults.provider,
        };

        let sync = SyncSettings {
            start_date: parse_opt(&get, "SYNC_START_DATE")?,
            lookback_years: parse_opt(&get, "SYNC_LOOKBACK_YEARS")?,
            recent_days: parse_opt(&get, "SYNC_RECENT_DAYS")?
                .unwrap_or(defaults.sync.recent_days),
            resume_backfill: parse_bool(&get, "SYNC_RESUME_BACKFILL")?
                .unwrap_or(defaults.sync.resume_backfill),
            prune_deleted: parse_bool(&get, "SYNC_PRUNE_DELETED")?
                .unwrap_or(defaults.sync.prune_deleted),
            full_backfill: parse_bool(&get, "SYNC_FULL_BACKFILL")?
                .unwrap_or(defaults.sync.full_backfill),
            per_page: parse_opt(&get, "SYNC_PER_PAGE")?.unwrap_or(defaults.sync.per_page),
        };

        let types = TypeRules {
            include_all_types: parse_bool(&get, "TYPES_INCLUDE_ALL")?.unwrap_or(true),
            include: parse_list(get("TYPES_INCLUDE")).into_iter().collect(),
            exclude: parse_list(get("TYPES_EXCLUDE")).into_iter().collect(),
            aliases: parse_aliases(get("TYPES_ALIASES"))?,
            group_types: parse_bool(&get, "TYPES_GROUP")?.unwrap_or(false),
            groups: parse_groups(get("TYPES_GROUPS"))?,
        };

        let units = parse_units(&get)?;

        let rate_limits = RateLimitSettings {
            caps: parse_caps(&get)?,
            max_wait: parse_opt(&get, "RATE_LIMIT_MAX_WAIT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limits.max_wait),
        };

        let retry = RetrySettings {
            max_attempts: parse_opt(&get, "RETRY_MAX_ATTEMPTS")?
                .unwrap_or(defaults.retry.max_attempts),
            base_delay: parse_opt(&get, "RETRY_BASE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.base_delay),
        };

        let paths = PathSettings {
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.paths.data_dir),
            site_data_path: get("SITE_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.paths.site_data_path),
        };

        let credentials = Credentials {
            strava_access_token: get("STRAVA_ACCESS_TOKEN"),
            strava_client_id: get("STRAVA_CLIENT_ID"),
            strava_client_secret: get("STRAVA_CLIENT_SECRET"),
            strava_refresh_token: get("STRAVA_REFRESH_TOKEN"),
            garmin_access_token: get("GARMIN_ACCESS_TOKEN"),
        };

        Ok(Self {
            provider,
            sync,
            types,
            units,
            rate_limits,
            retry,
            paths,
            credentials,
        })
    }

    /// Reject contradictory settings before any network call.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ConfigError> {
        let sync = &self.sync;
        if sync.start_date.is_some() && sync.lookback_years.is_some() {
            return Err(ConfigError::Conflict(
                "SYNC_START_DATE",
                "SYNC_LOOKBACK_YEARS",
            ));
        }
        if let Some(start) = sync.start_date {
            if start > today {
                return Err(ConfigError::Invalid {
                    setting: "SYNC_START_DATE",
                    reason: format!("{} is in the future", start),
                });
            }
        }
        if let Some(start) = sync.start_date.filter(|start| start.year() < EARLIEST_START_YEAR) {
            return Err(ConfigError::Invalid {
                setting: "SYNC_START_DATE",
                reason: format!("{} is before {}", start, EARLIEST_START_YEAR),
            });
        }
        if let Some(years) = sync.lookback_years {
            if years == 0 || years > MAX_LOOKBACK_YEARS {
                return Err(ConfigError::Invalid {
                    setting: "SYNC_LOOKBACK_YEARS",
                    reason: format!("must be between 1 and {}", MAX_LOOKBACK_YEARS),
                });
            }
        }
        if sync.recent_days > MAX_RECENT_DAYS {
            return Err(ConfigError::Invalid {
                setting: "SYNC_RECENT_DAYS",
                reason: format!("must be at most {}", MAX_RECENT_DAYS),
            });
        }
        if sync.per_page == 0 || sync.per_page > MAX_PER_PAGE {
            return Err(ConfigError::Invalid {
                setting: "SYNC_PER_PAGE",
                reason: format!("must be between 1 and {}", MAX_PER_PAGE),
            });
        }
        if !self.types.include_all_types && self.types.include.is_empty() {
            return Err(ConfigError::Invalid {
                setting: "TYPES_INCLUDE",
                reason: "must list at least one type when TYPES_INCLUDE_ALL=false".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                setting: "RETRY_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(caps) = &self.rate_limits.caps {
            if caps.iter().any(|cap| cap.limit == 0 || cap.window.is_zero()) {
                return Err(ConfigError::Invalid {
                    setting: "RATE_LIMIT_SHORT",
                    reason: "caps need a non-zero limit and window".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Oldest local date backfill should reach; `None` is unbounded.
    pub fn lower_bound(&self, today: NaiveDate) -> Result<Option<NaiveDate>, ConfigError> {
        if let Some(start) = self.sync.start_date {
            return Ok(Some(start));
        }
        match self.sync.lookback_years {
            None => Ok(None),
            Some(years) => today
                .checked_sub_months(Months::new(years.saturating_mul(12)))
                .map(Some)
                .ok_or_else(|| ConfigError::Invalid {
                    setting: "SYNC_LOOKBACK_YEARS",
                    reason: format!("{} years before {} is out of range", years, today),
                }),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {setting}: {reason}")]
    Invalid {
        setting: &'static str,
        reason: String,
    },

    #[error("{0} and {1} cannot both be set")]
    Conflict(&'static str, &'static str),
}

fn parse_opt<T, G>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                setting: key,
                reason: format!("'{}': {}", raw, e),
            })
        })
        .transpose()
}

fn parse_bool<G>(get: &G, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                setting: key,
                reason: format!("'{}' is not a boolean", raw),
            }),
        })
        .transpose()
}

fn parse_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

/// `From=To,From2=To2`
fn parse_aliases(raw: Option<String>) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut aliases = BTreeMap::new();
    for entry in parse_list(raw) {
        let (from, to) = entry
            .split_once('=')
            .map(|(f, t)| (f.trim(), t.trim()))
            .filter(|(f, t)| !f.is_empty() && !t.is_empty())
            .ok_or_else(|| ConfigError::Invalid {
                setting: "TYPES_ALIASES",
                reason: format!("'{}' is not of the form From=To", entry),
            })?;
        aliases.insert(from.to_string(), to.to_string());
    }
    Ok(aliases)
}

/// `Bucket=A|B;Bucket2=C`
fn parse_groups(raw: Option<String>) -> Result<BTreeMap<String, Vec<String>>, ConfigError> {
    let mut groups = BTreeMap::new();
    let Some(raw) = raw else {
        return Ok(groups);
    };
    for entry in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (bucket, members) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
            setting: "TYPES_GROUPS",
            reason: format!("'{}' is not of the form Bucket=A|B", entry),
        })?;
        let members: Vec<String> = members
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if bucket.trim().is_empty() || members.is_empty() {
            return Err(ConfigError::Invalid {
                setting: "TYPES_GROUPS",
                reason: format!("'{}' needs a bucket name and at least one member", entry),
            });
        }
        groups.insert(bucket.trim().to_string(), members);
    }
    Ok(groups)
}

fn parse_units<G>(get: &G) -> Result<Units, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let mut units = match get("DASHBOARD_UNIT_SYSTEM") {
        Some(name) => Units::preset(&name).ok_or_else(|| ConfigError::Invalid {
            setting: "DASHBOARD_UNIT_SYSTEM",
            reason: format!("unknown preset '{}' (expected us or metric)", name),
        })?,
        None => Units::default(),
    };
    if let Some(distance) = parse_opt::<DistanceUnit, _>(get, "DASHBOARD_DISTANCE_UNIT")? {
        units.distance = distance;
    }
    if let Some(elevation) = parse_opt::<ElevationUnit, _>(get, "DASHBOARD_ELEVATION_UNIT")? {
        units.elevation = elevation;
    }
    Ok(units)
}

/// `RATE_LIMIT_SHORT=<calls>/<seconds>` and `RATE_LIMIT_DAILY=<calls>`.
fn parse_caps<G>(get: &G) -> Result<Option<Vec<WindowCap>>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let short = get("RATE_LIMIT_SHORT")
        .map(|raw| -> Result<WindowCap, ConfigError> {
            let (limit, secs) = raw
                .split_once('/')
                .and_then(|(l, s)| {
                    Some((
                        l.trim().parse::<u32>().ok()?,
                        s.trim().parse::<u64>().ok()?,
                    ))
                })
                .ok_or_else(|| ConfigError::Invalid {
                    setting: "RATE_LIMIT_SHORT",
                    reason: format!("'{}' is not of the form calls/seconds", raw),
                })?;
            Ok(WindowCap::new(limit, Duration::from_secs(secs)))
        })
        .transpose()?;
    let daily = parse_opt::<u32, _>(get, "RATE_LIMIT_DAILY")?.map(WindowCap::daily);

    if short.is_none() && daily.is_none() {
        return Ok(None);
    }
    Ok(Some(short.into_iter().chain(daily).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_defaults_from_empty_env() {
        let config = config_from(&[]).expect("Config should load");

        assert_eq!(config.provider, Provider::Strava);
        assert_eq!(config.sync.recent_days, 7);
        assert!(config.sync.resume_backfill);
        assert!(config.sync.prune_deleted);
        assert!(!config.sync.full_backfill);
        assert_eq!(config.units, Units::US);
        assert!(config.rate_limits.caps.is_none());
        assert!(config.validate(today()).is_ok());
    }

    #[test]
    fn test_full_config() {
        let config = config_from(&[
            ("SYNC_PROVIDER", "garmin"),
            ("SYNC_LOOKBACK_YEARS", "2"),
            ("SYNC_RECENT_DAYS", "14"),
            ("SYNC_PRUNE_DELETED", "false"),
            ("TYPES_INCLUDE_ALL", "false"),
            ("TYPES_INCLUDE", "Run, Ride"),
            ("TYPES_ALIASES", "Walk=Hike"),
            ("TYPES_GROUP", "true"),
            ("TYPES_GROUPS", "Cycling=Ride|VirtualRide;Running=Run"),
            ("DASHBOARD_UNIT_SYSTEM", "metric"),
            ("DASHBOARD_ELEVATION_UNIT", "ft"),
            ("RATE_LIMIT_SHORT", "50/600"),
            ("RATE_LIMIT_DAILY", "500"),
            ("GARMIN_ACCESS_TOKEN", "token"),
        ])
        .expect("Config should load");

        assert_eq!(config.provider, Provider::Garmin);
        assert_eq!(config.sync.lookback_years, Some(2));
        assert_eq!(config.sync.recent_days, 14);
        assert!(!config.sync.prune_deleted);
        assert!(config.types.include.contains("Ride"));
        assert_eq!(config.types.aliases.get("Walk").map(String::as_str), Some("Hike"));
        assert_eq!(config.types.groups["Cycling"], vec!["Ride", "VirtualRide"]);
        assert_eq!(config.units.distance, DistanceUnit::Km);
        assert_eq!(config.units.elevation, ElevationUnit::Ft);
        let caps = config.rate_limits.caps.as_ref().unwrap();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0], WindowCap::new(50, Duration::from_secs(600)));
        assert_eq!(config.lower_bound(today()).unwrap(), NaiveDate::from_ymd_opt(2022, 6, 1));
        assert!(config.validate(today()).is_ok());
    }

    #[test]
    fn test_start_date_and_lookback_conflict() {
        let config = config_from(&[
            ("SYNC_START_DATE", "2020-01-01"),
            ("SYNC_LOOKBACK_YEARS", "3"),
        ])
        .unwrap();
        let err = config.validate(today()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Conflict("SYNC_START_DATE", "SYNC_LOOKBACK_YEARS")
        ));
    }

    #[test]
    fn test_future_start_date_rejected() {
        let config = config_from(&[("SYNC_START_DATE", "2030-01-01")]).unwrap();
        let err = config.validate(today()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                setting: "SYNC_START_DATE",
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_range_windows_rejected() {
        let config = config_from(&[("SYNC_RECENT_DAYS", "100000000")]).unwrap();
        let err = config.validate(today()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                setting: "SYNC_RECENT_DAYS",
                ..
            }
        ));

        let config = config_from(&[("SYNC_LOOKBACK_YEARS", "4000000")]).unwrap();
        let err = config.validate(today()).unwrap_err();
        assert!(err.to_string().contains("SYNC_LOOKBACK_YEARS"));
        assert!(config.lower_bound(today()).is_err());

        let config = config_from(&[("SYNC_START_DATE", "1900-01-01")]).unwrap();
        let err = config.validate(today()).unwrap_err();
        assert!(err.to_string().contains("SYNC_START_DATE"));
    }

    #[test]
    fn test_malformed_values_name_the_setting() {
        let err = config_from(&[("SYNC_RECENT_DAYS", "week")]).unwrap_err();
        assert!(err.to_string().contains("SYNC_RECENT_DAYS"));

        let err = config_from(&[("TYPES_ALIASES", "Walk")]).unwrap_err();
        assert!(err.to_string().contains("TYPES_ALIASES"));

        let err = config_from(&[("DASHBOARD_DISTANCE_UNIT", "furlong")]).unwrap_err();
        assert!(err.to_string().contains("DASHBOARD_DISTANCE_UNIT"));

        let err = config_from(&[("SYNC_PROVIDER", "polar")]).unwrap_err();
        assert!(err.to_string().contains("SYNC_PROVIDER"));
    }

    #[test]
    fn test_include_only_requires_types() {
        let config = config_from(&[("TYPES_INCLUDE_ALL", "false")]).unwrap();
        assert!(config.validate(today()).is_err());
    }

    #[test]
    fn test_credentials_debug_hides_tokens() {
        let config = config_from(&[("STRAVA_ACCESS_TOKEN", "secret-value")]).unwrap();
        let debug = format!("{:?}", config.credentials);
        assert!(!debug.contains("secret-value"));
    }
}
