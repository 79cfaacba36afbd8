// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use heatmap_sync::config::Config;
use heatmap_sync::db::artifacts;
use heatmap_sync::error::{Result, SyncError};
use heatmap_sync::models::{CanonicalActivity, CursorSet, DailyAggregate, DashboardData, Provider};
use heatmap_sync::services::{ActivitySource, Page, PageRequest};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::time::Duration as StdDuration;

/// Fixed "now" used by most scenarios.
#[allow(dead_code)]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap()
}

/// Config writing into `dir`, with no rate limits and no retry delay.
#[allow(dead_code)]
pub fn test_config(dir: &Path, provider: Provider) -> Config {
    let mut config = Config::default();
    config.provider = provider;
    config.paths.data_dir = dir.join("data");
    config.paths.site_data_path = dir.join("site").join("data.json");
    config.rate_limits.caps = Some(Vec::new());
    config.retry.base_delay = StdDuration::ZERO;
    config.sync.per_page = 50;
    config
}

/// One activity as the provider stores it.
#[derive(Debug, Clone)]
pub struct UpstreamRecord {
    pub id: u64,
    pub start: DateTime<Utc>,
    pub json: Value,
}

fn wall_clock(local: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S").unwrap()
}

/// Strava summary activity starting at `local` wall-clock time in a zone
/// `offset_hours` from UTC.
#[allow(dead_code)]
pub fn strava_activity(
    id: u64,
    sport_type: &str,
    local: &str,
    offset_hours: i64,
    distance: f64,
) -> UpstreamRecord {
    let local_time = wall_clock(local);
    let start = (local_time - Duration::hours(offset_hours)).and_utc();
    UpstreamRecord {
        id,
        start,
        json: json!({
            "id": id,
            "name": format!("Activity {}", id),
            "sport_type": sport_type,
            "type": sport_type,
            "start_date": start.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            "start_date_local": format!("{}Z", local),
            "utc_offset": (offset_hours * 3600) as f64,
            "distance": distance,
            "total_elevation_gain": 12.0,
            "moving_time": 1800,
        }),
    }
}

/// Garmin activity starting at `local` in a zone `offset_hours` from UTC.
#[allow(dead_code)]
pub fn garmin_activity(
    id: u64,
    type_key: &str,
    local: &str,
    offset_hours: i64,
    distance: f64,
) -> UpstreamRecord {
    let local_time = wall_clock(local);
    let start = (local_time - Duration::hours(offset_hours)).and_utc();
    UpstreamRecord {
        id,
        start,
        json: json!({
            "activityId": id,
            "activityName": format!("Activity {}", id),
            "activityType": { "typeKey": type_key, "parentTypeId": 1 },
            "startTimeGMT": start.format("%Y-%m-%d %H:%M:%S").to_string(),
            "startTimeLocal": local_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            "distance": distance,
            "elevationGain": 3.0,
            "movingDuration": 1500.4,
            "duration": 1600.0,
        }),
    }
}

/// A record missing every required field except its timestamp.
#[allow(dead_code)]
pub fn malformed_activity(id: u64, start: DateTime<Utc>) -> UpstreamRecord {
    UpstreamRecord {
        id,
        start,
        json: json!({ "name": "no id or start" }),
    }
}

/// In-memory provider that pages inside `(after, before)`.
///
/// Pages are newest-first unless `oldest_first_when_bounded` is set, in
/// which case any request carrying `after` is answered oldest-first.
pub struct FakeProvider {
    provider: Provider,
    account: Option<String>,
    records: RefCell<Vec<UpstreamRecord>>,
    calls: Cell<u32>,
    reject_token: Cell<bool>,
    oldest_first_when_bounded: bool,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new(provider: Provider, records: Vec<UpstreamRecord>) -> Self {
        Self {
            provider,
            account: Some("athlete-1".to_string()),
            records: RefCell::new(records),
            calls: Cell::new(0),
            reject_token: Cell::new(false),
            oldest_first_when_bounded: false,
        }
    }

    pub fn oldest_first_when_bounded(mut self) -> Self {
        self.oldest_first_when_bounded = true;
        self
    }

    pub fn with_account(mut self, account: &str) -> Self {
        self.account = Some(account.to_string());
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    pub fn reject_token(&self) {
        self.reject_token.set(true);
    }

    pub fn remove(&self, id: u64) {
        self.records.borrow_mut().retain(|r| r.id != id);
    }

    pub fn upsert(&self, record: UpstreamRecord) {
        let mut records = self.records.borrow_mut();
        records.retain(|r| r.id != record.id);
        records.push(record);
    }
}

impl ActivitySource for FakeProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn account_id(&self) -> Result<Option<String>> {
        if self.reject_token.get() {
            return Err(SyncError::Auth(SyncError::TOKEN_REJECTED.to_string()));
        }
        Ok(self.account.clone())
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        self.calls.set(self.calls.get() + 1);
        if self.reject_token.get() {
            return Err(SyncError::Auth(SyncError::TOKEN_REJECTED.to_string()));
        }

        let mut visible: Vec<UpstreamRecord> = self
            .records
            .borrow()
            .iter()
            .filter(|r| request.window.after.map_or(true, |after| r.start > after))
            .filter(|r| request.window.before.map_or(true, |before| r.start < before))
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.start.cmp(&a.start).then(b.id.cmp(&a.id)));
        if self.oldest_first_when_bounded && request.window.after.is_some() {
            visible.reverse();
        }

        let page: usize = request.token.as_deref().map_or(1, |t| t.parse().unwrap());
        let per_page = request.per_page as usize;
        let records: Vec<Value> = visible
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .map(|r| r.json)
            .collect();
        let next_token = (records.len() == per_page).then(|| (page + 1).to_string());

        Ok(Page {
            records,
            next_token,
            reported_usage: None,
        })
    }
}

// ─── Artifact readers ────────────────────────────────────────────

#[allow(dead_code)]
pub fn read_history(dir: &Path) -> Vec<CanonicalActivity> {
    read_json(&dir.join("data").join(artifacts::ACTIVITIES))
}

#[allow(dead_code)]
pub fn read_cursors(dir: &Path) -> CursorSet {
    read_json(&dir.join("data").join(artifacts::BACKFILL_STATE))
}

#[allow(dead_code)]
pub fn read_daily(dir: &Path) -> Vec<DailyAggregate> {
    read_json(&dir.join("data").join(artifacts::DAILY))
}

#[allow(dead_code)]
pub fn read_dashboard(dir: &Path) -> DashboardData {
    read_json(&dir.join("site").join("data.json"))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let bytes = std::fs::read(path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e));
    serde_json::from_slice(&bytes).unwrap()
}
