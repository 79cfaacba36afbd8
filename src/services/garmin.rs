// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Garmin Connect activity list client.

use crate::config::{ConfigError, Credentials};
use crate::error::{Result, SyncError};
use crate::models::Provider;
use crate::services::fetcher::{parse_numeric_token, ActivitySource, Page, PageRequest};
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://connectapi.garmin.com";

/// Garmin Connect API client.
#[derive(Clone)]
pub struct GarminClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for GarminClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GarminClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Search activities by offset. The date filter is by calendar day, so a
    /// page may include records slightly outside the instant window.
    pub async fn search_activities(&self, access_token: &str, request: &PageRequest) -> Result<Page> {
        let url = format!(
            "{}/activitylist-service/activities/search/activities",
            self.base_url
        );
        let start = parse_numeric_token(request.token.as_deref(), 0)?;

        let mut query = vec![
            ("start", start.to_string()),
            ("limit", request.per_page.to_string()),
        ];
        if let Some(after) = request.window.after {
            query.push(("startDate", after.date_naive().to_string()));
        }
        if let Some(before) = request.window.before {
            query.push(("endDate", before.date_naive().to_string()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;

        let records: Vec<serde_json::Value> = check_response_json(response).await?;
        let next_token = if (records.len() as u32) < request.per_page {
            None
        } else {
            Some((start + records.len() as u32).to_string())
        };

        Ok(Page {
            records,
            next_token,
            reported_usage: None,
        })
    }

    pub async fn get_social_profile(&self, access_token: &str) -> Result<GarminProfile> {
        let url = format!("{}/userprofile-service/socialProfile", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        check_response_json(response).await
    }
}

async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(match status.as_u16() {
            401 | 403 => SyncError::Auth(SyncError::TOKEN_REJECTED.to_string()),
            429 => SyncError::Transient(SyncError::RATE_LIMITED.to_string()),
            _ if status.is_server_error() => {
                SyncError::Transient(format!("HTTP {}: {}", status, body))
            }
            _ => SyncError::ProviderApi(format!("HTTP {}: {}", status, body)),
        });
    }

    response
        .json()
        .await
        .map_err(|e| SyncError::Transient(format!("JSON parse error: {}", e)))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarminProfile {
    pub profile_id: u64,
}

/// Activity type block of a Garmin activity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarminActivityType {
    #[serde(default)]
    pub type_key: Option<String>,
    #[serde(default)]
    pub parent_type_id: Option<u32>,
}

/// Activity entry from the search endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarminActivity {
    pub activity_id: u64,
    #[serde(default)]
    pub activity_type: Option<GarminActivityType>,
    #[serde(rename = "startTimeGMT")]
    pub start_time_gmt: String,
    /// `"YYYY-MM-DD HH:MM:SS"` in the activity's own zone
    #[serde(default)]
    pub start_time_local: Option<String>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub elevation_gain: Option<f64>,
    #[serde(default)]
    pub moving_duration: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Garmin activity source bound to one access token.
#[derive(Clone)]
pub struct GarminService {
    client: GarminClient,
    access_token: String,
}

impl GarminService {
    pub fn new(client: GarminClient, access_token: String) -> Self {
        Self {
            client,
            access_token,
        }
    }

    pub fn connect(client: GarminClient, credentials: &Credentials) -> Result<Self> {
        let token = credentials
            .garmin_access_token
            .clone()
            .ok_or(ConfigError::Missing("GARMIN_ACCESS_TOKEN"))?;
        Ok(Self::new(client, token))
    }
}

impl ActivitySource for GarminService {
    fn provider(&self) -> Provider {
        Provider::Garmin
    }

    async fn account_id(&self) -> Result<Option<String>> {
        let profile = self.client.get_social_profile(&self.access_token).await?;
        Ok(Some(profile.profile_id.to_string()))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        self.client
            .search_activities(&self.access_token, request)
            .await
    }
}
