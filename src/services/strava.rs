// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for paging through athlete activities.
//!
//! Handles:
//! - Newest-first activity listing (`before` + page number)
//! - Athlete lookup for the source fingerprint
//! - One-shot refresh-token exchange when no access token is supplied
//! - Rate limit detection and usage header parsing

use crate::config::Credentials;
use crate::error::{Result, SyncError};
use crate::models::Provider;
use crate::services::fetcher::{parse_numeric_token, ActivitySource, Page, PageRequest};
use reqwest::header::HeaderMap;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://www.strava.com/api/v3";
const DEFAULT_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
}

impl Default for StravaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StravaClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_TOKEN_URL)
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url(base_url: &str, token_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
        }
    }

    /// List one page of activities below the window's upper bound, newest first.
    pub async fn list_activities(
        &self,
        access_token: &str,
        request: &PageRequest,
    ) -> Result<Page> {
        let url = format!("{}/athlete/activities", self.base_url);
        let page = parse_numeric_token(request.token.as_deref(), 1)?;

        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", request.per_page.to_string()),
        ];
        // Strava lists oldest-first whenever `after` is sent, so the lower
        // edge is left to the caller.
        if let Some(before) = request.window.before {
            query.push(("before", before.timestamp().to_string()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let reported_usage = parse_usage(response.headers());
        let records: Vec<serde_json::Value> = check_response_json(response).await?;
        let next_token = if (records.len() as u32) < request.per_page {
            None
        } else {
            Some((page + 1).to_string())
        };

        Ok(Page {
            records,
            next_token,
            reported_usage,
        })
    }

    /// Get the authenticated athlete profile.
    pub async fn get_athlete(&self, access_token: &str) -> Result<StravaAthlete> {
        let url = format!("{}/athlete", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_transport_error)?;
        check_response_json(response).await
    }

    /// Exchange a refresh token for a fresh access token.
    pub async fn refresh_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Transient(format!("Token refresh request failed: {}", e)))?;

        // Strava answers a revoked refresh token with 400 invalid_grant.
        if response.status().as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!(
                "Strava rejected the refresh token ({}); re-run the OAuth setup",
                body.trim()
            )));
        }

        check_response_json(response).await
    }
}

/// Map reqwest transport failures: everything short of a response is transient.
fn map_transport_error(e: reqwest::Error) -> SyncError {
    SyncError::Transient(e.to_string())
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
            return Err(SyncError::Transient(SyncError::RATE_LIMITED.to_string()));
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(SyncError::Auth(SyncError::TOKEN_REJECTED.to_string()));
        }
        if status.is_server_error() {
            return Err(SyncError::Transient(format!("HTTP {}: {}", status, body)));
        }
        return Err(SyncError::ProviderApi(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| SyncError::Transient(format!("JSON parse error: {}", e)))
}

/// Parse `X-ReadRateLimit-Usage` (preferred) or `X-RateLimit-Usage`: `"short,daily"`.
fn parse_usage(headers: &HeaderMap) -> Option<Vec<u32>> {
    let value = headers
        .get("x-readratelimit-usage")
        .or_else(|| headers.get("x-ratelimit-usage"))?
        .to_str()
        .ok()?;
    value
        .split(',')
        .map(|part| part.trim().parse().ok())
        .collect()
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Athlete profile; only the id is used.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
}

/// Summary activity from the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub sport_type: Option<String>,
    /// Legacy coarse type
    #[serde(default, rename = "type")]
    pub activity_type: Option<String>,
    pub start_date: String,
    #[serde(default)]
    pub start_date_local: Option<String>,
    #[serde(default)]
    pub utc_offset: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub total_elevation_gain: Option<f64>,
    #[serde(default)]
    pub moving_time: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - ActivitySource bound to one access token
// ─────────────────────────────────────────────────────────────────────────────

/// Strava activity source for one authenticated athlete.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    access_token: String,
}

impl StravaService {
    pub fn new(client: StravaClient, access_token: String) -> Self {
        Self {
            client,
            access_token,
        }
    }

    /// Build a source from credentials, refreshing the token if needed.
    ///
    /// An explicit access token wins; otherwise client id, secret and
    /// refresh token must all be present.
    pub async fn connect(client: StravaClient, credentials: &Credentials) -> Result<Self> {
        if let Some(token) = &credentials.strava_access_token {
            return Ok(Self::new(client, token.clone()));
        }

        let client_id = credentials
            .strava_client_id
            .as_deref()
            .ok_or(crate::config::ConfigError::Missing("STRAVA_CLIENT_ID"))?;
        let client_secret = credentials
            .strava_client_secret
            .as_deref()
            .ok_or(crate::config::ConfigError::Missing("STRAVA_CLIENT_SECRET"))?;
        let refresh_token = credentials
            .strava_refresh_token
            .as_deref()
            .ok_or(crate::config::ConfigError::Missing("STRAVA_REFRESH_TOKEN"))?;

        let tokens = client
            .refresh_token(client_id, client_secret, refresh_token)
            .await?;

        if tokens.refresh_token != refresh_token {
            // The secret store is external; surface rotation so it can be updated.
            tracing::warn!("Strava rotated the refresh token; update STRAVA_REFRESH_TOKEN");
        }
        tracing::info!(expires_at = tokens.expires_at, "Strava access token refreshed");

        Ok(Self::new(client, tokens.access_token))
    }
}

impl ActivitySource for StravaService {
    fn provider(&self) -> Provider {
        Provider::Strava
    }

    async fn account_id(&self) -> Result<Option<String>> {
        let athlete = self.client.get_athlete(&self.access_token).await?;
        Ok(Some(athlete.id.to_string()))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        self.client.list_activities(&self.access_token, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fetcher::FetchWindow;
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn request(token: Option<&str>, per_page: u32) -> PageRequest {
        PageRequest {
            window: FetchWindow {
                after: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                before: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            },
            token: token.map(String::from),
            per_page,
        }
    }

    #[tokio::test]
    async fn test_list_activities_sends_only_upper_bound_and_reads_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/athlete/activities")
            .match_query(Matcher::Exact("page=2&per_page=2&before=1706745600".into()))
            .match_header("authorization", "Bearer token-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("x-ratelimit-usage", "12,340")
            .with_body(r#"[{"id": 1}, {"id": 2}]"#)
            .create_async()
            .await;

        let client = StravaClient::with_base_url(&server.url(), "unused");
        let page = client
            .list_activities("token-123", &request(Some("2"), 2))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next_token.as_deref(), Some("3"));
        assert_eq!(page.reported_usage, Some(vec![12, 340]));
    }

    #[tokio::test]
    async fn test_short_page_ends_window() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/athlete/activities")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"id": 1}]"#)
            .create_async()
            .await;

        let client = StravaClient::with_base_url(&server.url(), "unused");
        let page = client.list_activities("t", &request(None, 50)).await.unwrap();
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_status_taxonomy() {
        let mut server = mockito::Server::new_async().await;
        let client = StravaClient::with_base_url(&server.url(), "unused");

        for (status, check) in [
            (429, SyncError::is_rate_limited as fn(&SyncError) -> bool),
            (503, SyncError::is_retryable),
            (401, SyncError::is_auth_error),
        ] {
            let mock = server
                .mock("GET", "/athlete/activities")
                .match_query(Matcher::Any)
                .with_status(status)
                .create_async()
                .await;
            let err = client
                .list_activities("t", &request(None, 10))
                .await
                .unwrap_err();
            assert!(check(&err), "status {} mapped to {:?}", status, err);
            mock.remove_async().await;
        }

        server
            .mock("GET", "/athlete/activities")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        let err = client
            .list_activities("t", &request(None, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ProviderApi(_)));
    }

    #[tokio::test]
    async fn test_connect_refreshes_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .match_body(Matcher::UrlEncoded(
                "grant_type".into(),
                "refresh_token".into(),
            ))
            .with_status(200)
            .with_body(r#"{"access_token":"fresh","refresh_token":"r1","expires_at":1700000000}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/athlete")
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_body(r#"{"id": 4242}"#)
            .create_async()
            .await;

        let client = StravaClient::with_base_url(
            &server.url(),
            &format!("{}/oauth/token", server.url()),
        );
        let credentials = Credentials {
            strava_client_id: Some("id".to_string()),
            strava_client_secret: Some("secret".to_string()),
            strava_refresh_token: Some("r1".to_string()),
            ..Credentials::default()
        };

        let service = StravaService::connect(client, &credentials).await.unwrap();
        assert_eq!(service.account_id().await.unwrap().as_deref(), Some("4242"));
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_is_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(400)
            .with_body(r#"{"message":"Bad Request","errors":[{"code":"invalid"}]}"#)
            .create_async()
            .await;

        let client = StravaClient::with_base_url(
            &server.url(),
            &format!("{}/oauth/token", server.url()),
        );
        let credentials = Credentials {
            strava_client_id: Some("id".to_string()),
            strava_client_secret: Some("secret".to_string()),
            strava_refresh_token: Some("revoked".to_string()),
            ..Credentials::default()
        };

        let err = StravaService::connect(client, &credentials)
            .await
            .err()
            .expect("refresh should fail");
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_connect_requires_credentials() {
        let err = StravaService::connect(StravaClient::new(), &Credentials::default())
            .await
            .err()
            .expect("missing credentials");
        assert!(matches!(err, SyncError::Config(_)));
    }
}
