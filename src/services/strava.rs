// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching activities.
//!
//! Handles:
//! - Refresh-token exchange for a short-lived access token
//! - Paginated activity listing with an optional `after` cursor
//! - Authorization-code exchange for the `auth` command
//! - Retry of transient read failures

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use validator::Validate;

use crate::config::Config;
use crate::error::{Result, Service, SyncError};
use crate::services::http::{self, Replay, RetryPolicy};

const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
const STRAVA_OAUTH_BASE: &str = "https://www.strava.com/oauth";

/// Page size for activity listing (Strava allows up to 200).
pub const ACTIVITIES_PER_PAGE: u32 = 100;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
    retry: RetryPolicy,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: STRAVA_API_BASE.to_string(),
            oauth_url: STRAVA_OAUTH_BASE.to_string(),
            client_id,
            client_secret,
            retry: RetryPolicy::default(),
        })
    }

    /// Build a client from application config.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
            config.http_timeout,
        )
    }

    /// Point the client at other hosts (e.g. a mock server).
    pub fn with_base_urls(mut self, api: &str, oauth: &str) -> Self {
        self.base_url = api.trim_end_matches('/').to_string();
        self.oauth_url = oauth.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// Any rejection is an [`SyncError::Auth`]; this is never retried.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse> {
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenRefreshResponse> {
        self.token_request(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenRefreshResponse> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(form)
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token request rejected");
            return Err(SyncError::Auth(format!(
                "Token request rejected with status {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("Failed to parse token response: {}", e)))
    }

    /// Browser URL that starts the authorization-code flow.
    pub fn authorize_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code&approval_prompt=force&scope=activity:read_all",
            self.oauth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
        )
    }

    /// List one page of the athlete's activities as raw records.
    ///
    /// Records are returned untyped; [`crate::models::Activity::from_strava`]
    /// validates each one so a single malformed record does not fail the page.
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: Option<i64>, // Unix timestamp
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>> {
        let url = format!("{}/athlete/activities", self.base_url);
        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let response = http::send_with_retry(Service::Strava, self.retry, Replay::Idempotent, || {
            self.http.get(&url).bearer_auth(access_token).query(&query)
        })
        .await?;

        http::json_body(Service::Strava, response).await
    }
}

/// Token response from Strava's OAuth endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Summary activity as returned by the list endpoint.
///
/// Everything is optional so that shape problems surface as validation
/// errors for the one record rather than decode errors for the page.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StravaActivitySummary {
    #[validate(required)]
    pub id: Option<u64>,
    #[validate(required, length(min = 1))]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub sport_type: Option<String>,
    #[validate(required)]
    pub start_date_local: Option<String>,
    /// Meters
    #[validate(range(min = 0.0))]
    pub distance: Option<f64>,
    /// Seconds
    #[validate(range(min = 0))]
    pub moving_time: Option<i64>,
    /// Meters
    #[validate(range(min = 0.0))]
    pub total_elevation_gain: Option<f64>,
    pub weighted_average_watts: Option<f64>,
    pub average_watts: Option<f64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

/// Cached access token with expiry information.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Strava service that owns the refresh token and the access token cache
/// for one run.
pub struct StravaService {
    client: StravaClient,
    refresh_token: String,
    cached: Mutex<Option<CachedToken>>,
}

impl StravaService {
    pub fn new(client: StravaClient, refresh_token: String) -> Self {
        Self {
            client,
            refresh_token,
            cached: Mutex::new(None),
        }
    }

    /// Get a valid access token, refreshing when missing or about to expire.
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        let margin = chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(token) = cached.as_ref() {
            if Utc::now() + margin < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        self.refresh(&mut cached).await
    }

    async fn refresh(&self, cached: &mut Option<CachedToken>) -> Result<String> {
        tracing::debug!("Refreshing Strava access token");
        let response = self.client.refresh_token(&self.refresh_token).await?;

        if response.refresh_token != self.refresh_token {
            // Strava may rotate the refresh token; the old one keeps working
            // until the new one is used, so only surface it.
            tracing::info!("Strava issued a new refresh token; update STRAVA_REFRESH_TOKEN");
        }

        let expires_at = DateTime::from_timestamp(response.expires_at, 0).unwrap_or_default();
        *cached = Some(CachedToken {
            access_token: response.access_token.clone(),
            expires_at,
        });
        Ok(response.access_token)
    }

    async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Fetch every activity after `after` (all activities when `None`).
    ///
    /// Pages until Strava returns a short or empty page. A 401 mid-run
    /// triggers one token refresh and a retry of that page.
    pub async fn fetch_activities(&self, after: Option<DateTime<Utc>>) -> Result<Vec<Value>> {
        let after = after.map(|dt| dt.timestamp());
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let batch = match self.fetch_page(after, page).await {
                Err(e) if e.is_token_error() => {
                    tracing::info!(page, "Access token rejected, refreshing and retrying page");
                    self.invalidate().await;
                    self.fetch_page(after, page).await?
                }
                other => other?,
            };

            let count = batch.len();
            tracing::debug!(page, count, "Fetched Strava activity page");
            records.extend(batch);

            if count < ACTIVITIES_PER_PAGE as usize {
                break;
            }
            page += 1;
        }

        tracing::info!(count = records.len(), "Fetched activities from Strava");
        Ok(records)
    }

    async fn fetch_page(&self, after: Option<i64>, page: u32) -> Result<Vec<Value>> {
        let token = self.get_valid_access_token().await?;
        self.client
            .list_activities(&token, after, page, ACTIVITIES_PER_PAGE)
            .await
    }
}
