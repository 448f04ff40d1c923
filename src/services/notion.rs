// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notion API client for the activity database.
//!
//! Handles:
//! - Paginated database queries
//! - Page creation and property updates
//! - Database metadata and schema updates
//! - Client-side spacing between calls (Notion allows ~3 requests/s)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{Result, Service, SyncError};
use crate::models::properties;
use crate::models::{Activity, DestinationRow, Field};
use crate::services::http::{self, Replay, RetryPolicy};
use crate::services::store::ActivityStore;

const NOTION_API_BASE: &str = "https://api.notion.com/v1";
const NOTION_API_VERSION: &str = "2022-06-28";

/// Page size for database queries (Notion maximum).
const QUERY_PAGE_SIZE: u32 = 100;

/// One page of a database query.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Notion API client.
#[derive(Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    database_id: String,
    retry: RetryPolicy,
    min_interval: Duration,
    /// Time of the last request, shared by clones.
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl NotionClient {
    pub fn new(token: String, database_id: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: NOTION_API_BASE.to_string(),
            token,
            database_id,
            retry: RetryPolicy::default(),
            min_interval: Duration::ZERO,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    /// Build a client from application config.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.notion_token.clone(),
            config.notion_database_id.clone(),
            config.http_timeout,
        )?
        .with_rate_limit(config.notion_rate_limit))
    }

    /// Point the client at another host (e.g. a mock server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Minimum spacing between consecutive requests.
    pub fn with_rate_limit(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Wait until `min_interval` has passed since the previous request.
    async fn throttle(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.min_interval).await;
        }
        *last = Some(Instant::now());
    }

    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
        replay: Replay,
    ) -> Result<T> {
        self.throttle().await;
        let url = format!("{}{}", self.base_url, path);

        let response = http::send_with_retry(Service::Notion, self.retry, replay, || {
            let request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_API_VERSION);
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await?;

        http::json_body(Service::Notion, response).await
    }

    /// Query one page of the database.
    pub async fn query_database(&self, start_cursor: Option<&str>) -> Result<QueryResponse> {
        let mut body = json!({ "page_size": QUERY_PAGE_SIZE });
        if let Some(cursor) = start_cursor {
            body["start_cursor"] = json!(cursor);
        }
        let path = format!("/databases/{}/query", self.database_id);
        // Queries do not modify anything, so they are safe to replay.
        self.request(reqwest::Method::POST, &path, Some(&body), Replay::Idempotent)
            .await
    }

    /// Query every page object in the database, following cursors.
    pub async fn query_database_all(&self) -> Result<Vec<Value>> {
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let response = self.query_database(cursor.as_deref()).await?;
            pages.extend(response.results);

            match response.next_cursor {
                Some(next) if response.has_more => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(count = pages.len(), "Queried Notion database");
        Ok(pages)
    }

    /// Create a page in the database, returning the page object.
    pub async fn create_page(&self, properties: Map<String, Value>) -> Result<Value> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
        });
        self.request(reqwest::Method::POST, "/pages", Some(&body), Replay::NotIdempotent)
            .await
    }

    /// Update some properties of an existing page.
    pub async fn update_page(&self, page_id: &str, properties: Map<String, Value>) -> Result<Value> {
        let body = json!({ "properties": properties });
        let path = format!("/pages/{}", page_id);
        // Setting the same properties twice has the same effect.
        self.request(reqwest::Method::PATCH, &path, Some(&body), Replay::Idempotent)
            .await
    }

    /// Get database metadata including its schema.
    pub async fn get_database(&self) -> Result<Value> {
        let path = format!("/databases/{}", self.database_id);
        self.request(reqwest::Method::GET, &path, None, Replay::Idempotent)
            .await
    }

    /// Add or reconfigure database properties.
    pub async fn update_database(&self, properties: Map<String, Value>) -> Result<Value> {
        let body = json!({ "properties": properties });
        let path = format!("/databases/{}", self.database_id);
        self.request(reqwest::Method::PATCH, &path, Some(&body), Replay::Idempotent)
            .await
    }

    /// Database title as plain text.
    pub async fn database_title(&self) -> Result<String> {
        let database = self.get_database().await?;
        Ok(database_title(&database))
    }

    /// Write the activity schema to the database.
    pub async fn init_schema(&self) -> Result<()> {
        self.update_database(properties::schema()).await?;
        tracing::info!(database_id = %self.database_id, "Database schema updated");
        Ok(())
    }
}

/// Extract the plain-text title of a database object.
pub fn database_title(database: &Value) -> String {
    let title: String = database
        .get("title")
        .and_then(Value::as_array)
        .map(|segments| {
            segments
                .iter()
                .filter_map(|seg| seg.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if title.is_empty() {
        "Unknown".to_string()
    } else {
        title
    }
}

#[async_trait]
impl ActivityStore for NotionClient {
    async fn query_all(&self) -> Result<Vec<DestinationRow>> {
        let pages = self.query_database_all().await?;
        Ok(pages.iter().filter_map(properties::row_from_page).collect())
    }

    async fn create_row(&self, activity: &Activity) -> Result<String> {
        let page = self.create_page(properties::to_properties(activity)).await?;
        page.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SyncError::remote(Service::Notion, None, "created page has no id"))
    }

    async fn update_row(&self, row_id: &str, activity: &Activity, fields: &[Field]) -> Result<()> {
        self.update_page(row_id, properties::to_partial_properties(activity, fields))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_title() {
        let db = json!({ "title": [{ "plain_text": "Strava " }, { "plain_text": "Log" }] });
        assert_eq!(database_title(&db), "Strava Log");
        assert_eq!(database_title(&json!({ "title": [] })), "Unknown");
        assert_eq!(database_title(&json!({})), "Unknown");
    }
}
