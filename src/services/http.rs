// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared HTTP plumbing for the Strava and Notion clients.
//!
//! Handles:
//! - Status checking and JSON decoding into [`SyncError`]
//! - Retries with exponential backoff for transient failures
//! - `Retry-After` on 429 responses

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{Result, Service, SyncError};

/// Upper bound on a server-requested `Retry-After` wait.
const MAX_RETRY_AFTER_SECS: u64 = 60;
/// Upper bound on exponential backoff.
const MAX_BACKOFF_SECS: u64 = 30;

/// Whether a request may be replayed after an ambiguous failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Reads: retry on transport errors, 429 and 5xx.
    Idempotent,
    /// Writes: retry only when the request provably was not applied
    /// (429, or failure to connect).
    NotIdempotent,
}

/// Retry settings for one client.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        (self.base_delay * factor).min(Duration::from_secs(MAX_BACKOFF_SECS))
    }
}

/// Send a request, retrying per `policy`, and return the successful response.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed
/// by sending.
pub async fn send_with_retry<F>(
    service: Service,
    policy: RetryPolicy,
    replay: Replay,
    build: F,
) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let (err, wait) = match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let retry_after = retry_after(&response);
                let err = error_from_response(service, response).await;
                let retryable = match replay {
                    Replay::Idempotent => err.is_transient(),
                    Replay::NotIdempotent => err.is_rate_limited(),
                };
                if !retryable {
                    return Err(err);
                }
                (err, retry_after)
            }
            Err(e) => {
                let retryable = match replay {
                    Replay::Idempotent => e.is_connect() || e.is_timeout(),
                    Replay::NotIdempotent => e.is_connect(),
                };
                let err = SyncError::transport(service, &e);
                if !retryable {
                    return Err(err);
                }
                (err, None)
            }
        };

        if attempt >= policy.max_retries {
            return Err(err);
        }
        attempt += 1;
        let delay = wait.unwrap_or_else(|| policy.backoff(attempt));
        tracing::warn!(
            %service,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying request"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Decode a successful response body.
pub async fn json_body<T: DeserializeOwned>(service: Service, response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| SyncError::remote(service, None, format!("JSON parse error: {}", e)))
}

/// Convert a non-success response into an error, keeping the API's message.
pub async fn error_from_response(service: Service, response: Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(%service, "Rate limit hit (429)");
    }

    // Notion and Strava both return {"message": "..."} on errors
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or(body);

    SyncError::remote(service, Some(status.as_u16()), message)
}

fn retry_after(response: &Response) -> Option<Duration> {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
}
