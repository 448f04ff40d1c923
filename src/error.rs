// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types shared by the fetch, map and upsert stages.

use crate::config::ConfigError;

/// Remote service that produced a [`SyncError::Remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Strava,
    Notion,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Strava => f.write_str("Strava"),
            Service::Notion => f.write_str("Notion"),
        }
    }
}

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Credential or token rejected. Fatal, never retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// HTTP or network failure talking to either API.
    ///
    /// `status` is `None` for transport failures (connect, timeout, decode).
    #[error("{service} API error{}: {message}", status_suffix(.status))]
    Remote {
        service: Service,
        status: Option<u16>,
        message: String,
    },

    /// Provider record is missing a required field or has a malformed one.
    #[error("Invalid activity {external_id}: {reason}")]
    Validation { external_id: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SyncError {
    pub(crate) fn remote(service: Service, status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::Remote {
            service,
            status,
            message: message.into(),
        }
    }

    pub(crate) fn transport(service: Service, err: &reqwest::Error) -> Self {
        Self::remote(service, None, err.to_string())
    }

    /// Returns true if the remote rejected the bearer token (HTTP 401).
    pub fn is_token_error(&self) -> bool {
        matches!(self, SyncError::Remote { status: Some(401), .. })
    }

    /// Returns true if the remote rate limited the request (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SyncError::Remote { status: Some(429), .. })
    }

    /// Returns true for failures a read may be retried after:
    /// transport errors, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Remote { status: None, .. } => true,
            SyncError::Remote {
                status: Some(code), ..
            } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
