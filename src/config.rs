// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is loaded first if present.

use std::env;
use std::time::Duration;

/// Application configuration, loaded once at startup and passed explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Strava ---
    /// Strava OAuth client ID
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Long-lived refresh token (obtained with the `auth` command)
    pub strava_refresh_token: Option<String>,

    // --- Notion ---
    /// Notion integration secret
    pub notion_token: String,
    /// Target database ID
    pub notion_database_id: String,

    // --- Tuning ---
    /// Minimum spacing between Notion API calls
    pub notion_rate_limit: Duration,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// Local port for the OAuth callback server
    pub auth_callback_port: u16,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_refresh_token: Some("test_refresh_token".to_string()),
            notion_token: "secret_test".to_string(),
            notion_database_id: "test-database".to_string(),
            notion_rate_limit: Duration::ZERO,
            http_timeout: Duration::from_secs(5),
            auth_callback_port: 8000,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            strava_refresh_token: optional("STRAVA_REFRESH_TOKEN"),
            notion_token: required("NOTION_TOKEN")?,
            notion_database_id: required("NOTION_DATABASE_ID")?,
            notion_rate_limit: Duration::from_millis(parse_or("NOTION_RATE_LIMIT_MS", 350)?),
            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 30)?),
            auth_callback_port: parse_or("AUTH_CALLBACK_PORT", 8000)?,
        })
    }

    /// The refresh token, or an error telling the user how to get one.
    pub fn require_refresh_token(&self) -> Result<&str, ConfigError> {
        self.strava_refresh_token
            .as_deref()
            .ok_or(ConfigError::Missing("STRAVA_REFRESH_TOKEN"))
    }
}

/// Read a required variable, trimming surrounding whitespace.
fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

/// Read an optional variable; blank values count as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name, raw)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-wide, so everything touching them lives in one test.
    #[test]
    fn test_config_from_env() {
        env::set_var("STRAVA_CLIENT_ID", "test_id");
        env::set_var("STRAVA_CLIENT_SECRET", " test_secret\n");
        env::set_var("STRAVA_REFRESH_TOKEN", "");
        env::set_var("NOTION_TOKEN", "secret_abc");
        env::set_var("NOTION_DATABASE_ID", "db123");
        env::remove_var("NOTION_RATE_LIMIT_MS");
        env::remove_var("HTTP_TIMEOUT_SECS");
        env::remove_var("AUTH_CALLBACK_PORT");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.strava_client_secret, "test_secret");
        assert_eq!(config.strava_refresh_token, None);
        assert!(matches!(
            config.require_refresh_token(),
            Err(ConfigError::Missing("STRAVA_REFRESH_TOKEN"))
        ));
        assert_eq!(config.notion_rate_limit, Duration::from_millis(350));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.auth_callback_port, 8000);

        env::set_var("AUTH_CALLBACK_PORT", "not-a-port");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("AUTH_CALLBACK_PORT", _))
        ));
        env::remove_var("AUTH_CALLBACK_PORT");

        env::remove_var("NOTION_DATABASE_ID");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("NOTION_DATABASE_ID"))
        ));
    }
}
