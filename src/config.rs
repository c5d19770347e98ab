// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use std::env;
use std::str::FromStr;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Strava OAuth application ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Callback URL registered with Strava
    pub strava_redirect_uri: String,
    /// Base URL of the Strava REST API
    pub strava_api_base: String,
    /// Base URL of the Strava OAuth endpoints
    pub strava_oauth_base: String,
    /// Timeout applied to every outbound Strava request
    pub strava_http_timeout_secs: u64,

    // --- Service ---
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// sqlx connection URL
    pub database_url: String,
    /// Server port
    pub port: u16,
    /// Identity used when a request does not name a user
    pub default_user_id: String,
    /// Number of imports a batch runs at once
    pub import_concurrency: usize,
    /// HMAC key for signing the OAuth `state` parameter (raw bytes)
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Fixed configuration for tests. Strava base URLs point at an
    /// unroutable local port and should be overridden when a test needs
    /// a mock provider.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_redirect_uri: "http://localhost:8080/strava/callback".to_string(),
            strava_api_base: "http://127.0.0.1:9/api/v3".to_string(),
            strava_oauth_base: "http://127.0.0.1:9/oauth".to_string(),
            strava_http_timeout_secs: 5,
            frontend_url: "http://localhost:3000".to_string(),
            database_url: "sqlite::memory:".to_string(),
            port: 8080,
            default_user_id: "default-user".to_string(),
            import_concurrency: 1,
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let import_concurrency: usize = parse_or("IMPORT_CONCURRENCY", 1)?;
        if import_concurrency == 0 {
            return Err(ConfigError::Invalid("IMPORT_CONCURRENCY"));
        }

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            strava_redirect_uri: env::var("STRAVA_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:8080/strava/callback".to_string()),
            strava_api_base: env::var("STRAVA_API_BASE")
                .unwrap_or_else(|_| "https://www.strava.com/api/v3".to_string()),
            strava_oauth_base: env::var("STRAVA_OAUTH_BASE")
                .unwrap_or_else(|_| "https://www.strava.com/oauth".to_string()),
            strava_http_timeout_secs: parse_or("STRAVA_HTTP_TIMEOUT_SECS", 10)?,

            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:runboard.db".to_string()),
            port: parse_or("PORT", 8080)?,
            default_user_id: env::var("DEFAULT_USER_ID")
                .unwrap_or_else(|_| "default-user".to_string()),
            import_concurrency,
            oauth_state_key: required("OAUTH_STATE_KEY")?.into_bytes(),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("STRAVA_CLIENT_ID", "test_id");
        env::set_var("STRAVA_CLIENT_SECRET", " test_secret\n");
        env::set_var("OAUTH_STATE_KEY", "test_state_key");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.strava_client_secret, "test_secret");
        assert_eq!(config.oauth_state_key, b"test_state_key".to_vec());
        assert!(config.import_concurrency >= 1);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        env::set_var("RUNBOARD_TEST_PORT_GARBAGE", "eighty");
        let result: Result<u16, _> = parse_or("RUNBOARD_TEST_PORT_GARBAGE", 8080);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result: Result<u16, _> = parse_or("RUNBOARD_TEST_PORT_UNSET", 8080);
        assert_eq!(result.unwrap(), 8080);
    }
}
