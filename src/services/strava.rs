// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client and token lifecycle.
//!
//! Handles:
//! - OAuth authorization URL and code exchange
//! - Token refresh when expired
//! - Paginated activity listing and single-activity fetches

use crate::config::Config;
use crate::error::AppError;
use crate::models::{RemoteActivity, StravaCredential};
use serde::Deserialize;
use std::time::Duration;

/// Scopes requested during authorization.
const OAUTH_SCOPE: &str = "read,activity:read_all";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl StravaClient {
    /// Create a Strava client from configuration.
    ///
    /// Every request carries the configured timeout; an expired timeout is
    /// reported as `RemoteUnavailable`.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.strava_http_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.strava_api_base.trim_end_matches('/').to_string(),
            oauth_base: config.strava_oauth_base.trim_end_matches('/').to_string(),
            client_id: config.strava_client_id.clone(),
            client_secret: config.strava_client_secret.clone(),
            redirect_uri: config.strava_redirect_uri.clone(),
        })
    }

    /// URL of the Strava consent page.
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.oauth_base,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(OAUTH_SCOPE),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::RemoteUnavailable(format!("Token exchange request failed: {}", e))
            })?;

        self.check_response_json(response).await
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| {
                AppError::RemoteUnavailable(format!("Token refresh request failed: {}", e))
            })?;

        self.check_response_json(response).await
    }

    /// List the athlete's activities (all types), one page at a time.
    ///
    /// `page` and `per_page` are 1-based.
    pub async fn list_activities(
        &self,
        access_token: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteActivity>, AppError> {
        if page == 0 || per_page == 0 {
            return Err(AppError::Validation(
                "page and per_page must be positive".to_string(),
            ));
        }

        let response = self
            .http
            .get(format!("{}/athlete/activities", self.api_base))
            .bearer_auth(access_token)
            .query(&[("page", page.to_string()), ("per_page", per_page.to_string())])
            .send()
            .await?;

        self.check_response_json(response).await
    }

    /// Get a single activity by ID.
    pub async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<RemoteActivity, AppError> {
        let url = format!("{}/activities/{}", self.api_base, activity_id);

        let response = self.http.get(&url).bearer_auth(access_token).send().await?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
            }

            return Err(AppError::RemoteUnavailable(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::RemoteUnavailable(format!("JSON parse error: {}", e)))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::Database;
use crate::models::User;
use crate::time_utils::{format_utc_rfc3339, from_unix_seconds};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Strava service that owns the token lifecycle and wraps API calls.
///
/// Refreshes for one user are serialized inside this process. Two
/// processes sharing a database can still both refresh the same
/// credential; Strava rotates refresh tokens, so the loser's refresh is
/// rejected and surfaces as `RemoteUnavailable`.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    db: Database,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl StravaService {
    pub fn new(client: StravaClient, db: Database, refresh_locks: RefreshLocks) -> Self {
        Self {
            client,
            db,
            refresh_locks,
        }
    }

    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Return a usable access token for the user, refreshing it first if
    /// it has expired.
    pub async fn refresh_if_expired(&self, user_id: &str) -> Result<String, AppError> {
        self.refresh_if_expired_at(user_id, Utc::now()).await
    }

    /// Same as [`Self::refresh_if_expired`] with an explicit current time.
    pub async fn refresh_if_expired_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let user = self.load_connected_user(user_id).await?;
        if !user.token_expired_at(now) {
            return stored_access_token(user);
        }

        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let user = self.load_connected_user(user_id).await?;
        if !user.token_expired_at(now) {
            return stored_access_token(user);
        }

        tracing::info!(user_id, "Access token expired, refreshing");

        let refresh_token = user
            .strava_refresh_token
            .as_deref()
            .ok_or_else(|| AppError::Auth(format!("User {} has no refresh token", user_id)))?;

        let new_tokens = self.client.refresh_token(refresh_token).await?;
        let expires_at = from_unix_seconds(new_tokens.expires_at).ok_or_else(|| {
            AppError::RemoteUnavailable(format!(
                "Invalid expires_at in refresh response: {}",
                new_tokens.expires_at
            ))
        })?;

        self.db
            .update_strava_tokens(
                user_id,
                &new_tokens.access_token,
                &new_tokens.refresh_token,
                expires_at,
            )
            .await?;

        tracing::info!(
            user_id,
            expires_at = %format_utc_rfc3339(expires_at),
            "Token refreshed"
        );
        Ok(new_tokens.access_token)
    }

    /// Load a user that has completed the OAuth flow.
    async fn load_connected_user(&self, user_id: &str) -> Result<User, AppError> {
        let user = self.db.get_user(user_id).await?.ok_or_else(|| {
            AppError::Auth(format!("User {} is not connected to Strava", user_id))
        })?;

        if user.strava_refresh_token.is_none() {
            return Err(AppError::Auth(format!(
                "User {} is not connected to Strava",
                user_id
            )));
        }

        Ok(user)
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// URL of the Strava consent page carrying `state`.
    pub fn authorization_url(&self, state: &str) -> String {
        self.client.authorization_url(state)
    }

    /// Exchange the authorization code and store the credential for
    /// `user_id`.
    pub async fn handle_oauth_callback(&self, user_id: &str, code: &str) -> Result<User, AppError> {
        let token_response = self.client.exchange_code(code).await?;

        let expires_at = from_unix_seconds(token_response.expires_at).ok_or_else(|| {
            AppError::RemoteUnavailable(format!(
                "Invalid expires_at in token response: {}",
                token_response.expires_at
            ))
        })?;

        let athlete = &token_response.athlete;
        let credential = StravaCredential {
            athlete_id: athlete.id.to_string(),
            name: format!("{} {}", athlete.firstname, athlete.lastname)
                .trim()
                .to_string(),
            access_token: token_response.access_token.clone(),
            refresh_token: token_response.refresh_token.clone(),
            expires_at,
        };

        let user = self.db.upsert_strava_credential(user_id, &credential).await?;

        tracing::info!(
            user_id,
            athlete_id = athlete.id,
            "OAuth callback handled, credential stored"
        );

        Ok(user)
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// List one page of the user's Strava activities.
    pub async fn list_activities(
        &self,
        user_id: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteActivity>, AppError> {
        let access_token = self.refresh_if_expired(user_id).await?;
        self.client
            .list_activities(&access_token, page, per_page)
            .await
    }

    /// Get one of the user's Strava activities.
    pub async fn get_activity(
        &self,
        user_id: &str,
        activity_id: u64,
    ) -> Result<RemoteActivity, AppError> {
        let access_token = self.refresh_if_expired(user_id).await?;
        self.client.get_activity(&access_token, activity_id).await
    }
}

fn stored_access_token(user: User) -> Result<String, AppError> {
    user.strava_access_token
        .ok_or_else(|| AppError::Auth(format!("User {} has no access token", user.id)))
}
