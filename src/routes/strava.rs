// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava routes: OAuth connect flow, remote activity browsing and import.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::models::{Activity, AnnotatedActivity, RemoteActivity};
use crate::routes::activities::UserQuery;
use crate::services::BatchImportSummary;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// How long a signed OAuth state stays valid.
const STATE_MAX_AGE_MILLIS: u128 = 15 * 60 * 1000;

const DEFAULT_PER_PAGE: u32 = 30;
const MAX_PER_PAGE: u32 = 200;
const MAX_BATCH_SIZE: usize = 200;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/strava/auth", get(auth_start))
        .route("/strava/callback", get(auth_callback))
        .route("/strava/activities", get(list_remote_activities))
        .route("/strava/activities/{id}", get(get_remote_activity))
        .route("/strava/import", post(import_activity).delete(delete_import))
        .route("/strava/import/batch", post(import_batch))
}

// ─── OAuth ───────────────────────────────────────────────────

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<UserQuery>, QueryRejection>,
) -> Result<Redirect> {
    let Query(query) = query?;
    let user_id = state.resolve_user_id(query.user_id.as_deref());

    let oauth_state = sign_state(&user_id, &state.config.oauth_state_key, now_millis()?)?;
    let auth_url = state.strava.authorization_url(&oauth_state);

    tracing::info!(user_id = %user_id, "Starting OAuth flow, redirecting to Strava");

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens and store the credential.
///
/// Always redirects to the frontend; failures carry `error=strava_auth_failed`.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let frontend_url = state.config.frontend_url.trim_end_matches('/');
    let failure = || {
        Redirect::temporary(&format!(
            "{}/strava?error=strava_auth_failed",
            frontend_url
        ))
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return failure();
    }

    let now = match now_millis() {
        Ok(now) => now,
        Err(_) => return failure(),
    };
    let Some(user_id) = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key, now))
    else {
        tracing::warn!("Invalid, expired or missing OAuth state parameter");
        return failure();
    };

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!(user_id = %user_id, "OAuth callback without authorization code");
        return failure();
    };

    tracing::info!(user_id = %user_id, "Exchanging authorization code for tokens");

    match state.strava.handle_oauth_callback(&user_id, &code).await {
        Ok(user) => {
            tracing::info!(
                user_id = %user.id,
                athlete_id = user.strava_athlete_id.as_deref().unwrap_or(""),
                "OAuth successful, credential stored"
            );
            Redirect::temporary(&format!(
                "{}/import?userId={}",
                frontend_url,
                urlencoding::encode(&user.id)
            ))
        }
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "OAuth code exchange failed");
            failure()
        }
    }
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Sign the OAuth state: base64("user_id|timestamp_hex|signature_hex").
fn sign_state(user_id: &str, secret: &[u8], now_millis: u128) -> Result<String> {
    let payload = format!("{}|{:x}", user_id, now_millis);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify HMAC signature and age, and decode the user ID from the OAuth state.
fn verify_and_decode_state(state: &str, secret: &[u8], now_millis: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // User IDs may contain '|', the timestamp and signature never do.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let user_id = parts.next()?;

    let payload = format!("{}|{}", user_id, timestamp_hex);
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if !bool::from(signature_hex.as_bytes().ct_eq(expected_signature.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_at = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_millis.saturating_sub(issued_at) > STATE_MAX_AGE_MILLIS {
        return None;
    }

    Some(user_id.to_string())
}

// ─── Remote Activities ───────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteListQuery {
    user_id: Option<String>,
    page: Option<u32>,
    per_page: Option<u32>,
}

/// List one page of the user's Strava runs, tagged with import status.
async fn list_remote_activities(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<RemoteListQuery>, QueryRejection>,
) -> Result<Json<Vec<AnnotatedActivity>>> {
    let Query(query) = query?;
    let user_id = state.resolve_user_id(query.user_id.as_deref());
    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).min(MAX_PER_PAGE);

    let remote = state
        .strava
        .list_activities(&user_id, page, per_page)
        .await?;
    let fetched = remote.len();
    let runs: Vec<RemoteActivity> = remote.into_iter().filter(RemoteActivity::is_run).collect();

    tracing::debug!(
        user_id = %user_id,
        page,
        fetched,
        runs = runs.len(),
        "Fetched Strava activities"
    );

    let annotated = state.importer.annotate_import_status(runs, &user_id).await?;
    Ok(Json(annotated))
}

/// Get one Strava activity, tagged with import status.
async fn get_remote_activity(
    State(state): State<Arc<AppState>>,
    path: std::result::Result<Path<u64>, PathRejection>,
    query: std::result::Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<AnnotatedActivity>> {
    let Path(activity_id) = path?;
    let Query(query) = query?;
    let user_id = state.resolve_user_id(query.user_id.as_deref());

    let remote = state.strava.get_activity(&user_id, activity_id).await?;
    let annotated = state
        .importer
        .annotate_import_status(vec![remote], &user_id)
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Annotation dropped activity")))?;

    Ok(Json(annotated))
}

// ─── Import ──────────────────────────────────────────────────

/// Strava activity payload plus the importing user.
#[derive(Deserialize)]
pub struct ImportRequest {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
    #[serde(flatten)]
    activity: RemoteActivity,
}

/// Import one Strava activity.
async fn import_activity(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ImportRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Activity>)> {
    let Json(request) = body?;
    let user_id = state.resolve_user_id(request.user_id.as_deref());

    let activity = state
        .importer
        .import_activity(&user_id, &request.activity)
        .await?;

    Ok((StatusCode::CREATED, Json(activity)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImportRequest {
    user_id: Option<String>,
    activities: Vec<RemoteActivity>,
}

/// Import several Strava activities, reporting per-outcome counts.
async fn import_batch(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<BatchImportRequest>, JsonRejection>,
) -> Result<Json<BatchImportSummary>> {
    let Json(request) = body?;
    if request.activities.len() > MAX_BATCH_SIZE {
        return Err(AppError::Validation(format!(
            "At most {} activities per batch",
            MAX_BATCH_SIZE
        )));
    }

    let user_id = state.resolve_user_id(request.user_id.as_deref());
    let summary = state
        .importer
        .import_batch(&user_id, request.activities)
        .await;

    Ok(Json(summary))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteImportQuery {
    activity_id: Option<i64>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Remove an imported activity.
async fn delete_import(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<DeleteImportQuery>, QueryRejection>,
) -> Result<Json<SuccessResponse>> {
    let Query(query) = query?;
    let activity_id = query
        .activity_id
        .ok_or_else(|| AppError::Validation("activityId is required".to_string()))?;

    state.importer.delete_activity(activity_id).await?;

    Ok(Json(SuccessResponse { success: true }))
}
