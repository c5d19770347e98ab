// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use runboard::config::Config;
use runboard::db::Database;
use runboard::models::StravaCredential;
use runboard::routes::create_router;
use runboard::services::{ImportReconciler, StravaClient, StravaService};
use runboard::AppState;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

/// Access token the mock hands out on refresh.
#[allow(dead_code)]
pub const REFRESHED_ACCESS_TOKEN: &str = "refreshed-access";
/// Access token the mock hands out on code exchange.
#[allow(dead_code)]
pub const EXCHANGED_ACCESS_TOKEN: &str = "exchanged-access";
/// Athlete returned by the mock code exchange.
#[allow(dead_code)]
pub const MOCK_ATHLETE_ID: u64 = 9001;

/// In-process stand-in for the Strava API.
#[derive(Default)]
pub struct MockStrava {
    pub token_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    /// Activities served by the list and detail endpoints
    pub activities: Mutex<Vec<Value>>,
    /// Bearer tokens seen by the API endpoints
    pub bearer_tokens: Mutex<Vec<String>>,
    /// Status forced on every endpoint when set
    pub fail_with: Mutex<Option<StatusCode>>,
    /// Delay applied before every endpoint answers
    pub delay: Mutex<Option<StdDuration>>,
}

#[allow(dead_code)]
impl MockStrava {
    pub fn set_activities(&self, activities: Vec<Value>) {
        *self.activities.lock().unwrap() = activities;
    }

    pub fn fail_with(&self, status: StatusCode) {
        *self.fail_with.lock().unwrap() = Some(status);
    }

    pub fn delay_responses(&self, delay: StdDuration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn wait(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn last_bearer(&self) -> Option<String> {
        self.bearer_tokens.lock().unwrap().last().cloned()
    }

    fn forced_failure(&self) -> Option<Response> {
        let status = *self.fail_with.lock().unwrap();
        status.map(|status| {
            (status, Json(json!({ "message": "forced failure" }))).into_response()
        })
    }

    fn record_bearer(&self, headers: &HeaderMap) {
        if let Some(token) = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        {
            self.bearer_tokens.lock().unwrap().push(token.to_string());
        }
    }
}

async fn token(
    State(mock): State<Arc<MockStrava>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    mock.token_calls.fetch_add(1, Ordering::SeqCst);
    mock.wait().await;
    if let Some(resp) = mock.forced_failure() {
        return resp;
    }

    let expires_at = (Utc::now() + Duration::hours(6)).timestamp();
    let grant_type = form.get("grant_type").map(String::as_str);
    let code = form.get("code").map(String::as_str);

    match grant_type {
        Some("refresh_token") => Json(json!({
            "token_type": "Bearer",
            "access_token": REFRESHED_ACCESS_TOKEN,
            "refresh_token": "refreshed-refresh",
            "expires_at": expires_at,
            "expires_in": 21600
        }))
        .into_response(),
        Some("authorization_code") if code != Some("bad") => Json(json!({
            "token_type": "Bearer",
            "access_token": EXCHANGED_ACCESS_TOKEN,
            "refresh_token": "exchanged-refresh",
            "expires_at": expires_at,
            "athlete": { "id": MOCK_ATHLETE_ID, "firstname": "Ada", "lastname": "Runner" }
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Bad Request" })),
        )
            .into_response(),
    }
}

async fn list_activities(State(mock): State<Arc<MockStrava>>, headers: HeaderMap) -> Response {
    mock.list_calls.fetch_add(1, Ordering::SeqCst);
    mock.record_bearer(&headers);
    mock.wait().await;
    if let Some(resp) = mock.forced_failure() {
        return resp;
    }

    let activities = mock.activities.lock().unwrap().clone();
    Json(Value::Array(activities)).into_response()
}

async fn get_activity(
    State(mock): State<Arc<MockStrava>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    mock.detail_calls.fetch_add(1, Ordering::SeqCst);
    mock.record_bearer(&headers);
    mock.wait().await;
    if let Some(resp) = mock.forced_failure() {
        return resp;
    }

    let found = mock
        .activities
        .lock()
        .unwrap()
        .iter()
        .find(|a| a["id"].as_u64() == Some(id))
        .cloned();
    match found {
        Some(activity) => Json(activity).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Record Not Found" })),
        )
            .into_response(),
    }
}

/// Start the mock on an ephemeral port. Returns the mock and its base URL.
#[allow(dead_code)]
pub async fn spawn_mock_strava() -> (Arc<MockStrava>, String) {
    let mock = Arc::new(MockStrava::default());
    let app = Router::new()
        .route("/oauth/token", post(token))
        .route("/api/v3/athlete/activities", get(list_activities))
        .route("/api/v3/activities/{id}", get(get_activity))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (mock, format!("http://{}", addr))
}

/// Test configuration pointing Strava calls at `base_url`.
#[allow(dead_code)]
pub fn config_for(base_url: &str) -> Config {
    let mut config = Config::test_default();
    config.strava_api_base = format!("{}/api/v3", base_url);
    config.strava_oauth_base = format!("{}/oauth", base_url);
    config
}

/// Build the application state over a fresh in-memory database.
#[allow(dead_code)]
pub async fn create_test_state(config: Config) -> Arc<AppState> {
    let db = Database::in_memory().await.unwrap();
    let strava = StravaService::new(
        StravaClient::new(&config).unwrap(),
        db.clone(),
        Arc::new(dashmap::DashMap::new()),
    );
    let importer = ImportReconciler::new(db.clone(), config.import_concurrency);

    Arc::new(AppState {
        config,
        db,
        strava,
        importer,
    })
}

/// Database in a temporary file, using the regular multi-connection pool.
/// Keep the returned directory alive for the duration of the test.
#[allow(dead_code)]
pub async fn file_db() -> (Database, String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("runboard.db").display());
    let db = Database::connect(&url).await.unwrap();
    (db, url, dir)
}

/// Create a test app whose Strava calls go nowhere.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (Router, Arc<AppState>) {
    let state = create_test_state(Config::test_default()).await;
    (create_router(state.clone()), state)
}

/// Create a test app backed by a running mock Strava.
#[allow(dead_code)]
pub async fn create_test_app_with_mock() -> (Router, Arc<AppState>, Arc<MockStrava>) {
    let (mock, base_url) = spawn_mock_strava().await;
    let state = create_test_state(config_for(&base_url)).await;
    (create_router(state.clone()), state, mock)
}

/// Store a Strava credential for `user_id` expiring at `expires_at`.
#[allow(dead_code)]
pub async fn seed_user(db: &Database, user_id: &str, expires_at: DateTime<Utc>) {
    let credential = StravaCredential {
        athlete_id: format!("athlete-{}", user_id),
        name: "Test Runner".to_string(),
        access_token: "stored-access".to_string(),
        refresh_token: "stored-refresh".to_string(),
        expires_at,
    };
    db.upsert_strava_credential(user_id, &credential)
        .await
        .unwrap();
}

/// Strava activity JSON as the list endpoint returns it.
#[allow(dead_code)]
pub fn strava_activity(id: u64, activity_type: &str, distance: f64, moving_time: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Activity {}", id),
        "distance": distance,
        "moving_time": moving_time,
        "elapsed_time": moving_time + 90,
        "total_elevation_gain": 35.5,
        "type": activity_type,
        "sport_type": activity_type,
        "start_date": "2024-06-01T06:00:00Z",
        "average_heartrate": 148.4,
        "map": { "id": format!("a{}", id), "summary_polyline": "}_ilFjk~uOwHJy@P" }
    })
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
