// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training plan session completion routes.

use crate::error::Result;
use crate::models::{SessionCompletion, SessionKey, ToggleOutcome};
use crate::routes::activities::UserQuery;
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/session-completions",
            get(list_completions).post(create_completion),
        )
        .route("/session-completions/toggle", post(toggle_completion))
}

/// Identifies one planned session.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub user_id: Option<String>,
    #[validate(range(min = 1))]
    pub week_number: u32,
    #[validate(length(max = 16))]
    pub day_of_week: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub session_type: String,
}

impl SessionRequest {
    fn into_key(self, user_id: String) -> SessionKey {
        SessionKey::new(
            user_id,
            self.week_number,
            self.day_of_week.as_deref().map(str::trim),
            self.session_type.trim(),
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub is_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<SessionCompletion>,
}

impl From<ToggleOutcome> for ToggleResponse {
    fn from(outcome: ToggleOutcome) -> Self {
        match outcome {
            ToggleOutcome::Completed(completion) => Self {
                is_completed: true,
                completion: Some(completion),
            },
            ToggleOutcome::Incomplete => Self {
                is_completed: false,
                completion: None,
            },
        }
    }
}

/// Completed sessions for the user.
async fn list_completions(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<SessionCompletion>>> {
    let Query(query) = query?;
    let user_id = state.resolve_user_id(query.user_id.as_deref());

    Ok(Json(state.db.list_session_completions(&user_id).await?))
}

/// Mark a session as completed. Fails with 409 if it already is.
async fn create_completion(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<SessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionCompletion>)> {
    let Json(request) = body?;
    request.validate()?;

    let user_id = state.resolve_user_id(request.user_id.as_deref());
    let key = request.into_key(user_id);
    let completion = state.db.create_session_completion(&key).await?;

    Ok((StatusCode::CREATED, Json(completion)))
}

/// Flip a session between completed and not completed.
async fn toggle_completion(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<SessionRequest>, JsonRejection>,
) -> Result<Json<ToggleResponse>> {
    let Json(request) = body?;
    request.validate()?;

    let user_id = state.resolve_user_id(request.user_id.as_deref());
    let key = request.into_key(user_id);
    let outcome = state.db.toggle_session_completion(&key).await?;

    tracing::info!(
        user_id = %key.user_id,
        week = key.week_number,
        session_type = %key.session_type,
        completed = outcome.is_completed(),
        "Toggled session completion"
    );

    Ok(Json(outcome.into()))
}
