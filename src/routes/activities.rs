// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local activity log routes.

use crate::error::{AppError, Result};
use crate::models::activity::{pace_min_per_km, Activity, NewActivity};
use crate::time_utils::parse_date_or_datetime;
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/activities", get(list_activities).post(create_activity))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserQuery {
    pub user_id: Option<String>,
}

/// List the user's activities, newest first.
async fn list_activities(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<Vec<Activity>>> {
    let Query(query) = query?;
    let user_id = state.resolve_user_id(query.user_id.as_deref());

    let activities = state.importer.list_activities(&user_id).await?;
    Ok(Json(activities))
}

/// Manually entered activity.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityRequest {
    pub user_id: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub distance_km: f64,
    #[validate(range(min = 0))]
    pub duration_seconds: i64,
    /// Computed from distance and duration when omitted
    #[validate(range(min = 0.0))]
    pub pace_min_per_km: Option<f64>,
    /// `YYYY-MM-DD` or RFC3339
    pub date: String,
    pub start_time: Option<String>,
    pub elevation_meters: Option<f64>,
    #[validate(range(min = 0, max = 300))]
    pub heart_rate_bpm: Option<i64>,
    #[validate(range(min = 0.0))]
    pub calories: Option<f64>,
}

impl CreateActivityRequest {
    fn into_new_activity(self) -> Result<NewActivity> {
        let date = parse_date_or_datetime(&self.date)
            .ok_or_else(|| AppError::Validation(format!("Invalid date: {}", self.date)))?;
        let start_time = self
            .start_time
            .as_deref()
            .map(|raw| {
                parse_date_or_datetime(raw)
                    .ok_or_else(|| AppError::Validation(format!("Invalid startTime: {}", raw)))
            })
            .transpose()?;

        Ok(NewActivity {
            pace_min_per_km: self
                .pace_min_per_km
                .unwrap_or_else(|| pace_min_per_km(self.duration_seconds, self.distance_km)),
            title: self.title,
            description: self.description.filter(|d| !d.is_empty()),
            distance_km: self.distance_km,
            duration_seconds: self.duration_seconds,
            date,
            start_time,
            elevation_meters: self.elevation_meters,
            heart_rate_bpm: self.heart_rate_bpm,
            calories: self.calories,
            remote_id: None,
            route: None,
        })
    }
}

/// Create an activity by hand.
async fn create_activity(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<CreateActivityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Activity>)> {
    let Json(request) = body?;
    request.validate()?;

    let user_id = state.resolve_user_id(request.user_id.as_deref());
    let activity = state
        .importer
        .create_activity(&user_id, request.into_new_activity()?)
        .await?;

    Ok((StatusCode::CREATED, Json(activity)))
}
