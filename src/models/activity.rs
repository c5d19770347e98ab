// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity models: remote Strava activities and locally stored records.

use crate::error::AppError;
use crate::time_utils::parse_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Activity as returned by the Strava list and detail endpoints.
///
/// Only exists for the duration of a fetch or import request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteActivity {
    /// Strava activity ID. Import requests from the web client send it as
    /// `stravaId`.
    #[serde(alias = "stravaId")]
    pub id: u64,
    pub name: String,
    /// Distance in meters
    pub distance: f64,
    /// Moving time in seconds
    pub moving_time: i64,
    /// Elapsed time in seconds
    #[serde(default)]
    pub elapsed_time: i64,
    /// Elevation gain in meters
    #[serde(default)]
    pub total_elevation_gain: f64,
    /// Activity type (Run, Ride, ...)
    #[serde(rename = "type", default)]
    pub activity_type: String,
    /// Start date/time (ISO 8601, UTC)
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_heartrate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<RemoteMap>,
}

impl RemoteActivity {
    /// Summary polyline, if the activity has a non-empty one.
    pub fn summary_polyline(&self) -> Option<&str> {
        self.map
            .as_ref()
            .and_then(|m| m.summary_polyline.as_deref())
            .filter(|p| !p.is_empty())
    }

    pub fn is_run(&self) -> bool {
        self.activity_type == "Run"
    }

    /// Strava activity IDs are stored as text locally.
    pub fn remote_id(&self) -> String {
        self.id.to_string()
    }
}

/// Activity map data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_polyline: Option<String>,
}

/// A remote activity tagged with whether it already exists locally.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedActivity {
    #[serde(flatten)]
    pub activity: RemoteActivity,
    #[serde(rename = "isImported")]
    pub is_imported: bool,
}

/// Stored activity record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub distance_km: f64,
    pub duration_seconds: i64,
    pub pace_min_per_km: f64,
    pub date: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub elevation_meters: Option<f64>,
    pub heart_rate_bpm: Option<i64>,
    pub calories: Option<f64>,
    /// Strava activity ID, when imported
    pub remote_id: Option<String>,
    /// `{"summary_polyline": "..."}` when a route is known
    pub route: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Activity fields ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub title: String,
    pub description: Option<String>,
    pub distance_km: f64,
    pub duration_seconds: i64,
    pub pace_min_per_km: f64,
    pub date: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub elevation_meters: Option<f64>,
    pub heart_rate_bpm: Option<i64>,
    pub calories: Option<f64>,
    pub remote_id: Option<String>,
    pub route: Option<serde_json::Value>,
}

impl NewActivity {
    /// Normalize a Strava activity into local units.
    pub fn from_remote(remote: &RemoteActivity) -> Result<Self, AppError> {
        let start = parse_utc_rfc3339(&remote.start_date).ok_or_else(|| {
            AppError::Validation(format!(
                "Invalid start_date for activity {}: {}",
                remote.id, remote.start_date
            ))
        })?;

        let distance_km = meters_to_km(remote.distance);

        Ok(Self {
            title: remote.name.clone(),
            description: None,
            distance_km,
            duration_seconds: remote.moving_time,
            pace_min_per_km: pace_min_per_km(remote.moving_time, distance_km),
            date: start,
            start_time: Some(start),
            elevation_meters: Some(remote.total_elevation_gain),
            heart_rate_bpm: remote.average_heartrate.map(|hr| hr.round() as i64),
            calories: remote.calories,
            remote_id: Some(remote.remote_id()),
            route: remote
                .summary_polyline()
                .map(|p| serde_json::json!({ "summary_polyline": p })),
        })
    }
}

pub fn meters_to_km(meters: f64) -> f64 {
    meters / 1000.0
}

/// Pace in minutes per kilometer, or 0 when there is no distance.
pub fn pace_min_per_km(moving_time_secs: i64, distance_km: f64) -> f64 {
    if distance_km > 0.0 {
        (moving_time_secs as f64 / 60.0) / distance_km
    } else {
        0.0
    }
}
