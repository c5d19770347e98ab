// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local activity storage.

use super::{is_unique_violation, tables, Database};
use crate::error::AppError;
use crate::models::{Activity, NewActivity};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use std::collections::HashSet;

/// Keeps `IN (...)` lists well below SQLite's bound parameter limit.
const REMOTE_ID_CHUNK: usize = 500;

const ACTIVITY_COLUMNS: &str = "id, user_id, title, description, distance_km, duration_seconds,
     pace_min_per_km, date, start_time, elevation_meters, heart_rate_bpm, calories,
     remote_id, route, created_at";

impl Database {
    /// Insert a new activity for a user.
    ///
    /// Fails with `Conflict` when the user already has an activity with the
    /// same remote ID. The unique index makes this check race-free.
    pub async fn insert_activity(
        &self,
        user_id: &str,
        activity: &NewActivity,
    ) -> Result<Activity, AppError> {
        let created_at = Utc::now();
        let route = activity
            .route
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode route: {}", e)))?;

        let result = sqlx::query(&format!(
            "INSERT INTO {} (
                user_id, title, description, distance_km, duration_seconds,
                pace_min_per_km, date, start_time, elevation_meters, heart_rate_bpm,
                calories, remote_id, route, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            tables::ACTIVITIES
        ))
        .bind(user_id)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(activity.distance_km)
        .bind(activity.duration_seconds)
        .bind(activity.pace_min_per_km)
        .bind(activity.date)
        .bind(activity.start_time)
        .bind(activity.elevation_meters)
        .bind(activity.heart_rate_bpm)
        .bind(activity.calories)
        .bind(&activity.remote_id)
        .bind(&route)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Activity {} already imported",
                    activity.remote_id.as_deref().unwrap_or_default()
                ))
            } else {
                AppError::from(e)
            }
        })?;

        Ok(Activity {
            id: result.last_insert_rowid(),
            user_id: user_id.to_string(),
            title: activity.title.clone(),
            description: activity.description.clone(),
            distance_km: activity.distance_km,
            duration_seconds: activity.duration_seconds,
            pace_min_per_km: activity.pace_min_per_km,
            date: activity.date,
            start_time: activity.start_time,
            elevation_meters: activity.elevation_meters,
            heart_rate_bpm: activity.heart_rate_bpm,
            calories: activity.calories,
            remote_id: activity.remote_id.clone(),
            route: activity.route.clone(),
            created_at,
        })
    }

    /// Get an activity by local ID.
    pub async fn get_activity(&self, activity_id: i64) -> Result<Option<Activity>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE id = ?",
            ACTIVITY_COLUMNS,
            tables::ACTIVITIES
        ))
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_activity).transpose()
    }

    /// All activities for a user, newest first.
    pub async fn list_activities(&self, user_id: &str) -> Result<Vec<Activity>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE user_id = ? ORDER BY date DESC, id DESC",
            ACTIVITY_COLUMNS,
            tables::ACTIVITIES
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_activity).collect()
    }

    /// Which of `remote_ids` the user has already imported.
    pub async fn find_imported_remote_ids(
        &self,
        user_id: &str,
        remote_ids: &[String],
    ) -> Result<HashSet<String>, AppError> {
        let mut found = HashSet::new();

        for chunk in remote_ids.chunks(REMOTE_ID_CHUNK) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
                "SELECT remote_id FROM {} WHERE user_id = ",
                tables::ACTIVITIES
            ));
            query.push_bind(user_id);
            query.push(" AND remote_id IN (");
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(id.as_str());
            }
            separated.push_unseparated(")");

            let rows = query.build().fetch_all(&self.pool).await?;
            for row in rows {
                found.insert(row.try_get::<String, _>("remote_id")?);
            }
        }

        Ok(found)
    }

    /// Delete an activity. Returns `false` if it did not exist.
    pub async fn delete_activity(&self, activity_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", tables::ACTIVITIES))
            .bind(activity_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of activities stored for a user.
    pub async fn count_activities(&self, user_id: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = ?",
            tables::ACTIVITIES
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

fn row_to_activity(row: &SqliteRow) -> Result<Activity, AppError> {
    let route: Option<String> = row.try_get("route")?;
    let route = route
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| AppError::Database(format!("Corrupt route column: {}", e)))?;

    Ok(Activity {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        distance_km: row.try_get("distance_km")?,
        duration_seconds: row.try_get("duration_seconds")?,
        pace_min_per_km: row.try_get("pace_min_per_km")?,
        date: row.try_get("date")?,
        start_time: row.try_get("start_time")?,
        elevation_meters: row.try_get("elevation_meters")?,
        heart_rate_bpm: row.try_get("heart_rate_bpm")?,
        calories: row.try_get("calories")?,
        remote_id: row.try_get("remote_id")?,
        route,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::fixtures::remote_run;

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = Database::in_memory().await.unwrap();
        let new = NewActivity::from_remote(&remote_run(11, 10_000.0, 3000)).unwrap();

        let created = db.insert_activity("u1", &new).await.unwrap();
        let loaded = db.get_activity(created.id).await.unwrap().unwrap();

        assert_eq!(loaded.remote_id.as_deref(), Some("11"));
        assert_eq!(loaded.distance_km, 10.0);
        assert_eq!(loaded.pace_min_per_km, 5.0);
        assert_eq!(loaded.route, new.route);
        assert_eq!(loaded.date, new.date);
    }

    #[tokio::test]
    async fn test_duplicate_remote_id_conflicts_per_user() {
        let db = Database::in_memory().await.unwrap();
        let new = NewActivity::from_remote(&remote_run(12, 5_000.0, 1500)).unwrap();

        db.insert_activity("u1", &new).await.unwrap();
        let err = db.insert_activity("u1", &new).await.unwrap_err();
        assert!(err.is_conflict());

        // Another user may hold the same remote activity.
        db.insert_activity("u2", &new).await.unwrap();
        assert_eq!(db.count_activities("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_manual_entries_do_not_collide() {
        let db = Database::in_memory().await.unwrap();
        let mut new = NewActivity::from_remote(&remote_run(13, 5_000.0, 1500)).unwrap();
        new.remote_id = None;

        db.insert_activity("u1", &new).await.unwrap();
        db.insert_activity("u1", &new).await.unwrap();
        assert_eq!(db.count_activities("u1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_imported_remote_ids_empty_input() {
        let db = Database::in_memory().await.unwrap();
        let found = db.find_imported_remote_ids("u1", &[]).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_missing() {
        let db = Database::in_memory().await.unwrap();
        let new = NewActivity::from_remote(&remote_run(14, 5_000.0, 1500)).unwrap();
        let created = db.insert_activity("u1", &new).await.unwrap();

        assert!(db.delete_activity(created.id).await.unwrap());
        assert!(!db.delete_activity(created.id).await.unwrap());
    }
}
