// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User and Strava credential storage.

use super::{is_unique_violation, tables, Database};
use crate::error::AppError;
use crate::models::{StravaCredential, User};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

impl Database {
    /// Get a user by local ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT id, name, email, strava_athlete_id, strava_access_token,
                    strava_refresh_token, strava_token_expiry, created_at, updated_at
             FROM {} WHERE id = ?",
            tables::USERS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Create or overwrite the Strava credential for a user.
    ///
    /// Fails with `Conflict` if the Strava athlete is already linked to a
    /// different local user.
    pub async fn upsert_strava_credential(
        &self,
        user_id: &str,
        credential: &StravaCredential,
    ) -> Result<User, AppError> {
        let now = Utc::now();
        let email = format!("{}@strava.local", credential.athlete_id);
        let linked_elsewhere = |e: sqlx::Error| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!(
                    "Strava athlete {} is linked to another user",
                    credential.athlete_id
                ))
            } else {
                AppError::from(e)
            }
        };

        // Write first so the transaction takes SQLite's write lock up front
        // and waits on the busy timeout instead of failing on a stale read
        // snapshot.
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(&format!(
            "UPDATE {} SET name = ?, email = COALESCE(email, ?), strava_athlete_id = ?,
                 strava_access_token = ?, strava_refresh_token = ?,
                 strava_token_expiry = ?, updated_at = ?
             WHERE id = ?",
            tables::USERS
        ))
        .bind(&credential.name)
        .bind(&email)
        .bind(&credential.athlete_id)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(linked_elsewhere)?
        .rows_affected();

        if updated == 0 {
            sqlx::query(&format!(
                "INSERT INTO {} (
                    id, name, email, strava_athlete_id, strava_access_token,
                    strava_refresh_token, strava_token_expiry, created_at, updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                tables::USERS
            ))
            .bind(user_id)
            .bind(&credential.name)
            .bind(&email)
            .bind(&credential.athlete_id)
            .bind(&credential.access_token)
            .bind(&credential.refresh_token)
            .bind(credential.expires_at)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(linked_elsewhere)?;
        }

        tx.commit().await?;

        self.get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))
    }

    /// Store a refreshed token pair.
    pub async fn update_strava_tokens(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET strava_access_token = ?, strava_refresh_token = ?,
                 strava_token_expiry = ?, updated_at = ?
             WHERE id = ?",
            tables::USERS
        ))
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, AppError> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        strava_athlete_id: row.try_get("strava_athlete_id")?,
        strava_access_token: row.try_get("strava_access_token")?,
        strava_refresh_token: row.try_get("strava_refresh_token")?,
        strava_token_expiry: row.try_get("strava_token_expiry")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
