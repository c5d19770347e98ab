// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session completion storage and the completion toggle.

use super::{is_unique_violation, tables, Database};
use crate::error::AppError;
use crate::models::{SessionCompletion, SessionKey, ToggleOutcome};
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, Transaction};

impl Database {
    /// All completions for a user, ordered by week.
    pub async fn list_session_completions(
        &self,
        user_id: &str,
    ) -> Result<Vec<SessionCompletion>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT id, user_id, week_number, day_of_week, session_type, completed_at
             FROM {} WHERE user_id = ?
             ORDER BY week_number ASC, day_of_week ASC, session_type ASC",
            tables::SESSION_COMPLETIONS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_completion).collect()
    }

    /// Look up a completion by its unique key.
    pub async fn get_session_completion(
        &self,
        key: &SessionKey,
    ) -> Result<Option<SessionCompletion>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT id, user_id, week_number, day_of_week, session_type, completed_at
             FROM {}
             WHERE user_id = ? AND week_number = ? AND day_of_week = ? AND session_type = ?",
            tables::SESSION_COMPLETIONS
        ))
        .bind(&key.user_id)
        .bind(i64::from(key.week_number))
        .bind(key.day_column())
        .bind(&key.session_type)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_completion).transpose()
    }

    /// Mark a session as completed. Fails with `Conflict` if it already is.
    pub async fn create_session_completion(
        &self,
        key: &SessionKey,
    ) -> Result<SessionCompletion, AppError> {
        let mut tx = self.pool.begin().await?;
        let completion = insert_completion(&mut tx, key).await?;
        tx.commit().await?;
        Ok(completion)
    }

    /// Flip a session between completed and not completed.
    ///
    /// Runs as one transaction: delete the key if present, otherwise insert
    /// it. The delete takes SQLite's write lock, so two toggles on the same
    /// key serialize instead of racing between lookup and write.
    pub async fn toggle_session_completion(
        &self,
        key: &SessionKey,
    ) -> Result<ToggleOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(&format!(
            "DELETE FROM {}
             WHERE user_id = ? AND week_number = ? AND day_of_week = ? AND session_type = ?",
            tables::SESSION_COMPLETIONS
        ))
        .bind(&key.user_id)
        .bind(i64::from(key.week_number))
        .bind(key.day_column())
        .bind(&key.session_type)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let outcome = if deleted > 0 {
            ToggleOutcome::Incomplete
        } else {
            ToggleOutcome::Completed(insert_completion(&mut tx, key).await?)
        };

        tx.commit().await?;

        tracing::debug!(
            user_id = %key.user_id,
            week = key.week_number,
            day = key.day_column(),
            session_type = %key.session_type,
            completed = outcome.is_completed(),
            "Session completion toggled"
        );

        Ok(outcome)
    }
}

async fn insert_completion(
    tx: &mut Transaction<'_, Sqlite>,
    key: &SessionKey,
) -> Result<SessionCompletion, AppError> {
    let completed_at = Utc::now();

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, week_number, day_of_week, session_type, completed_at)
         VALUES (?, ?, ?, ?, ?)",
        tables::SESSION_COMPLETIONS
    ))
    .bind(&key.user_id)
    .bind(i64::from(key.week_number))
    .bind(key.day_column())
    .bind(&key.session_type)
    .bind(completed_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!(
                "Session week {} {} {} already completed",
                key.week_number,
                key.day_column(),
                key.session_type
            ))
        } else {
            AppError::from(e)
        }
    })?;

    Ok(SessionCompletion {
        id: result.last_insert_rowid(),
        user_id: key.user_id.clone(),
        week_number: key.week_number,
        day_of_week: key.day_of_week.clone(),
        session_type: key.session_type.clone(),
        completed_at,
    })
}

fn row_to_completion(row: &SqliteRow) -> Result<SessionCompletion, AppError> {
    let week_number: i64 = row.try_get("week_number")?;
    let day: String = row.try_get("day_of_week")?;

    Ok(SessionCompletion {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        week_number: u32::try_from(week_number)
            .map_err(|_| AppError::Database(format!("Invalid week_number {}", week_number)))?,
        day_of_week: (!day.is_empty()).then_some(day),
        session_type: row.try_get("session_type")?,
        completed_at: row.try_get("completed_at")?,
    })
}
