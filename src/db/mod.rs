// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (SQLite via sqlx).
//!
//! Provides typed operations for:
//! - Users (Strava credentials)
//! - Activities (imported and manually entered)
//! - Session completions (training plan markers)
//!
//! Uniqueness rules live in the schema, not only in application code, so
//! concurrent writers cannot create duplicates.

mod activities;
mod session_completions;
mod users;

use crate::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 8;

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "users";
    pub const ACTIVITIES: &str = "activities";
    pub const SESSION_COMPLETIONS: &str = "session_completions";
}

/// Database client.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect and create the schema if needed.
    ///
    /// In-memory URLs (`sqlite::memory:`) get a single connection that is
    /// never recycled, since each SQLite memory connection is its own
    /// database.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let in_memory = database_url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open database: {}", e)))?;

        let db = Self { pool };
        db.migrate().await?;

        tracing::info!(in_memory, "Database ready");
        Ok(db)
    }

    /// Fresh in-memory database, for tests and local experiments.
    pub async fn in_memory() -> Result<Self, AppError> {
        Self::connect("sqlite::memory:").await
    }

    /// Create tables and indexes.
    async fn migrate(&self) -> Result<(), AppError> {
        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    name TEXT,
                    email TEXT,
                    strava_athlete_id TEXT UNIQUE,
                    strava_access_token TEXT,
                    strava_refresh_token TEXT,
                    strava_token_expiry TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                tables::USERS
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT,
                    distance_km REAL NOT NULL,
                    duration_seconds INTEGER NOT NULL,
                    pace_min_per_km REAL NOT NULL,
                    date TEXT NOT NULL,
                    start_time TEXT,
                    elevation_meters REAL,
                    heart_rate_bpm INTEGER,
                    calories REAL,
                    remote_id TEXT,
                    route TEXT,
                    created_at TEXT NOT NULL
                )",
                tables::ACTIVITIES
            ),
            // NULL remote IDs (manual entries) stay distinct under this index.
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_activities_user_remote
                 ON {} (user_id, remote_id)",
                tables::ACTIVITIES
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_activities_user_date ON {} (user_id, date)",
                tables::ACTIVITIES
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    week_number INTEGER NOT NULL,
                    day_of_week TEXT NOT NULL DEFAULT '',
                    session_type TEXT NOT NULL,
                    completed_at TEXT NOT NULL,
                    UNIQUE (user_id, week_number, day_of_week, session_type)
                )",
                tables::SESSION_COMPLETIONS
            ),
        ];

        for statement in &statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }
}

/// Whether a sqlx error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
