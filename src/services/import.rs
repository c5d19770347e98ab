// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Import reconciliation between Strava and the local activity store.
//!
//! Handles:
//! 1. Tagging fetched Strava activities with whether they are already stored
//! 2. Normalizing and importing a single activity
//! 3. Batch imports with per-item outcomes
//! 4. Direct entry, listing and deletion of local activities

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Activity, AnnotatedActivity, NewActivity, RemoteActivity};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Reconciles remote Strava activities with locally stored ones.
#[derive(Clone)]
pub struct ImportReconciler {
    db: Database,
    /// Imports a batch runs at once (at least 1)
    import_concurrency: usize,
}

/// Outcome counts for a batch import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BatchImportSummary {
    pub imported: usize,
    pub conflicts: usize,
    pub failed: usize,
    /// Local IDs of the created records, in input order
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<number>"))]
    pub activity_ids: Vec<i64>,
}

impl ImportReconciler {
    pub fn new(db: Database, import_concurrency: usize) -> Self {
        Self {
            db,
            import_concurrency: import_concurrency.max(1),
        }
    }

    /// Tag each remote activity with whether the user already imported it.
    ///
    /// Uses a single store lookup for the whole page. Order is preserved.
    pub async fn annotate_import_status(
        &self,
        remote: Vec<RemoteActivity>,
        user_id: &str,
    ) -> Result<Vec<AnnotatedActivity>> {
        if remote.is_empty() {
            return Ok(Vec::new());
        }

        let candidate_ids: Vec<String> = remote.iter().map(RemoteActivity::remote_id).collect();
        let imported = self
            .db
            .find_imported_remote_ids(user_id, &candidate_ids)
            .await?;

        tracing::debug!(
            user_id,
            candidates = candidate_ids.len(),
            imported = imported.len(),
            "Annotated import status"
        );

        Ok(mark_imported(remote, &imported))
    }

    /// Normalize a Strava activity and store it for the user.
    ///
    /// Fails with `Conflict` when the user already imported this activity.
    pub async fn import_activity(
        &self,
        user_id: &str,
        remote: &RemoteActivity,
    ) -> Result<Activity> {
        let new_activity = NewActivity::from_remote(remote)?;
        let activity = self.db.insert_activity(user_id, &new_activity).await?;

        tracing::info!(
            user_id,
            remote_id = remote.id,
            activity_id = activity.id,
            distance_km = activity.distance_km,
            "Imported activity"
        );

        Ok(activity)
    }

    /// Import several activities. One item's failure never aborts the rest.
    pub async fn import_batch(
        &self,
        user_id: &str,
        activities: Vec<RemoteActivity>,
    ) -> BatchImportSummary {
        let total = activities.len();

        let futures: Vec<_> = activities
            .iter()
            .map(|remote| self.import_activity(user_id, remote))
            .collect();
        let results: Vec<Result<Activity>> = stream::iter(futures)
            .buffered(self.import_concurrency)
            .collect()
            .await;

        let mut summary = BatchImportSummary::default();
        for (remote, result) in activities.iter().zip(results) {
            match result {
                Ok(activity) => {
                    summary.imported += 1;
                    summary.activity_ids.push(activity.id);
                }
                Err(e) if e.is_conflict() => summary.conflicts += 1,
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        remote_id = remote.id,
                        error = %e,
                        "Batch import item failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            user_id,
            total,
            imported = summary.imported,
            conflicts = summary.conflicts,
            failed = summary.failed,
            "Batch import complete"
        );

        summary
    }

    /// Store a manually entered activity.
    pub async fn create_activity(&self, user_id: &str, activity: NewActivity) -> Result<Activity> {
        if activity.distance_km < 0.0 || activity.duration_seconds < 0 {
            return Err(AppError::Validation(
                "distance and duration must not be negative".to_string(),
            ));
        }

        let activity = self.db.insert_activity(user_id, &activity).await?;
        tracing::info!(user_id, activity_id = activity.id, "Created activity");
        Ok(activity)
    }

    /// Local activities for a user, newest first.
    pub async fn list_activities(&self, user_id: &str) -> Result<Vec<Activity>> {
        self.db.list_activities(user_id).await
    }

    /// Remove a local activity.
    pub async fn delete_activity(&self, activity_id: i64) -> Result<()> {
        if !self.db.delete_activity(activity_id).await? {
            return Err(AppError::NotFound(format!(
                "Activity {} not found",
                activity_id
            )));
        }

        tracing::info!(activity_id, "Deleted activity");
        Ok(())
    }
}

/// Tag each remote activity using a set of already-imported remote IDs.
pub fn mark_imported(
    remote: Vec<RemoteActivity>,
    imported: &HashSet<String>,
) -> Vec<AnnotatedActivity> {
    remote
        .into_iter()
        .map(|activity| {
            let is_imported = imported.contains(&activity.remote_id());
            AnnotatedActivity {
                activity,
                is_imported,
            }
        })
        .collect()
}
