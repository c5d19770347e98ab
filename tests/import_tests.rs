// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Import reconciliation against an in-memory store.

use runboard::db::Database;
use runboard::models::RemoteActivity;
use runboard::services::ImportReconciler;

mod common;

fn remote(id: u64, distance: f64, moving_time: i64) -> RemoteActivity {
    serde_json::from_value(common::strava_activity(id, "Run", distance, moving_time)).unwrap()
}

async fn reconciler(concurrency: usize) -> (ImportReconciler, Database) {
    let db = Database::in_memory().await.unwrap();
    (ImportReconciler::new(db.clone(), concurrency), db)
}

#[tokio::test]
async fn test_import_normalizes_units() {
    let (importer, _db) = reconciler(1).await;

    let activity = importer
        .import_activity("runner", &remote(100, 10_000.0, 3000))
        .await
        .unwrap();

    assert!(activity.id > 0);
    assert_eq!(activity.user_id, "runner");
    assert_eq!(activity.title, "Activity 100");
    assert_eq!(activity.distance_km, 10.0);
    assert_eq!(activity.pace_min_per_km, 5.0);
    assert_eq!(activity.duration_seconds, 3000);
    assert_eq!(activity.elevation_meters, Some(35.5));
    assert_eq!(activity.heart_rate_bpm, Some(148));
    assert_eq!(activity.start_time, Some(activity.date));
    assert_eq!(activity.remote_id.as_deref(), Some("100"));
    assert_eq!(
        activity.route,
        Some(serde_json::json!({ "summary_polyline": "}_ilFjk~uOwHJy@P" }))
    );
}

#[tokio::test]
async fn test_duplicate_import_conflicts_and_keeps_one_row() {
    let (importer, db) = reconciler(1).await;
    let run = remote(7, 5000.0, 1500);

    importer.import_activity("runner", &run).await.unwrap();
    let err = importer.import_activity("runner", &run).await.unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(db.count_activities("runner").await.unwrap(), 1);
}

#[tokio::test]
async fn test_same_remote_activity_for_two_users() {
    let (importer, db) = reconciler(1).await;
    let run = remote(7, 5000.0, 1500);

    importer.import_activity("alice", &run).await.unwrap();
    importer.import_activity("bob", &run).await.unwrap();

    assert_eq!(db.count_activities("alice").await.unwrap(), 1);
    assert_eq!(db.count_activities("bob").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_imports_store_one() {
    let (db, _url, _dir) = common::file_db().await;
    let importer = ImportReconciler::new(db.clone(), 1);
    let run = remote(55, 8000.0, 2400);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let importer = importer.clone();
            let run = run.clone();
            tokio::spawn(async move { importer.import_activity("runner", &run).await })
        })
        .collect();

    let mut imported = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => imported += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected import error: {}", e),
        }
    }

    assert_eq!(imported, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(db.count_activities("runner").await.unwrap(), 1);
}

#[tokio::test]
async fn test_annotate_marks_only_imported() {
    let (importer, _db) = reconciler(1).await;
    importer
        .import_activity("runner", &remote(2, 5000.0, 1500))
        .await
        .unwrap();
    // Another user's import of activity 3 does not count.
    importer
        .import_activity("someone-else", &remote(3, 5000.0, 1500))
        .await
        .unwrap();

    let annotated = importer
        .annotate_import_status(
            vec![
                remote(1, 5000.0, 1500),
                remote(2, 5000.0, 1500),
                remote(3, 5000.0, 1500),
            ],
            "runner",
        )
        .await
        .unwrap();

    let flags: Vec<(u64, bool)> = annotated
        .iter()
        .map(|a| (a.activity.id, a.is_imported))
        .collect();
    assert_eq!(flags, vec![(1, false), (2, true), (3, false)]);
}

#[tokio::test]
async fn test_annotate_large_page() {
    let (importer, _db) = reconciler(1).await;
    for id in (0..1200).step_by(100) {
        importer
            .import_activity("runner", &remote(id, 1000.0, 300))
            .await
            .unwrap();
    }

    let page: Vec<RemoteActivity> = (0..1200).map(|id| remote(id, 1000.0, 300)).collect();
    let annotated = importer.annotate_import_status(page, "runner").await.unwrap();

    assert_eq!(annotated.len(), 1200);
    assert_eq!(annotated.iter().filter(|a| a.is_imported).count(), 12);
    assert!(annotated[500].is_imported);
    assert!(!annotated[501].is_imported);
}

#[tokio::test]
async fn test_batch_with_duplicate() {
    let (importer, db) = reconciler(1).await;
    importer
        .import_activity("runner", &remote(20, 5000.0, 1500))
        .await
        .unwrap();

    let summary = importer
        .import_batch(
            "runner",
            vec![
                remote(10, 5000.0, 1500),
                remote(20, 5000.0, 1500),
                remote(30, 5000.0, 1500),
            ],
        )
        .await;

    assert_eq!(summary.imported, 2);
    assert_eq!(summary.conflicts, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.activity_ids.len(), 2);
    assert_eq!(db.count_activities("runner").await.unwrap(), 3);
}

#[tokio::test]
async fn test_batch_in_parallel_keeps_input_order() {
    let (importer, db) = reconciler(4).await;
    let batch: Vec<RemoteActivity> = (1..=8).map(|id| remote(id, 3000.0, 900)).collect();

    let summary = importer.import_batch("runner", batch).await;
    assert_eq!(summary.imported, 8);

    let mut remote_ids = Vec::new();
    for id in &summary.activity_ids {
        let activity = db.get_activity(*id).await.unwrap().unwrap();
        remote_ids.push(activity.remote_id.unwrap());
    }
    let expected: Vec<String> = (1..=8).map(|id: u64| id.to_string()).collect();
    assert_eq!(remote_ids, expected);
}

#[tokio::test]
async fn test_batch_repeats_within_one_request() {
    let (importer, db) = reconciler(1).await;

    let summary = importer
        .import_batch(
            "runner",
            vec![remote(5, 1000.0, 300), remote(5, 1000.0, 300)],
        )
        .await;

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.conflicts, 1);
    assert_eq!(db.count_activities("runner").await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_then_reimport() {
    let (importer, _db) = reconciler(1).await;
    let run = remote(9, 5000.0, 1500);

    let first = importer.import_activity("runner", &run).await.unwrap();
    importer.delete_activity(first.id).await.unwrap();

    let annotated = importer
        .annotate_import_status(vec![run.clone()], "runner")
        .await
        .unwrap();
    assert!(!annotated[0].is_imported);

    let second = importer.import_activity("runner", &run).await.unwrap();
    assert_ne!(first.id, second.id);
}
