// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod import;
pub mod strava;

pub use import::{mark_imported, BatchImportSummary, ImportReconciler};
pub use strava::{RefreshLocks, StravaClient, StravaService};
