// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Runboard: import Strava runs into a local training log
//!
//! This crate provides the backend API for browsing Strava activities,
//! importing them as local activity records and tracking completed
//! training plan sessions.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{ImportReconciler, StravaService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub strava: StravaService,
    pub importer: ImportReconciler,
}

impl AppState {
    /// User named by a request, or the configured default.
    pub fn resolve_user_id(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.config.default_user_id.as_str())
            .to_string()
    }
}
