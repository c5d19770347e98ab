// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Runboard API Server
//!
//! Imports running activities from Strava into a local training log and
//! tracks completed training plan sessions.

use runboard::{
    config::Config,
    db::Database,
    services::{ImportReconciler, StravaClient, StravaService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Runboard API");

    // Open the database and create tables
    let db = Database::connect(&config.database_url).await?;

    // Refresh locks are shared by every StravaService clone in this process
    let refresh_locks = Arc::new(dashmap::DashMap::new());
    let strava = StravaService::new(StravaClient::new(&config)?, db.clone(), refresh_locks);
    let importer = ImportReconciler::new(db.clone(), config.import_concurrency);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        strava,
        importer,
    });

    // Build router
    let app = runboard::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("runboard=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
