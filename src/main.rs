// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout Tracker API Server
//!
//! Backend for logging sets, planning workout days and sharing them with
//! a workout buddy.

use workout_tracker::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, MemoryStore, Store},
    services::{HttpAuthProvider, StripeClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Workout Tracker API");

    let db: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Firestore => Arc::new(
            FirestoreDb::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore"),
        ),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data will not persist");
            Arc::new(MemoryStore::new())
        }
    };

    let auth_provider = Arc::new(HttpAuthProvider::new(
        &config.auth_provider_url,
        config.auth_provider_key.clone(),
    ));
    let payments = Arc::new(StripeClient::new(
        &config.payment_api_url,
        config.payment_secret_key.clone(),
    ));
    tracing::info!(
        policy = ?config.bootstrap_failure_policy,
        "Providers initialized"
    );

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, auth_provider, payments));

    // Build router
    let app = workout_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("workout_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
