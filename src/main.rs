// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slot-Booking API Server
//!
//! Serves booking, availability and administration endpoints backed by
//! Firestore (or the in-memory store for local runs).

use slot_booking::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, MemoryDb, Stores},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.storage_backend,
        "Starting Slot-Booking API"
    );

    let stores = match config.storage_backend {
        StorageBackend::Firestore => {
            Stores::from_backend(Arc::new(FirestoreDb::new(&config.gcp_project_id).await?))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Stores::from_backend(Arc::new(MemoryDb::new()))
        }
    };

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), stores));
    if !state.provisioning.is_enabled() {
        tracing::warn!("IDENTITY_API_KEY not set, account provisioning disabled");
    }

    // Build router
    let app = slot_booking::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("slot_booking=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
