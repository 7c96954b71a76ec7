// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Accounts API Server
//!
//! Serves user registration, login and token-based sessions over a
//! Firestore-backed credential store.

use accounts_api::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, UserStore},
    services::MediaService,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        app_env = ?config.app_env,
        "Starting Accounts API"
    );

    let db = match config.store_backend {
        StoreBackend::Firestore => {
            UserStore::firestore(FirestoreDb::new(&config.gcp_project_id).await?)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory user store; accounts are lost on restart");
            UserStore::in_memory()
        }
    };

    let media = match config.cloudinary.clone() {
        Some(cloudinary) => {
            tracing::info!(cloud = %cloudinary.cloud_name, "Cloudinary media uploads enabled");
            MediaService::cloudinary(cloudinary)
        }
        None if config.is_development() => {
            tracing::warn!("Cloudinary not configured; using mock media uploads");
            MediaService::new_mock()
        }
        None => return Err("CLOUDINARY_* settings are required outside development".into()),
    };

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, media));

    // Build router
    let app = accounts_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("accounts_api=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
