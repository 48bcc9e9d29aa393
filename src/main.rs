// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event Hub API Server
//!
//! Serves the event registry and user directory of the event-discovery
//! mini-app on top of Firestore (or an in-memory store for local runs).

use anyhow::Context;
use event_hub::{
    config::{Config, StoreBackend},
    db::{DocumentStore, FirestoreStore, MemoryStore},
    services::{LegacyUserClient, OrganizerNames},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        port = config.port,
        backend = ?config.store_backend,
        capacity_policy = ?config.capacity_policy,
        admins = config.admin_ids.len(),
        "Starting Event Hub API"
    );

    let organizer_names = organizer_names(&config)?;

    match config.store_backend {
        StoreBackend::Firestore => {
            let store = FirestoreStore::new(&config.gcp_project_id)
                .await
                .context("Failed to connect to Firestore")?;
            serve(config, store, organizer_names).await
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data will not survive a restart");
            serve(config, MemoryStore::new(), organizer_names).await
        }
    }
}

/// Organizer name resolver, disabled unless both lookup settings are present.
fn organizer_names(config: &Config) -> anyhow::Result<OrganizerNames> {
    match (&config.legacy_lookup_url, &config.legacy_lookup_token) {
        (Some(url), Some(token)) => {
            tracing::info!(url = %url, "Legacy user lookup enabled");
            let client = LegacyUserClient::new(url.clone(), token.clone())?;
            Ok(OrganizerNames::new(Some(client)))
        }
        _ => {
            tracing::info!("Legacy user lookup not configured");
            Ok(OrganizerNames::disabled())
        }
    }
}

async fn serve<S: DocumentStore>(
    config: Config,
    store: S,
    organizer_names: OrganizerNames,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);

    // Build shared state and router
    let state = Arc::new(AppState::new(config, store, organizer_names));
    let app = event_hub::routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("event_hub=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
