// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{Duration, Utc};
use event_hub::config::Config;
use event_hub::db::{FirestoreStore, MemoryStore};
use event_hub::models::EventDraft;
use event_hub::routes::create_router;
use event_hub::services::{
    CapacityPolicy, EventRegistry, OrganizerNames, RolePolicy, UserDirectory,
};
use event_hub::AppState;
use std::sync::Arc;

/// Admin token configured by `Config::test_default()`.
#[allow(dead_code)]
pub const ADMIN_TOKEN: &str = "test_admin_token";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a store connected to the Firestore emulator.
#[allow(dead_code)]
pub async fn test_firestore() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock Firestore store (offline).
#[allow(dead_code)]
pub fn test_firestore_offline() -> FirestoreStore {
    FirestoreStore::new_mock()
}

#[allow(dead_code)]
pub fn registry(store: &MemoryStore, policy: CapacityPolicy) -> EventRegistry<MemoryStore> {
    EventRegistry::new(store.clone(), policy)
}

#[allow(dead_code)]
pub fn directory(store: &MemoryStore, admin_ids: &[u64]) -> UserDirectory<MemoryStore> {
    UserDirectory::new(store.clone(), RolePolicy::new(admin_ids.iter().copied()))
}

/// A valid draft dated one week out.
#[allow(dead_code)]
pub fn future_draft(title: &str, capacity: Option<u32>) -> EventDraft {
    serde_json::from_value(serde_json::json!({
        "title": title,
        "description": "d",
        "date": event_hub::time_utils::format_utc_rfc3339(Utc::now() + Duration::days(7)),
        "location": "Main hall",
        "maxParticipants": capacity,
        "creatorId": 1001,
        "organizer": "Ivan P.",
    }))
    .expect("valid draft")
}

/// Unique Telegram ID for test isolation against a shared emulator.
#[allow(dead_code)]
pub fn unique_telegram_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

/// Create a test app over a fresh in-memory store.
/// Returns the router, the shared state and the store.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState<MemoryStore>>, MemoryStore) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
) -> (axum::Router, Arc<AppState<MemoryStore>>, MemoryStore) {
    let store = MemoryStore::new();
    let state = Arc::new(AppState::new(
        config,
        store.clone(),
        OrganizerNames::disabled(),
    ));
    (create_router(state.clone()), state, store)
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
