// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backfill of directory records from legacy event creators.

use event_hub::db::{collections, DocumentStore, MemoryStore};
use event_hub::models::{LoginIdentity, Role, UserRecord};
use event_hub::services::MigrationReport;
use serde_json::{json, Value};

mod common;
use common::directory;

async fn seed_event(store: &MemoryStore, id: &str, creator: Value, organizer: Option<&str>) {
    let mut doc = json!({
        "title": id,
        "description": "d",
        "date": "2099-01-01T00:00:00.000Z",
        "isActive": true,
        "creatorId": creator,
        "createdAt": "2024-01-01T00:00:00.000Z",
        "updatedAt": "2024-01-01T00:00:00.000Z",
    });
    if let Some(organizer) = organizer {
        doc["organizer"] = json!(organizer);
    }
    store.set(collections::EVENTS, id, &doc).await.unwrap();
}

#[tokio::test]
async fn test_backfill_creates_missing_creators_once() {
    let store = MemoryStore::new();
    seed_event(&store, "e1", json!(100), Some("Olga S.")).await;
    seed_event(&store, "e2", json!(100), Some("Olga S.")).await;
    seed_event(&store, "e3", json!(200), None).await;
    let users = directory(&store, &[]);

    let first = users.migrate_from_legacy_events().await;
    assert_eq!(first, MigrationReport { created: 2, errors: 0 });

    let olga = users.get(100).await.unwrap();
    assert_eq!(olga.first_name, "Olga S.");
    assert_eq!(olga.role, Role::User);
    assert!(olga.is_active);
    assert!(olga.last_login_at.is_none());
    assert_eq!(users.get(200).await.unwrap().first_name, "Unknown user");

    let second = users.migrate_from_legacy_events().await;
    assert_eq!(second, MigrationReport { created: 0, errors: 0 });
    assert_eq!(store.document_count(collections::USERS), 2);
}

#[tokio::test]
async fn test_backfill_never_overwrites_existing_records() {
    let store = MemoryStore::new();
    let users = directory(&store, &[]);
    users
        .upsert_from_login(&LoginIdentity::new(100, "Real").with_username("real"))
        .await
        .unwrap();
    users.promote_to_admin(100).await.unwrap();
    seed_event(&store, "e1", json!(100), Some("Stale name")).await;

    let report = users.migrate_from_legacy_events().await;
    assert_eq!(report, MigrationReport { created: 0, errors: 0 });

    let record = users.get(100).await.unwrap();
    assert_eq!(record.first_name, "Real");
    assert_eq!(record.role, Role::Admin);
}

#[tokio::test]
async fn test_backfill_accepts_legacy_identity_shapes() {
    let store = MemoryStore::new();
    seed_event(&store, "numeric", json!(300), None).await;
    seed_event(&store, "float", json!(301.0), None).await;
    seed_event(&store, "text", json!("302"), None).await;
    seed_event(&store, "anonymous", Value::Null, Some("call me")).await;
    seed_event(&store, "garbage", json!("not-a-number"), None).await;
    let users = directory(&store, &[]);

    let report = users.migrate_from_legacy_events().await;

    assert_eq!(report.created, 3);
    for id in [300, 301, 302] {
        let record: Option<UserRecord> = store
            .get_by_id(collections::USERS, &id.to_string())
            .await
            .unwrap();
        assert_eq!(record.map(|r| r.telegram_id), Some(id));
    }
}

#[tokio::test]
async fn test_failed_commit_creates_nothing() {
    let store = MemoryStore::new();
    seed_event(&store, "e1", json!(1), None).await;
    seed_event(&store, "e2", json!(2), None).await;
    seed_event(&store, "e3", json!(3), None).await;
    let users = directory(&store, &[]);

    store.fail_next_commit();
    let report = users.migrate_from_legacy_events().await;

    assert_eq!(report, MigrationReport { created: 0, errors: 3 });
    assert_eq!(store.document_count(collections::USERS), 0);

    // A later run picks everything up.
    let retry = users.migrate_from_legacy_events().await;
    assert_eq!(retry, MigrationReport { created: 3, errors: 0 });
}

#[tokio::test]
async fn test_unreadable_events_count_as_one_error() {
    let store = MemoryStore::new();
    seed_event(&store, "e1", json!(1), None).await;
    let users = directory(&store, &[]);
    store.set_offline(true);

    let report = users.migrate_from_legacy_events().await;

    assert_eq!(report, MigrationReport { created: 0, errors: 1 });
}

#[tokio::test]
async fn test_empty_event_collection() {
    let store = MemoryStore::new();
    let users = directory(&store, &[]);

    let report = users.migrate_from_legacy_events().await;

    assert_eq!(report, MigrationReport::default());
}
