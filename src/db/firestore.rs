// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed [`DocumentStore`].
//!
//! Provides:
//! - keyed CRUD through the fluent API
//! - AND-ed field filters with optional ordering
//! - native `increment` field transforms for participant counters
//! - transactional batches for all-or-nothing backfills

use crate::db::store::{
    BatchWriteKind, DocumentStore, FieldFilter, FilterOp, OrderBy, SortDirection, StoreError,
    WriteBatch, MAX_BATCH_WRITES,
};
use firestore::errors::FirestoreError;
use firestore::select_filter_builder::FirestoreQueryFilterBuilder;
use firestore::{FirestoreQueryDirection, FirestoreWritePrecondition};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Unavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client.as_ref().ok_or_else(|| {
            StoreError::Unavailable("Database not connected (offline mode)".to_string())
        })
    }
}

/// Map a Firestore error onto the store taxonomy.
fn store_error(collection: &str, id: &str, err: FirestoreError) -> StoreError {
    match err {
        FirestoreError::DataConflictError(_) => StoreError::AlreadyExists {
            collection: collection.to_string(),
            id: id.to_string(),
        },
        FirestoreError::DataNotFoundError(_) => StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        },
        err @ FirestoreError::DeserializeError(_) => StoreError::Malformed(err.to_string()),
        err @ FirestoreError::SerializeError(_) => StoreError::Serialization(err.to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn to_firestore_filter(
    q: &FirestoreQueryFilterBuilder,
    filter: &FieldFilter,
) -> Option<firestore::FirestoreQueryFilter> {
    let field = q.field(filter.field);
    let value = filter.value.clone();
    match filter.op {
        FilterOp::Equal => field.eq(value),
        FilterOp::NotEqual => field.neq(value),
        FilterOp::LessThan => field.less_than(value),
        FilterOp::LessThanOrEqual => field.less_than_or_equal(value),
        FilterOp::GreaterThan => field.greater_than(value),
        FilterOp::GreaterThanOrEqual => field.greater_than_or_equal(value),
    }
}

/// Serialize a typed document into the schemaless shape the fluent builders accept.
fn to_document<T: Serialize>(
    collection: &str,
    id: &str,
    document: &T,
) -> Result<Value, StoreError> {
    serde_json::to_value(document)
        .map_err(|e| StoreError::Serialization(format!("{}/{}: {}", collection, id, e)))
}

fn batch_collection(batch: &WriteBatch) -> &'static str {
    batch.writes().first().map_or("*", |w| w.collection)
}

fn to_direction(direction: SortDirection) -> FirestoreQueryDirection {
    match direction {
        SortDirection::Ascending => FirestoreQueryDirection::Ascending,
        SortDirection::Descending => FirestoreQueryDirection::Descending,
    }
}

impl DocumentStore for FirestoreStore {
    async fn get_by_id<T>(&self, collection: &str, id: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| store_error(collection, id, e))
    }

    async fn query_where<T>(
        &self,
        collection: &str,
        filters: Vec<FieldFilter>,
        order: Option<OrderBy>,
    ) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let ordering: Vec<(&str, FirestoreQueryDirection)> = order
            .into_iter()
            .map(|o| (o.field, to_direction(o.direction)))
            .collect();

        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| q.for_all(filters.iter().map(|f| to_firestore_filter(&q, f))))
            .order_by(ordering)
            .obj()
            .query()
            .await
            .map_err(|e| store_error(collection, "*", e))
    }

    async fn set<T>(&self, collection: &str, id: &str, document: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let document = to_document(collection, id, document)?;
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(&document)
            .execute()
            .await
            .map_err(|e| store_error(collection, id, e))?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        // Only the listed paths are written; everything else is left untouched.
        let paths: Vec<String> = fields.keys().cloned().collect();
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths)
            .in_col(collection)
            .document_id(id)
            .object(&fields)
            .execute()
            .await
            .map_err(|e| store_error(collection, id, e))?;
        Ok(())
    }

    async fn create<T>(&self, collection: &str, id: &str, document: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let document = to_document(collection, id, document)?;
        let _: () = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(id)
            .object(&document)
            .execute()
            .await
            .map_err(|e| store_error(collection, id, e))?;
        Ok(())
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &'static str,
        delta: i64,
    ) -> Result<(), StoreError> {
        let client = self.get_client()?;

        let mut transaction = client.begin_transaction().await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to begin transaction: {}", e))
        })?;

        client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .transforms(|t| t.fields([t.field(field).increment(delta)]))
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| store_error(collection, id, e))?;

        transaction
            .commit()
            .await
            .map_err(|e| store_error(collection, id, e))?;

        Ok(())
    }

    async fn commit_batch(&self, batch: WriteBatch) -> Result<usize, StoreError> {
        if batch.len() > MAX_BATCH_WRITES {
            return Err(StoreError::BatchTooLarge);
        }
        let client = self.get_client()?;
        let count = batch.len();

        let mut transaction = client.begin_transaction().await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to begin transaction: {}", e))
        })?;

        for write in batch.writes() {
            match write.kind {
                BatchWriteKind::Set => client
                    .fluent()
                    .update()
                    .in_col(write.collection)
                    .document_id(&write.id)
                    .object(&write.document)
                    .add_to_transaction(&mut transaction),
                BatchWriteKind::Create => client
                    .fluent()
                    .update()
                    .in_col(write.collection)
                    .precondition(FirestoreWritePrecondition::Exists(false))
                    .document_id(&write.id)
                    .object(&write.document)
                    .add_to_transaction(&mut transaction),
            }
            .map_err(|e| store_error(write.collection, &write.id, e))?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| store_error(batch_collection(&batch), "*", e))?;

        tracing::debug!(count, "Committed write batch");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        first_name: &'static str,
        max_participants: Option<u32>,
    }

    #[test]
    fn test_typed_document_becomes_json_object() {
        let doc = to_document(
            "users",
            "1",
            &Sample {
                first_name: "Ada",
                max_participants: None,
            },
        )
        .unwrap();
        assert_eq!(doc, json!({ "firstName": "Ada", "maxParticipants": null }));
    }

    #[test]
    fn test_unserializable_document_is_reported() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), "tuple keys are not strings");

        let err = to_document("scratch", "x", &bad).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(msg) if msg.starts_with("scratch/x")));
    }

    #[tokio::test]
    async fn test_offline_writes_fail_as_unavailable() {
        let store = FirestoreStore::new_mock();
        let doc = Sample {
            first_name: "Ada",
            max_participants: Some(3),
        };

        assert!(matches!(
            store.set("users", "1", &doc).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.create("users", "1", &doc).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
