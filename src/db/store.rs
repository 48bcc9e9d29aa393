// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document store abstraction shared by the Firestore and in-memory backends.
//!
//! Services are generic over [`DocumentStore`], which covers:
//! - keyed reads and full/partial writes
//! - field-predicate and ordered queries
//! - optional atomic counter increments
//! - all-or-nothing write batches

use ring::rand::{SecureRandom, SystemRandom};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

/// Field injected into every read document carrying its key.
///
/// Firestore's serde integration fills this field, and models pick it up
/// with `#[serde(alias = "_firestore_id")]`.
pub const DOC_ID_FIELD: &str = "_firestore_id";

/// Firestore rejects transactions/batches with more than 500 writes.
pub const MAX_BATCH_WRITES: usize = 500;

const DOC_ID_LEN: usize = 20;
const DOC_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Errors raised by a document store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Operation not supported by this store: {0}")]
    Unsupported(&'static str),

    #[error("Write batch exceeds the store limit of 500 writes")]
    BatchTooLarge,
}

/// Comparison operator for a field predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// A single `field <op> value` predicate. Multiple filters are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: &'static str,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn new(field: &'static str, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Equal, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: &'static str) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: &'static str) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }
}

/// How a staged write treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchWriteKind {
    /// Full upsert.
    Set,
    /// Insert only; the whole batch fails if the document exists.
    Create,
}

/// A staged full-document write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWrite {
    pub kind: BatchWriteKind,
    pub collection: &'static str,
    pub id: String,
    pub document: Value,
}

/// Group of writes committed together or not at all.
///
/// Obtained from [`DocumentStore::batch`] and consumed by
/// [`DocumentStore::commit_batch`]. Staging is purely local; nothing reaches
/// the store until commit.
#[derive(Debug, Default)]
pub struct WriteBatch {
    writes: Vec<BatchWrite>,
}

impl WriteBatch {
    /// Stage a full-document upsert.
    pub fn set<T: Serialize>(
        &mut self,
        collection: &'static str,
        id: impl Into<String>,
        document: &T,
    ) -> Result<(), StoreError> {
        self.stage(BatchWriteKind::Set, collection, id.into(), document)
    }

    /// Stage an insert that must not find an existing document at commit time.
    pub fn create<T: Serialize>(
        &mut self,
        collection: &'static str,
        id: impl Into<String>,
        document: &T,
    ) -> Result<(), StoreError> {
        self.stage(BatchWriteKind::Create, collection, id.into(), document)
    }

    fn stage<T: Serialize>(
        &mut self,
        kind: BatchWriteKind,
        collection: &'static str,
        id: String,
        document: &T,
    ) -> Result<(), StoreError> {
        if self.writes.len() >= MAX_BATCH_WRITES {
            return Err(StoreError::BatchTooLarge);
        }
        let document =
            serde_json::to_value(document).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.writes.push(BatchWrite {
            kind,
            collection,
            id,
            document,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[BatchWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<BatchWrite> {
        self.writes
    }
}

/// Generate a 20-character alphanumeric document ID (Firestore auto-ID shape).
pub fn new_document_id() -> Result<String, StoreError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; DOC_ID_LEN];
    rng.fill(&mut bytes)
        .map_err(|_| StoreError::Unavailable("System RNG failure".to_string()))?;

    Ok(bytes
        .iter()
        .map(|b| DOC_ID_ALPHABET[usize::from(*b) % DOC_ID_ALPHABET.len()] as char)
        .collect())
}

/// Keyed-document store consumed by the services.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Fetch a document by key. `Ok(None)` if it does not exist.
    fn get_by_id<T>(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<T>, StoreError>> + Send
    where
        T: DeserializeOwned + Send;

    /// Query documents matching all `filters`, optionally ordered.
    fn query_where<T>(
        &self,
        collection: &str,
        filters: Vec<FieldFilter>,
        order: Option<OrderBy>,
    ) -> impl Future<Output = Result<Vec<T>, StoreError>> + Send
    where
        T: DeserializeOwned + Send;

    /// All documents in a collection ordered by one field.
    fn query_ordered_by<T>(
        &self,
        collection: &str,
        field: &'static str,
        direction: SortDirection,
    ) -> impl Future<Output = Result<Vec<T>, StoreError>> + Send
    where
        T: DeserializeOwned + Send,
    {
        self.query_where(collection, Vec::new(), Some(OrderBy { field, direction }))
    }

    /// Full upsert of a document.
    fn set<T>(
        &self,
        collection: &str,
        id: &str,
        document: &T,
    ) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        T: Serialize + Sync;

    /// Merge top-level fields into an existing document.
    fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert at an explicit key. Fails with [`StoreError::AlreadyExists`].
    fn create<T>(
        &self,
        collection: &str,
        id: &str,
        document: &T,
    ) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        T: Serialize + Sync;

    /// Insert under a generated key and return it.
    fn insert<T>(
        &self,
        collection: &str,
        document: &T,
    ) -> impl Future<Output = Result<String, StoreError>> + Send
    where
        T: Serialize + Sync,
    {
        async move {
            let id = new_document_id()?;
            self.create(collection, &id, document).await?;
            Ok(id)
        }
    }

    /// Transactionally add `delta` to a numeric field.
    ///
    /// Backends without a native primitive keep this default, and callers
    /// fall back to [`DocumentStore::compare_and_set`].
    fn increment(
        &self,
        _collection: &str,
        _id: &str,
        _field: &'static str,
        _delta: i64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async { Err(StoreError::Unsupported("increment")) }
    }

    /// Write `new` into `field` only if it currently equals `expected`.
    ///
    /// Returns `Ok(false)` when the comparison fails. The default is a plain
    /// read followed by a write, so a concurrent writer can still slip in
    /// between the two.
    fn compare_and_set(
        &self,
        collection: &str,
        id: &str,
        field: &'static str,
        expected: Value,
        new: Value,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        async move {
            let current: Option<Value> = self.get_by_id(collection, id).await?;
            let Some(current) = current else {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            };
            if current.get(field).unwrap_or(&Value::Null) != &expected {
                return Ok(false);
            }

            let mut fields = Map::new();
            fields.insert(field.to_string(), new);
            self.update(collection, id, fields).await?;
            Ok(true)
        }
    }

    /// Start an empty write batch scoped to the caller.
    fn batch(&self) -> WriteBatch {
        WriteBatch::default()
    }

    /// Commit every staged write atomically. Returns the number of writes.
    fn commit_batch(
        &self,
        batch: WriteBatch,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_ids_are_alphanumeric() {
        let a = new_document_id().unwrap();
        let b = new_document_id().unwrap();

        assert_eq!(a.len(), DOC_ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_batch_rejects_writes_past_limit() {
        let mut batch = WriteBatch::default();
        for i in 0..MAX_BATCH_WRITES {
            batch
                .set("users", i.to_string(), &serde_json::json!({ "n": i }))
                .unwrap();
        }

        let overflow = batch.set("users", "one-too-many", &serde_json::json!({}));
        assert!(matches!(overflow, Err(StoreError::BatchTooLarge)));
        assert_eq!(batch.len(), MAX_BATCH_WRITES);
    }
}
