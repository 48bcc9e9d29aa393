// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store.
//!
//! Mirrors the Firestore semantics the services rely on (missing-field
//! exclusion from ordered queries, create-if-absent, atomic batches) so the
//! services can be exercised without the emulator. All collections live
//! behind one lock that is never held across an `.await`.

use crate::db::store::{
    BatchWrite, BatchWriteKind, DocumentStore, FieldFilter, FilterOp, OrderBy, SortDirection,
    StoreError, WriteBatch, DOC_ID_FIELD, MAX_BATCH_WRITES,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = HashMap<String, BTreeMap<String, Value>>;

#[derive(Default)]
struct Inner {
    collections: RwLock<Collections>,
    offline: AtomicBool,
    fail_next_commit: AtomicBool,
}

/// Shared in-memory store. Clones see the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
    atomic_increment: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            atomic_increment: true,
        }
    }

    /// Behave like a backend without a transactional increment primitive.
    pub fn without_atomic_increment(mut self) -> Self {
        self.atomic_increment = false;
        self
    }

    /// Simulate an unreachable backend: every operation fails.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Make the next batch commit fail without applying any write.
    pub fn fail_next_commit(&self) {
        self.inner.fail_next_commit.store(true, AtomicOrdering::SeqCst);
    }

    /// Number of documents in a collection.
    pub fn document_count(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .map(|c| c.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.inner.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable(
                "Memory store is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StoreError> {
        self.check_online()?;
        self.inner
            .collections
            .read()
            .map_err(|_| StoreError::Unavailable("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StoreError> {
        self.check_online()?;
        self.inner
            .collections
            .write()
            .map_err(|_| StoreError::Unavailable("Memory store lock poisoned".to_string()))
    }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

fn encode<T: Serialize>(document: &T) -> Result<Value, StoreError> {
    let value =
        serde_json::to_value(document).map_err(|e| StoreError::Serialization(e.to_string()))?;
    if !value.is_object() {
        return Err(StoreError::Serialization(
            "Documents must serialize to a map".to_string(),
        ));
    }
    Ok(value)
}

/// Deserialize a stored document, exposing its key the way Firestore does.
fn decode<T: DeserializeOwned>(id: &str, mut document: Value) -> Result<T, StoreError> {
    if let Value::Object(map) = &mut document {
        map.insert(DOC_ID_FIELD.to_string(), Value::String(id.to_string()));
    }
    serde_json::from_value(document).map_err(|e| StoreError::Malformed(format!("{id}: {e}")))
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn matches(document: &Value, filter: &FieldFilter) -> bool {
    // Firestore never matches documents that lack the filtered field.
    let Some(actual) = document.get(filter.field) else {
        return false;
    };
    let ordering = compare_values(actual, &filter.value);
    let equal = ordering == Some(Ordering::Equal) || actual == &filter.value;

    match filter.op {
        FilterOp::Equal => equal,
        FilterOp::NotEqual => !equal,
        FilterOp::LessThan => ordering == Some(Ordering::Less),
        FilterOp::LessThanOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        FilterOp::GreaterThan => ordering == Some(Ordering::Greater),
        FilterOp::GreaterThanOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
    }
}

impl DocumentStore for MemoryStore {
    async fn get_by_id<T>(&self, collection: &str, id: &str) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned + Send,
    {
        let document = self
            .read()?
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned();

        document.map(|doc| decode(id, doc)).transpose()
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
        let mut hits: Vec<(String, Value)> = {
            let guard = self.read()?;
            let Some(docs) = guard.get(collection) else {
                return Ok(Vec::new());
            };
            docs.iter()
                .filter(|(_, doc)| filters.iter().all(|f| matches(doc, f)))
                .filter(|(_, doc)| order.map_or(true, |o| doc.get(o.field).is_some()))
                .map(|(id, doc)| (id.clone(), doc.clone()))
                .collect()
        };

        if let Some(order) = order {
            hits.sort_by(|(_, a), (_, b)| {
                let ordering = compare_values(&a[order.field], &b[order.field])
                    .unwrap_or(Ordering::Equal);
                match order.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }

        hits.into_iter().map(|(id, doc)| decode(&id, doc)).collect()
    }

    async fn set<T>(&self, collection: &str, id: &str, document: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let value = encode(document)?;
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), value);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let mut guard = self.write()?;
        let document = guard
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;

        let Value::Object(existing) = document else {
            return Err(StoreError::Malformed(format!("{collection}/{id} is not a map")));
        };
        existing.extend(fields);
        Ok(())
    }

    async fn create<T>(&self, collection: &str, id: &str, document: &T) -> Result<(), StoreError>
    where
        T: Serialize + Sync,
    {
        let value = encode(document)?;
        let mut guard = self.write()?;
        let docs = guard.entry(collection.to_string()).or_default();
        if docs.contains_key(id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        docs.insert(id.to_string(), value);
        Ok(())
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &'static str,
        delta: i64,
    ) -> Result<(), StoreError> {
        if !self.atomic_increment {
            return Err(StoreError::Unsupported("increment"));
        }

        let mut guard = self.write()?;
        let document = guard
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;

        let current = match document.get(field) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_i64().ok_or_else(|| {
                StoreError::Malformed(format!("{collection}/{id}.{field} is not an integer"))
            })?,
        };
        let Value::Object(map) = document else {
            return Err(StoreError::Malformed(format!("{collection}/{id} is not a map")));
        };
        map.insert(field.to_string(), Value::from(current + delta));
        Ok(())
    }

    async fn compare_and_set(
        &self,
        collection: &str,
        id: &str,
        field: &'static str,
        expected: Value,
        new: Value,
    ) -> Result<bool, StoreError> {
        let mut guard = self.write()?;
        let document = guard
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;

        let Value::Object(map) = document else {
            return Err(StoreError::Malformed(format!("{collection}/{id} is not a map")));
        };
        if map.get(field).unwrap_or(&Value::Null) != &expected {
            return Ok(false);
        }
        map.insert(field.to_string(), new);
        Ok(true)
    }

    async fn commit_batch(&self, batch: WriteBatch) -> Result<usize, StoreError> {
        self.check_online()?;
        if self.inner.fail_next_commit.swap(false, AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable(
                "Injected batch commit failure".to_string(),
            ));
        }
        if batch.len() > MAX_BATCH_WRITES {
            return Err(StoreError::BatchTooLarge);
        }

        let writes = batch.into_writes();
        let count = writes.len();
        let mut guard = self.write()?;

        // Check every precondition before applying anything.
        for write in writes.iter().filter(|w| w.kind == BatchWriteKind::Create) {
            let exists = guard
                .get(write.collection)
                .is_some_and(|docs| docs.contains_key(&write.id));
            if exists {
                return Err(StoreError::AlreadyExists {
                    collection: write.collection.to_string(),
                    id: write.id.clone(),
                });
            }
        }

        for BatchWrite {
            collection,
            id,
            document,
            ..
        } in writes
        {
            guard
                .entry(collection.to_string())
                .or_default()
                .insert(id, document);
        }
        Ok(count)
    }
}
