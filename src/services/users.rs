// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User directory service.
//!
//! Records are keyed by the decimal Telegram ID, so login upserts and the
//! legacy backfill converge on the same document for a given user.

use crate::db::{collections, DocumentStore, FieldFilter, OrderBy, StoreError};
use crate::error::ServiceError;
use crate::models::{LegacyEventRef, LoginIdentity, Role, UserRecord};
use crate::services::roles::{ResolvedRole, RolePolicy};
use crate::time_utils::{format_utc_rfc3339, utc_now_millis};
use chrono::Utc;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Concurrent existence checks during the legacy backfill.
const MAX_CONCURRENT_LOOKUPS: usize = 10;

/// First name given to backfilled users whose events carry no organizer name.
pub const FALLBACK_FIRST_NAME: &str = "Unknown user";

const ROLE: &str = "role";
const IS_ACTIVE: &str = "isActive";
const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// Outcome of a legacy backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub created: usize,
    pub errors: usize,
}

/// Both role answers produced while opening a session.
#[derive(Debug, Clone)]
pub struct SessionRoles {
    /// Resolved before the directory read, from the payload and allowlist.
    pub optimistic: ResolvedRole,
    /// Resolved with the stored role. Equals `optimistic` if the upsert failed.
    pub authoritative: ResolvedRole,
    pub user: Option<UserRecord>,
}

/// User directory on top of a document store.
#[derive(Clone)]
pub struct UserDirectory<S> {
    store: S,
    policy: RolePolicy,
}

impl<S: DocumentStore> UserDirectory<S> {
    pub fn new(store: S, policy: RolePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RolePolicy {
        &self.policy
    }

    /// Fetch one record. Missing, malformed and unreadable records yield `None`.
    pub async fn get(&self, telegram_id: u64) -> Option<UserRecord> {
        let key = UserRecord::document_id(telegram_id);
        match self.store.get_by_id(collections::USERS, &key).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(telegram_id, error = %e, "Failed to load user");
                None
            }
        }
    }

    /// Create or refresh the caller's record from a login payload.
    ///
    /// Returns `None` (and logs) on store failure; callers keep working
    /// without a directory record.
    pub async fn upsert_from_login(&self, identity: &LoginIdentity) -> Option<UserRecord> {
        match self.try_upsert(identity).await {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::error!(telegram_id = identity.id, error = %e, "Failed to upsert user");
                None
            }
        }
    }

    async fn try_upsert(&self, identity: &LoginIdentity) -> Result<UserRecord, StoreError> {
        let key = UserRecord::document_id(identity.id);
        let existing: Option<UserRecord> = self.store.get_by_id(collections::USERS, &key).await?;
        let now = utc_now_millis();

        let mut record = match existing {
            Some(record) => record,
            None => {
                let record = UserRecord {
                    telegram_id: identity.id,
                    first_name: identity.first_name.clone(),
                    last_name: identity.last_name.clone(),
                    username: identity.username.clone(),
                    role: self.policy.initial_role(identity),
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                    last_login_at: Some(now),
                };
                match self.store.create(collections::USERS, &key, &record).await {
                    Ok(()) => {
                        tracing::info!(
                            telegram_id = identity.id,
                            role = %record.role,
                            "User created"
                        );
                        return Ok(record);
                    }
                    // Someone else created the record after our read; merge into theirs.
                    Err(StoreError::AlreadyExists { .. }) => {
                        tracing::debug!(telegram_id = identity.id, "User created concurrently");
                        self.store
                            .get_by_id(collections::USERS, &key)
                            .await?
                            .ok_or_else(|| StoreError::NotFound {
                                collection: collections::USERS.to_string(),
                                id: key.clone(),
                            })?
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        // Only fields present in the payload are written; role and createdAt stay.
        let stamp = Value::String(format_utc_rfc3339(now));
        let mut fields = Map::new();
        fields.insert(
            "firstName".to_string(),
            Value::String(identity.first_name.clone()),
        );
        record.first_name = identity.first_name.clone();
        if let Some(last_name) = &identity.last_name {
            fields.insert("lastName".to_string(), Value::String(last_name.clone()));
            record.last_name = Some(last_name.clone());
        }
        if let Some(username) = &identity.username {
            fields.insert("username".to_string(), Value::String(username.clone()));
            record.username = Some(username.clone());
        }
        fields.insert("lastLoginAt".to_string(), stamp.clone());
        fields.insert(UPDATED_AT.to_string(), stamp);
        record.last_login_at = Some(now);
        record.updated_at = now;

        self.store.update(collections::USERS, &key, fields).await?;
        tracing::debug!(telegram_id = identity.id, "User login recorded");
        Ok(record)
    }

    /// Open a session: resolve optimistically, upsert, then resolve again.
    pub async fn start_session(&self, identity: &LoginIdentity) -> SessionRoles {
        let optimistic = self.policy.resolve(Some(identity), None);
        let user = self.upsert_from_login(identity).await;
        let authoritative = self
            .policy
            .resolve(Some(identity), user.as_ref().map(|u| u.role));

        if optimistic.role != authoritative.role {
            tracing::info!(
                telegram_id = identity.id,
                optimistic = %optimistic.role,
                authoritative = %authoritative.role,
                "Stored role overrides optimistic role"
            );
        }

        SessionRoles {
            optimistic,
            authoritative,
            user,
        }
    }

    /// Change the role of an existing user.
    pub async fn set_role(&self, telegram_id: u64, role: Role) -> Result<(), ServiceError> {
        self.patch_existing(telegram_id, ROLE, Value::String(role.as_str().to_string()))
            .await?;
        tracing::info!(telegram_id, role = %role, "User role changed");
        Ok(())
    }

    pub async fn promote_to_admin(&self, telegram_id: u64) -> Result<(), ServiceError> {
        self.set_role(telegram_id, Role::Admin).await
    }

    pub async fn demote_from_admin(&self, telegram_id: u64) -> Result<(), ServiceError> {
        self.set_role(telegram_id, Role::User).await
    }

    /// Toggle the soft-active flag.
    pub async fn set_active(&self, telegram_id: u64, active: bool) -> Result<(), ServiceError> {
        self.patch_existing(telegram_id, IS_ACTIVE, Value::Bool(active))
            .await?;
        tracing::info!(telegram_id, active, "User active flag changed");
        Ok(())
    }

    /// Every user, newest first. Empty on store failure.
    pub async fn list_all(&self) -> Vec<UserRecord> {
        self.list(Vec::new()).await
    }

    /// Active admins, newest first. Empty on store failure.
    pub async fn list_admins(&self) -> Vec<UserRecord> {
        self.list(vec![
            FieldFilter::eq(ROLE, Role::Admin.as_str()),
            FieldFilter::eq(IS_ACTIVE, true),
        ])
        .await
    }

    /// Backfill directory records for every legacy event creator.
    ///
    /// Existing records are never touched. New records are committed in one
    /// batch, so a failed commit creates nothing.
    pub async fn migrate_from_legacy_events(&self) -> MigrationReport {
        let docs: Vec<Value> = match self
            .store
            .query_where(collections::EVENTS, Vec::new(), None)
            .await
        {
            Ok(docs) => docs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to scan events for backfill");
                return MigrationReport {
                    created: 0,
                    errors: 1,
                };
            }
        };

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for doc in docs {
            let reference = match serde_json::from_value::<LegacyEventRef>(doc) {
                Ok(reference) => reference,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping event with unreadable creator");
                    continue;
                }
            };
            let Some(creator_id) = reference.creator_id else {
                continue;
            };
            if seen.insert(creator_id) {
                candidates.push((creator_id, reference.organizer));
            }
        }

        let store = &self.store;
        let lookups: Vec<_> = stream::iter(candidates)
            .map(|(creator_id, organizer)| async move {
                let key = UserRecord::document_id(creator_id);
                let existing: Result<Option<Value>, StoreError> =
                    store.get_by_id(collections::USERS, &key).await;
                (creator_id, organizer, existing)
            })
            .buffered(MAX_CONCURRENT_LOOKUPS)
            .collect()
            .await;

        let now = utc_now_millis();
        let mut batch = self.store.batch();
        let mut errors = 0;
        for (creator_id, organizer, existing) in lookups {
            match existing {
                Ok(Some(_)) => {}
                Ok(None) => {
                    let first_name = organizer
                        .map(|name| name.trim().to_string())
                        .filter(|name| !name.is_empty())
                        .unwrap_or_else(|| FALLBACK_FIRST_NAME.to_string());
                    let record = UserRecord {
                        telegram_id: creator_id,
                        first_name,
                        last_name: None,
                        username: None,
                        role: Role::User,
                        is_active: true,
                        created_at: now,
                        updated_at: now,
                        last_login_at: None,
                    };
                    let key = UserRecord::document_id(creator_id);
                    if let Err(e) = batch.create(collections::USERS, key, &record) {
                        tracing::warn!(telegram_id = creator_id, error = %e, "Could not stage user");
                        errors += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(telegram_id = creator_id, error = %e, "Failed to check user");
                    errors += 1;
                }
            }
        }

        let staged = batch.len();
        if staged == 0 {
            tracing::info!(errors, "Backfill found no users to create");
            return MigrationReport { created: 0, errors };
        }

        match self.store.commit_batch(batch).await {
            Ok(created) => {
                tracing::info!(created, errors, "Backfill committed");
                MigrationReport { created, errors }
            }
            Err(e) => {
                tracing::error!(staged, error = %e, "Backfill commit failed");
                MigrationReport {
                    created: 0,
                    errors: errors + staged,
                }
            }
        }
    }

    // ─── Helper Methods ────────────────────────────────────────────

    async fn patch_existing(
        &self,
        telegram_id: u64,
        field: &str,
        value: Value,
    ) -> Result<(), ServiceError> {
        let key = UserRecord::document_id(telegram_id);
        let existing: Option<Value> = self.store.get_by_id(collections::USERS, &key).await?;
        if existing.is_none() {
            return Err(ServiceError::NotFound(format!("user {telegram_id}")));
        }

        let mut fields = Map::new();
        fields.insert(field.to_string(), value);
        fields.insert(
            UPDATED_AT.to_string(),
            Value::String(format_utc_rfc3339(Utc::now())),
        );
        self.store.update(collections::USERS, &key, fields).await?;
        Ok(())
    }

    async fn list(&self, filters: Vec<FieldFilter>) -> Vec<UserRecord> {
        let docs: Vec<Value> = match self
            .store
            .query_where(collections::USERS, filters, Some(OrderBy::desc(CREATED_AT)))
            .await
        {
            Ok(docs) => docs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list users");
                return Vec::new();
            }
        };

        let mut records: Vec<UserRecord> = docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<UserRecord>(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed user document");
                    None
                }
            })
            .collect();
        // Same ordering for legacy records whose timestamps are not fixed-width strings.
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }
}
