// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event registry service.
//!
//! Handles the registration workflow:
//! 1. Guard against a second confirmed participation for the same pair
//! 2. Check the event exists, is active and has room (enforcing mode only)
//! 3. Create the participation record (the durability point)
//! 4. Bump the event's participant counter
//!
//! Step 4 is not atomic with step 3 and the capacity check in step 2 reads a
//! cached counter, so two concurrent registrations can both pass the check
//! and over-subscribe an event. The counter is a best-effort cache.

use crate::db::{collections, DocumentStore, FieldFilter, OrderBy, StoreError};
use crate::error::ServiceError;
use crate::models::{Event, EventDraft, Participation, ParticipationStatus};
use crate::time_utils::{format_utc_rfc3339, utc_now_millis};
use chrono::Utc;
use serde_json::{Map, Value};
use std::str::FromStr;

/// Attempts for the compare-and-set counter fallback.
pub const MAX_COUNTER_RETRIES: usize = 3;

const IS_ACTIVE: &str = "isActive";
const DATE: &str = "date";
const UPDATED_AT: &str = "updatedAt";
const CURRENT_PARTICIPANTS: &str = "currentParticipants";
const EVENT_ID: &str = "eventId";
const USER_ID: &str = "userId";
const STATUS: &str = "status";

/// What to do when a registration arrives for an event at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityPolicy {
    /// Reject full, inactive or unknown events before writing anything.
    #[default]
    Enforce,
    /// Write the participation first and never reject on capacity.
    Permissive,
}

impl FromStr for CapacityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforce" => Ok(CapacityPolicy::Enforce),
            "permissive" => Ok(CapacityPolicy::Permissive),
            other => Err(format!("unknown capacity policy '{other}'")),
        }
    }
}

/// Event listing, creation and registration on top of a document store.
#[derive(Clone)]
pub struct EventRegistry<S> {
    store: S,
    capacity_policy: CapacityPolicy,
}

impl<S: DocumentStore> EventRegistry<S> {
    pub fn new(store: S, capacity_policy: CapacityPolicy) -> Self {
        Self {
            store,
            capacity_policy,
        }
    }

    pub fn capacity_policy(&self) -> CapacityPolicy {
        self.capacity_policy
    }

    /// Active events, soonest first. Empty on store failure.
    pub async fn list_active(&self) -> Vec<Event> {
        let docs: Vec<Value> = match self
            .store
            .query_where(
                collections::EVENTS,
                vec![FieldFilter::eq(IS_ACTIVE, true)],
                Some(OrderBy::asc(DATE)),
            )
            .await
        {
            Ok(docs) => docs,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list active events");
                return Vec::new();
            }
        };

        let mut events: Vec<Event> = docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<Event>(doc) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed event document");
                    None
                }
            })
            .collect();
        // Legacy dates are stored in other representations, which the store orders apart.
        events.sort_by_key(|event| event.date);
        events
    }

    /// Fetch an event. Missing, malformed and unreadable documents all yield `None`.
    pub async fn get_by_id(&self, event_id: &str) -> Option<Event> {
        match self.load_event(event_id).await {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(event_id, error = %e, "Failed to load event");
                None
            }
        }
    }

    /// Validate and store a new event, returning its generated ID.
    pub async fn create(&self, draft: EventDraft) -> Result<String, ServiceError> {
        let now = utc_now_millis();
        let draft = draft.trimmed();
        let date = draft.check(now).inspect_err(|e| {
            tracing::info!(field = e.field, reason = %e.message, "Rejected event draft");
        })?;

        let event = draft.into_event(date, now);
        let event_id = self
            .store
            .insert(collections::EVENTS, &event)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create event");
                ServiceError::from(e)
            })?;

        tracing::info!(
            event_id = %event_id,
            creator_id = ?event.creator_id,
            capacity = ?event.max_participants,
            "Event created"
        );
        Ok(event_id)
    }

    /// Register a user for an event.
    pub async fn register(&self, event_id: &str, user_id: u64) -> Result<(), ServiceError> {
        let result = match self.capacity_policy {
            CapacityPolicy::Enforce => self.register_enforced(event_id, user_id).await,
            CapacityPolicy::Permissive => self.register_permissive(event_id, user_id).await,
        };

        match &result {
            Ok(()) => tracing::info!(event_id, user_id, "User registered for event"),
            Err(ServiceError::StoreUnavailable(msg)) => {
                tracing::error!(event_id, user_id, error = %msg, "Registration failed")
            }
            Err(e) => tracing::info!(event_id, user_id, outcome = %e, "Registration refused"),
        }
        result
    }

    async fn register_enforced(&self, event_id: &str, user_id: u64) -> Result<(), ServiceError> {
        if self.find_confirmed(event_id, user_id).await? {
            return Err(ServiceError::AlreadyRegistered);
        }

        let event = self
            .load_event(event_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("event {event_id}")))?;
        if !event.is_active {
            return Err(ServiceError::EventInactive);
        }
        if event.is_full() {
            return Err(ServiceError::EventFull);
        }

        self.write_participation(event_id, user_id).await?;
        self.bump_counter(event_id).await;
        Ok(())
    }

    async fn register_permissive(&self, event_id: &str, user_id: u64) -> Result<(), ServiceError> {
        self.write_participation(event_id, user_id).await?;

        // The participation stands even if the event is gone.
        match self.load_event(event_id).await {
            Ok(Some(_)) => {
                self.bump_counter(event_id).await;
            }
            Ok(None) => {
                tracing::warn!(event_id, user_id, "Registered for unknown event");
            }
            Err(e) => {
                tracing::warn!(event_id, error = %e, "Could not read event after registration");
            }
        }
        Ok(())
    }

    /// Whether a confirmed participation exists for the pair. `false` on store failure.
    pub async fn is_registered(&self, event_id: &str, user_id: u64) -> bool {
        match self.find_confirmed(event_id, user_id).await {
            Ok(registered) => registered,
            Err(e) => {
                tracing::error!(event_id, user_id, error = %e, "Failed to check registration");
                false
            }
        }
    }

    /// Soft-delete an event by clearing its active flag.
    pub async fn deactivate(&self, event_id: &str) -> Result<(), ServiceError> {
        let exists: Option<Value> = self.store.get_by_id(collections::EVENTS, event_id).await?;
        if exists.is_none() {
            return Err(ServiceError::NotFound(format!("event {event_id}")));
        }

        let mut fields = Map::new();
        fields.insert(IS_ACTIVE.to_string(), Value::Bool(false));
        fields.insert(
            UPDATED_AT.to_string(),
            Value::String(format_utc_rfc3339(Utc::now())),
        );
        self.store
            .update(collections::EVENTS, event_id, fields)
            .await?;

        tracing::info!(event_id, "Event deactivated");
        Ok(())
    }

    // ─── Helper Methods ────────────────────────────────────────────

    async fn load_event(&self, event_id: &str) -> Result<Option<Event>, StoreError> {
        match self.store.get_by_id(collections::EVENTS, event_id).await {
            Err(StoreError::Malformed(reason)) => {
                tracing::warn!(event_id, reason = %reason, "Treating malformed event as missing");
                Ok(None)
            }
            other => other,
        }
    }

    async fn find_confirmed(&self, event_id: &str, user_id: u64) -> Result<bool, StoreError> {
        let records: Vec<Value> = self
            .store
            .query_where(
                collections::PARTICIPANTS,
                vec![
                    FieldFilter::eq(EVENT_ID, event_id),
                    FieldFilter::eq(USER_ID, user_id),
                    FieldFilter::eq(STATUS, "confirmed"),
                ],
                None,
            )
            .await?;
        Ok(!records.is_empty())
    }

    /// Create the pair's participation record.
    ///
    /// The key is deterministic, so a concurrent duplicate fails at the store.
    /// A cancelled record for the pair is replaced by a fresh confirmed one.
    async fn write_participation(&self, event_id: &str, user_id: u64) -> Result<(), ServiceError> {
        let key = Participation::document_id(event_id, user_id);
        let record = Participation::confirmed(event_id, user_id, utc_now_millis());

        match self
            .store
            .create(collections::PARTICIPANTS, &key, &record)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::AlreadyExists { .. }) => {
                let existing: Option<Participation> =
                    self.store.get_by_id(collections::PARTICIPANTS, &key).await?;
                match existing.map(|p| p.status) {
                    Some(ParticipationStatus::Cancelled) => {
                        self.store
                            .set(collections::PARTICIPANTS, &key, &record)
                            .await?;
                        tracing::debug!(event_id, user_id, "Replaced cancelled participation");
                        Ok(())
                    }
                    _ => Err(ServiceError::AlreadyRegistered),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Add one to the event's counter. Failures are logged, never returned.
    async fn bump_counter(&self, event_id: &str) -> bool {
        let bumped = match self
            .store
            .increment(collections::EVENTS, event_id, CURRENT_PARTICIPANTS, 1)
            .await
        {
            Ok(()) => true,
            Err(StoreError::Unsupported(_)) => self.bump_counter_with_cas(event_id).await,
            Err(e) => {
                tracing::warn!(event_id, error = %e, "Failed to increment participant counter");
                false
            }
        };

        if bumped {
            let mut fields = Map::new();
            fields.insert(
                UPDATED_AT.to_string(),
                Value::String(format_utc_rfc3339(Utc::now())),
            );
            if let Err(e) = self
                .store
                .update(collections::EVENTS, event_id, fields)
                .await
            {
                tracing::warn!(event_id, error = %e, "Failed to touch event timestamp");
            }
        }
        bumped
    }

    /// Read-then-conditional-write fallback for stores without `increment`.
    async fn bump_counter_with_cas(&self, event_id: &str) -> bool {
        for attempt in 1..=MAX_COUNTER_RETRIES {
            let doc: Value = match self.store.get_by_id(collections::EVENTS, event_id).await {
                Ok(Some(doc)) => doc,
                Ok(None) => {
                    tracing::warn!(event_id, "Event vanished before counter update");
                    return false;
                }
                Err(e) => {
                    tracing::warn!(event_id, error = %e, "Failed to read participant counter");
                    return false;
                }
            };

            let expected = doc.get(CURRENT_PARTICIPANTS).cloned().unwrap_or(Value::Null);
            let next = expected.as_u64().unwrap_or(0) + 1;

            match self
                .store
                .compare_and_set(
                    collections::EVENTS,
                    event_id,
                    CURRENT_PARTICIPANTS,
                    expected,
                    Value::from(next),
                )
                .await
            {
                Ok(true) => return true,
                Ok(false) => {
                    tracing::debug!(event_id, attempt, "Participant counter moved, retrying");
                }
                Err(e) => {
                    tracing::warn!(event_id, error = %e, "Failed to write participant counter");
                    return false;
                }
            }
        }

        tracing::warn!(
            event_id,
            attempts = MAX_COUNTER_RETRIES,
            "Gave up on participant counter; cached count is now low"
        );
        false
    }
}
