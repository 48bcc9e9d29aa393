// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event and participation models.

use crate::error::ValidationError;
use crate::time_utils::{rfc3339, rfc3339_opt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Conference,
    Workshop,
    Meetup,
    Webinar,
    Networking,
    Training,
    #[default]
    Other,
}

/// Event record stored in the `events` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Document key, filled in on read
    #[serde(default, alias = "_firestore_id", skip_serializing)]
    pub id: String,
    pub title: String,
    pub description: String,
    /// Scheduled date/time
    #[serde(with = "rfc3339")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Capacity; `None` means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
    /// Incremented on registration, never recomputed
    #[serde(default)]
    pub current_participants: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub category: EventCategory,
    /// Organizer identity; absent for anonymous creators
    #[serde(
        default,
        deserialize_with = "deserialize_legacy_identity",
        skip_serializing_if = "Option::is_none"
    )]
    pub creator_id: Option<u64>,
    /// Organizer display name or free-text contact
    #[serde(default)]
    pub organizer: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(with = "rfc3339")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "rfc3339")]
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Whether the counter has reached capacity.
    pub fn is_full(&self) -> bool {
        self.max_participants
            .is_some_and(|max| self.current_participants >= max)
    }
}

/// Input for creating an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[serde(default, with = "rfc3339_opt")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub image: Option<String>,
    #[validate(range(min = 1, message = "maxParticipants must be at least 1"))]
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub category: EventCategory,
    #[serde(default)]
    pub creator_id: Option<u64>,
    /// Display name, or contact text for anonymous creators
    #[serde(default)]
    pub organizer: Option<String>,
}

/// Field-level checks in reporting order.
const DERIVED_CHECKS: [(&str, &str); 3] = [
    ("title", "title"),
    ("description", "description"),
    ("max_participants", "maxParticipants"),
];

impl EventDraft {
    /// Copy of the draft with surrounding whitespace removed from text fields.
    pub fn trimmed(&self) -> Self {
        let mut draft = self.clone();
        draft.title = draft.title.trim().to_string();
        draft.description = draft.description.trim().to_string();
        draft.location = draft.location.trim().to_string();
        draft.organizer = draft
            .organizer
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty());
        draft
    }

    /// Validate against the current time; returns the scheduled date.
    pub fn check(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        if let Err(errors) = self.validate() {
            let fields = errors.field_errors();
            let (_, field) = DERIVED_CHECKS
                .into_iter()
                .find(|(rust_name, _)| fields.contains_key(*rust_name))
                .unwrap_or(("", "draft"));
            let message = errors.to_string();
            return Err(ValidationError::new(field, message));
        }

        let date = self
            .date
            .ok_or_else(|| ValidationError::new("date", "date is required"))?;
        if date <= now {
            return Err(ValidationError::new("date", "date must be in the future"));
        }

        if self.creator_id.is_none() && self.organizer.is_none() {
            return Err(ValidationError::new(
                "organizer",
                "creatorId or organizer contact is required",
            ));
        }

        Ok(date)
    }

    /// Build the stored record. Call [`EventDraft::check`] first.
    pub fn into_event(self, date: DateTime<Utc>, now: DateTime<Utc>) -> Event {
        Event {
            id: String::new(),
            title: self.title,
            description: self.description,
            date,
            location: self.location,
            image: self.image,
            max_participants: self.max_participants,
            current_participants: 0,
            price: self.price,
            category: self.category,
            creator_id: self.creator_id,
            organizer: self.organizer.unwrap_or_default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationStatus {
    Confirmed,
    /// Reserved; nothing creates waitlist entries yet
    Waitlist,
    Cancelled,
}

impl ParticipationStatus {
    /// `confirmed -> cancelled` is the only transition; `cancelled` is terminal.
    pub fn can_transition_to(self, next: ParticipationStatus) -> bool {
        matches!(
            (self, next),
            (ParticipationStatus::Confirmed, ParticipationStatus::Cancelled)
        )
    }
}

/// Participation record stored in the `participants` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    pub event_id: String,
    pub user_id: u64,
    #[serde(with = "rfc3339")]
    pub joined_at: DateTime<Utc>,
    pub status: ParticipationStatus,
}

impl Participation {
    pub fn confirmed(event_id: &str, user_id: u64, now: DateTime<Utc>) -> Self {
        Self {
            event_id: event_id.to_string(),
            user_id,
            joined_at: now,
            status: ParticipationStatus::Confirmed,
        }
    }

    /// Deterministic key: one document per event/user pair.
    pub fn document_id(event_id: &str, user_id: u64) -> String {
        format!("{}_{}", urlencoding::encode(event_id), user_id)
    }
}

/// Identity stored by older clients as a number, a float, or a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyIdentity {
    Integer(u64),
    Float(f64),
    Text(String),
}

impl LegacyIdentity {
    fn into_id(self) -> Option<u64> {
        match self {
            LegacyIdentity::Integer(id) => Some(id),
            LegacyIdentity::Float(f) if f.fract() == 0.0 && f > 0.0 && f < u64::MAX as f64 => {
                Some(f as u64)
            }
            LegacyIdentity::Float(_) => None,
            LegacyIdentity::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Lenient reader for organizer identities on historical documents.
pub fn deserialize_legacy_identity<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<LegacyIdentity>::deserialize(deserializer)?;
    Ok(raw.and_then(LegacyIdentity::into_id))
}

/// The two fields of a historical event that the directory backfill reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEventRef {
    #[serde(default, deserialize_with = "deserialize_legacy_identity")]
    pub creator_id: Option<u64>,
    #[serde(default)]
    pub organizer: Option<String>,
}
