//! User directory model and login identity payload.

use crate::time_utils::{rfc3339, rfc3339_opt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Directory role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Role claimed by the login payload itself, if any.
///
/// Serialized as an optional `role` field. Only
/// [`RolePolicy`](crate::services::RolePolicy) looks inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Role>", into = "Option<Role>")]
pub enum RoleAssertion {
    Asserted(Role),
    #[default]
    Unasserted,
}

impl From<Option<Role>> for RoleAssertion {
    fn from(role: Option<Role>) -> Self {
        role.map_or(RoleAssertion::Unasserted, RoleAssertion::Asserted)
    }
}

impl From<RoleAssertion> for Option<Role> {
    fn from(assertion: RoleAssertion) -> Self {
        match assertion {
            RoleAssertion::Asserted(role) => Some(role),
            RoleAssertion::Unasserted => None,
        }
    }
}

/// Identity handed over by the client at session start (Telegram WebApp user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginIdentity {
    /// Telegram user ID (also used as the directory document ID)
    pub id: u64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    role: RoleAssertion,
}

impl LoginIdentity {
    pub fn new(id: u64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: None,
            username: None,
            role: RoleAssertion::Unasserted,
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Attach an externally asserted role.
    pub fn asserting(mut self, role: Role) -> Self {
        self.role = RoleAssertion::Asserted(role);
        self
    }

    pub(crate) fn role_assertion(&self) -> RoleAssertion {
        self.role
    }
}

fn default_true() -> bool {
    true
}

/// User record stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Telegram user ID (also used as document ID)
    pub telegram_id: u64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(with = "rfc3339")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "rfc3339")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "rfc3339_opt", skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Document key for a Telegram user ID.
    pub fn document_id(telegram_id: u64) -> String {
        telegram_id.to_string()
    }

    pub fn display_name(&self) -> String {
        format_display_name(&self.first_name, self.last_name.as_deref())
    }
}

/// Format a name as "First L." (first name plus last-name initial).
pub fn format_display_name(first_name: &str, last_name: Option<&str>) -> String {
    let first_name = first_name.trim();
    match last_name.and_then(|l| l.trim().chars().next()) {
        Some(initial) => format!("{first_name} {initial}."),
        None => first_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_assertion_from_payload() {
        let plain: LoginIdentity =
            serde_json::from_str(r#"{"id": 7, "first_name": "Ann"}"#).unwrap();
        assert_eq!(plain.role_assertion(), RoleAssertion::Unasserted);

        let null_role: LoginIdentity =
            serde_json::from_str(r#"{"id": 7, "first_name": "Ann", "role": null}"#).unwrap();
        assert_eq!(null_role.role_assertion(), RoleAssertion::Unasserted);

        let admin: LoginIdentity =
            serde_json::from_str(r#"{"id": 7, "first_name": "Ann", "role": "admin"}"#).unwrap();
        assert_eq!(admin.role_assertion(), RoleAssertion::Asserted(Role::Admin));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result =
            serde_json::from_str::<LoginIdentity>(r#"{"id": 7, "first_name": "A", "role": "root"}"#);
        assert!(result.is_err());
        assert!("root".parse::<Role>().is_err());
        assert_eq!(" Admin ".parse::<Role>(), Ok(Role::Admin));
    }

    #[test]
    fn test_display_name_format() {
        assert_eq!(format_display_name("Ivan", Some("Petrov")), "Ivan P.");
        assert_eq!(format_display_name("Ivan", None), "Ivan");
        assert_eq!(format_display_name("Ivan", Some("  ")), "Ivan");
    }

    #[test]
    fn test_user_record_reads_legacy_document() {
        // Older records carry no lastLoginAt and no isActive flag.
        let record: UserRecord = serde_json::from_value(serde_json::json!({
            "telegramId": 42,
            "firstName": "Legacy",
            "role": "admin",
            "createdAt": "2025-01-01T00:00:00.000Z",
            "updatedAt": "2025-01-01T00:00:00.000Z",
            "_firestore_id": "42"
        }))
        .unwrap();

        assert_eq!(record.role, Role::Admin);
        assert!(record.is_active);
        assert!(record.last_login_at.is_none());
    }
}
