// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the legacy user lookup endpoint.
//!
//! Only used to put a human name next to an event's organizer. Every failure
//! degrades to [`UNKNOWN_ORGANIZER`]; nothing here is ever surfaced to callers.

use crate::models::user::format_display_name;
use anyhow::Context;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single lookup, so a hung endpoint degrades to the placeholder.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Placeholder shown when the organizer cannot be resolved.
pub const UNKNOWN_ORGANIZER: &str = "Unknown organizer";

/// Failure modes of a lookup, mirroring the endpoint's status codes.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Invalid user ID")]
    InvalidId,

    #[error("Missing or rejected authorization")]
    Unauthorized,

    #[error("User not found")]
    NotFound,

    #[error("Lookup endpoint error: {0}")]
    Upstream(String),

    #[error("Lookup transport error: {0}")]
    Transport(String),
}

/// User payload returned by the lookup endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyUser {
    pub id: u64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl LegacyUser {
    pub fn display_name(&self) -> String {
        format_display_name(&self.first_name, self.last_name.as_deref())
    }
}

/// HTTP client for `GET {base}/users/{id}`.
#[derive(Clone)]
pub struct LegacyUserClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl LegacyUserClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_LOOKUP_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building legacy lookup HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub async fn fetch_user(&self, telegram_id: u64) -> Result<LegacyUser, LookupError> {
        let url = format!("{}/users/{}", self.base_url, telegram_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                400 => LookupError::InvalidId,
                401 => LookupError::Unauthorized,
                404 => LookupError::NotFound,
                _ => LookupError::Upstream(format!("HTTP {}: {}", status, body)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LookupError::Upstream(format!("JSON parse error: {}", e)))
    }
}

/// Organizer display names with a per-identity cache of successful lookups.
#[derive(Clone)]
pub struct OrganizerNames {
    /// `None` when no lookup endpoint is configured.
    client: Option<LegacyUserClient>,
    cache: Arc<DashMap<u64, String>>,
}

impl OrganizerNames {
    pub fn new(client: Option<LegacyUserClient>) -> Self {
        Self {
            client,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Resolver that always answers with the placeholder.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// "First L." for the identity, or [`UNKNOWN_ORGANIZER`].
    pub async fn display_name(&self, telegram_id: u64) -> String {
        if let Some(name) = self.cache.get(&telegram_id) {
            return name.clone();
        }

        let Some(client) = &self.client else {
            return UNKNOWN_ORGANIZER.to_string();
        };

        match client.fetch_user(telegram_id).await {
            Ok(user) => {
                let name = user.display_name();
                self.cache.insert(telegram_id, name.clone());
                name
            }
            Err(e) => {
                tracing::warn!(telegram_id, error = %e, "Organizer lookup failed");
                UNKNOWN_ORGANIZER.to_string()
            }
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_resolver_uses_placeholder() {
        let names = OrganizerNames::disabled();
        assert_eq!(names.display_name(1).await, UNKNOWN_ORGANIZER);
        assert_eq!(names.cached_len(), 0);
    }

    #[test]
    fn test_legacy_user_display_name() {
        let user: LegacyUser = serde_json::from_str(
            r#"{"id": 3, "first_name": "Olga", "last_name": "Smirnova", "username": null}"#,
        )
        .unwrap();
        assert_eq!(user.display_name(), "Olga S.");
    }
}
