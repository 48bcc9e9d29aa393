//! Application configuration loaded from environment variables.
//!
//! Values are read once at startup. A `.env` file is honored for local
//! development.

use crate::services::CapacityPolicy;
use std::env;
use std::str::FromStr;

/// Which document store backs the services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Firestore,
    /// Process-local store; data is lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// Telegram IDs treated as admins when the directory has no role for them
    pub admin_ids: Vec<u64>,
    pub capacity_policy: CapacityPolicy,
    pub store_backend: StoreBackend,

    /// Base URL of the legacy user lookup endpoint
    pub legacy_lookup_url: Option<String>,
    /// Bearer token for the legacy lookup endpoint
    pub legacy_lookup_token: Option<String>,
    /// Bearer token for `/api/admin/*`; admin routes are closed when unset
    pub admin_api_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_var("PORT")?.unwrap_or(8080),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            admin_ids: match optional_var("ADMIN_IDS") {
                Some(raw) => parse_admin_ids(&raw)?,
                None => Vec::new(),
            },
            capacity_policy: parse_var("CAPACITY_POLICY")?.unwrap_or_default(),
            store_backend: parse_var("STORE_BACKEND")?.unwrap_or_default(),
            legacy_lookup_url: optional_var("LEGACY_LOOKUP_URL"),
            legacy_lookup_token: optional_var("LEGACY_LOOKUP_TOKEN"),
            admin_api_token: optional_var("ADMIN_API_TOKEN"),
        })
    }

    /// Config for tests: in-memory store, no legacy lookup.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            admin_ids: Vec::new(),
            capacity_policy: CapacityPolicy::Enforce,
            store_backend: StoreBackend::Memory,
            legacy_lookup_url: None,
            legacy_lookup_token: None,
            admin_api_token: Some("test_admin_token".to_string()),
        }
    }
}

/// Trimmed value of a variable, `None` if unset or blank.
fn optional_var(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_var(name)
        .map(|raw| {
            raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Parse a comma-separated list of Telegram IDs. Blank entries are ignored.
pub fn parse_admin_ids(raw: &str) -> Result<Vec<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse().map_err(|_| ConfigError::Invalid {
                name: "ADMIN_IDS",
                reason: format!("'{part}' is not a numeric ID"),
            })
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
