// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session start and user directory administration.

use crate::db::DocumentStore;
use crate::error::Result;
use crate::models::{LoginIdentity, Role, UserRecord};
use crate::services::{MigrationReport, RoleSource};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session route (open to any client holding a login payload).
pub fn routes<S: DocumentStore>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/api/session", post(start_session::<S>))
}

/// Directory administration routes (admin token required).
/// The auth middleware is applied in routes/mod.rs.
pub fn admin_routes<S: DocumentStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/api/admin/users", get(list_users::<S>))
        .route("/api/admin/users/{id}/role", put(set_role::<S>))
        .route("/api/admin/users/{id}/active", put(set_active::<S>))
        .route("/api/admin/migrate", post(migrate::<S>))
}

// ─── Session ─────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub role: Role,
    pub role_source: RoleSource,
    /// Role the client may have shown before the directory answered
    pub optimistic_role: Role,
    pub user: Option<UserRecord>,
}

/// Public login payload. Carries no role: a role claim from an
/// unauthenticated client is dropped before it reaches the policy.
#[derive(Deserialize)]
pub struct SessionRequest {
    pub id: u64,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl From<SessionRequest> for LoginIdentity {
    fn from(req: SessionRequest) -> Self {
        let identity = LoginIdentity::new(req.id, req.first_name);
        let identity = match req.last_name {
            Some(last_name) => identity.with_last_name(last_name),
            None => identity,
        };
        match req.username {
            Some(username) => identity.with_username(username),
            None => identity,
        }
    }
}

async fn start_session<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<SessionRequest>,
) -> Json<SessionResponse> {
    let identity = LoginIdentity::from(req);
    let session = state.users.start_session(&identity).await;
    Json(SessionResponse {
        role: session.authoritative.role,
        role_source: session.authoritative.source,
        optimistic_role: session.optimistic.role,
        user: session.user,
    })
}

// ─── Administration ──────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    #[serde(default)]
    pub admins_only: bool,
}

#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

async fn list_users<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListUsersQuery>,
) -> Json<Vec<UserRecord>> {
    let users = if query.admins_only {
        state.users.list_admins().await
    } else {
        state.users.list_all().await
    };
    Json(users)
}

async fn set_role<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<u64>,
    Json(body): Json<SetRoleRequest>,
) -> Result<StatusCode> {
    state.users.set_role(id, body.role).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_active<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<u64>,
    Json(body): Json<SetActiveRequest>,
) -> Result<StatusCode> {
    state.users.set_active(id, body.active).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn migrate<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<MigrationReport> {
    let report = state.users.migrate_from_legacy_events().await;
    tracing::info!(
        created = report.created,
        errors = report.errors,
        "Admin-triggered backfill finished"
    );
    Json(report)
}
