// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event listing, creation and registration routes.

use crate::db::DocumentStore;
use crate::error::{AppError, Result};
use crate::models::{Event, EventDraft};
use crate::services::UNKNOWN_ORGANIZER;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Public event routes.
pub fn routes<S: DocumentStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/api/events", get(list_events::<S>).post(create_event::<S>))
        .route("/api/events/{id}", get(get_event::<S>))
        .route("/api/events/{id}/register", post(register::<S>))
        .route(
            "/api/events/{id}/registrations/{user_id}",
            get(registration_status::<S>),
        )
}

/// Event routes that change moderation state (admin token required).
/// The auth middleware is applied in routes/mod.rs.
pub fn admin_routes<S: DocumentStore>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/api/events/{id}/deactivate", post(deactivate::<S>))
}

// ─── Responses ───────────────────────────────────────────────

/// Event with its key and, on detail reads, the organizer's display name.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    #[serde(flatten)]
    pub event: Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_name: Option<String>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            id: event.id.clone(),
            event,
            organizer_name: None,
        }
    }
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_id: u64,
}

#[derive(Serialize)]
pub struct RegistrationStatus {
    pub registered: bool,
}

// ─── Handlers ────────────────────────────────────────────────

async fn list_events<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<Vec<EventResponse>> {
    let events = state.events.list_active().await;
    Json(events.into_iter().map(EventResponse::from).collect())
}

async fn create_event<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(draft): Json<EventDraft>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let id = state.events.create(draft).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn get_event<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<EventResponse>> {
    let event = state
        .events
        .get_by_id(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))?;

    let organizer_name = match event.creator_id {
        Some(creator_id) => state.organizer_names.display_name(creator_id).await,
        None if !event.organizer.trim().is_empty() => event.organizer.clone(),
        None => UNKNOWN_ORGANIZER.to_string(),
    };

    let mut response = EventResponse::from(event);
    response.organizer_name = Some(organizer_name);
    Ok(Json(response))
}

async fn register<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(body): Json<RegisterRequest>,
) -> Result<StatusCode> {
    state.events.register(&id, body.user_id).await?;
    Ok(StatusCode::CREATED)
}

async fn registration_status<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, user_id)): Path<(String, u64)>,
) -> Json<RegistrationStatus> {
    let registered = state.events.is_registered(&id, user_id).await;
    Json(RegistrationStatus { registered })
}

async fn deactivate<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.events.deactivate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
