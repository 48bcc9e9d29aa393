// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use event_hub::db::StoreError;
use event_hub::error::{AppError, ServiceError, ValidationError};

fn status_of(err: ServiceError) -> StatusCode {
    AppError::from(err).into_response().status()
}

#[test]
fn test_service_errors_map_to_status_codes() {
    assert_eq!(
        status_of(ValidationError::new("title", "title is required").into()),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        status_of(ServiceError::NotFound("event x".to_string())),
        StatusCode::NOT_FOUND
    );
    assert_eq!(status_of(ServiceError::AlreadyRegistered), StatusCode::CONFLICT);
    assert_eq!(status_of(ServiceError::EventFull), StatusCode::CONFLICT);
    assert_eq!(status_of(ServiceError::EventInactive), StatusCode::CONFLICT);
    assert_eq!(
        status_of(ServiceError::StoreUnavailable("down".to_string())),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[test]
fn test_store_not_found_stays_not_found() {
    let err = ServiceError::from(StoreError::NotFound {
        collection: "users".to_string(),
        id: "7".to_string(),
    });
    assert_eq!(err, ServiceError::NotFound("users/7".to_string()));
}

#[test]
fn test_other_store_errors_become_unavailable() {
    for store_err in [
        StoreError::Unavailable("timeout".to_string()),
        StoreError::Malformed("bad".to_string()),
        StoreError::BatchTooLarge,
        StoreError::Unsupported("increment"),
    ] {
        assert!(matches!(
            ServiceError::from(store_err),
            ServiceError::StoreUnavailable(_)
        ));
    }
}

#[test]
fn test_validation_message_names_field() {
    let err = ServiceError::from(ValidationError::new("date", "date must be in the future"));
    assert_eq!(err.to_string(), "Invalid date: date must be in the future");
}

#[test]
fn test_unauthorized_response() {
    let response = AppError::Unauthorized.into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
