// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Legacy user lookup client against a mocked endpoint.

use event_hub::services::{LegacyUserClient, LookupError, OrganizerNames, UNKNOWN_ORGANIZER};
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "lookup-token";

fn names_for(server: &MockServer) -> OrganizerNames {
    OrganizerNames::new(Some(LegacyUserClient::new(server.uri(), TOKEN).unwrap()))
}

#[tokio::test]
async fn test_lookup_formats_name_and_sends_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/77"))
        .and(header("authorization", "Bearer lookup-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 77,
            "first_name": "Maria",
            "last_name": "Ivanova",
            "username": "maria"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let names = names_for(&server);

    assert_eq!(names.display_name(77).await, "Maria I.");
    // Served from cache; the mock asserts a single request on drop.
    assert_eq!(names.display_name(77).await, "Maria I.");
    assert_eq!(names.cached_len(), 1);
}

#[tokio::test]
async fn test_status_codes_map_to_typed_errors() {
    let server = MockServer::start().await;
    for (id, status) in [(1, 400), (2, 401), (3, 404), (4, 500)] {
        Mock::given(method("GET"))
            .and(path(format!("/users/{id}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let client = LegacyUserClient::new(server.uri(), TOKEN).unwrap();

    assert!(matches!(client.fetch_user(1).await, Err(LookupError::InvalidId)));
    assert!(matches!(client.fetch_user(2).await, Err(LookupError::Unauthorized)));
    assert!(matches!(client.fetch_user(3).await, Err(LookupError::NotFound)));
    assert!(matches!(client.fetch_user(4).await, Err(LookupError::Upstream(_))));
}

#[tokio::test]
async fn test_failures_degrade_to_placeholder_and_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/9"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let names = names_for(&server);

    assert_eq!(names.display_name(9).await, UNKNOWN_ORGANIZER);
    assert_eq!(names.display_name(9).await, UNKNOWN_ORGANIZER);
    assert_eq!(names.cached_len(), 0);
}

#[tokio::test]
async fn test_malformed_body_degrades_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let names = names_for(&server);

    assert_eq!(names.display_name(5).await, UNKNOWN_ORGANIZER);
}

#[tokio::test]
async fn test_unreachable_endpoint_degrades_to_placeholder() {
    // Nothing listens on port 9 locally.
    let client = LegacyUserClient::new("http://127.0.0.1:9", TOKEN).unwrap();
    let names = OrganizerNames::new(Some(client));

    assert_eq!(names.display_name(1).await, UNKNOWN_ORGANIZER);
}

#[tokio::test]
async fn test_slow_endpoint_times_out_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/3"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 3, "first_name": "Late" }))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let client =
        LegacyUserClient::with_timeout(server.uri(), TOKEN, Duration::from_millis(200)).unwrap();
    assert!(matches!(
        client.fetch_user(3).await,
        Err(LookupError::Transport(_))
    ));

    let names = OrganizerNames::new(Some(client));
    let started = Instant::now();
    assert_eq!(names.display_name(3).await, UNKNOWN_ORGANIZER);
    assert!(started.elapsed() < Duration::from_secs(5));
}
