// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Event Hub: data layer for a Telegram event-discovery mini-app.
//!
//! This crate provides the event registry, the user directory with its
//! role policy, and the HTTP API that exposes them, all on top of a
//! pluggable document store (Firestore or in-memory).

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use services::{EventRegistry, OrganizerNames, RolePolicy, UserDirectory};

/// Shared application state, generic over the document store.
pub struct AppState<S> {
    pub config: Config,
    pub events: EventRegistry<S>,
    pub users: UserDirectory<S>,
    pub organizer_names: OrganizerNames,
}

impl<S: DocumentStore> AppState<S> {
    /// Wire the services onto one store according to `config`.
    pub fn new(config: Config, store: S, organizer_names: OrganizerNames) -> Self {
        let policy = RolePolicy::new(config.admin_ids.iter().copied());
        Self {
            events: EventRegistry::new(store.clone(), config.capacity_policy),
            users: UserDirectory::new(store, policy),
            organizer_names,
            config,
        }
    }
}
