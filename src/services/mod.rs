// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod events;
pub mod legacy_users;
pub mod roles;
pub mod users;

pub use events::{CapacityPolicy, EventRegistry};
pub use legacy_users::{LegacyUserClient, LookupError, OrganizerNames, UNKNOWN_ORGANIZER};
pub use roles::{ResolvedRole, RolePolicy, RoleSource};
pub use users::{MigrationReport, SessionRoles, UserDirectory};
