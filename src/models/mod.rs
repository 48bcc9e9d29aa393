// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod event;
pub mod user;

pub use event::{
    Event, EventCategory, EventDraft, LegacyEventRef, Participation, ParticipationStatus,
};
pub use user::{LoginIdentity, Role, RoleAssertion, UserRecord};
