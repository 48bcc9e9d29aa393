// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role resolution policy.
//!
//! Precedence, highest first:
//! 1. role asserted by the login payload
//! 2. role stored in the directory (once loaded)
//! 3. membership in the configured admin allowlist
//! 4. `user`
//!
//! The session flow evaluates this twice: optimistically before the directory
//! lookup finishes, then authoritatively with the stored role. Both calls are
//! pure, so equal inputs always give equal answers.

use crate::models::{LoginIdentity, Role, RoleAssertion};
use serde::Serialize;
use std::collections::HashSet;

/// Which rule produced a resolved role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleSource {
    Asserted,
    Directory,
    Allowlist,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRole {
    pub role: Role,
    pub source: RoleSource,
}

impl ResolvedRole {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Pure role resolver with an allowlist injected at construction.
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    admin_ids: HashSet<u64>,
}

impl RolePolicy {
    pub fn new(admin_ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            admin_ids: admin_ids.into_iter().collect(),
        }
    }

    /// Resolve the effective role. `identity` is `None` for anonymous callers.
    pub fn resolve(&self, identity: Option<&LoginIdentity>, stored: Option<Role>) -> ResolvedRole {
        let Some(identity) = identity else {
            return ResolvedRole {
                role: Role::User,
                source: RoleSource::Default,
            };
        };

        if let RoleAssertion::Asserted(role) = identity.role_assertion() {
            return ResolvedRole {
                role,
                source: RoleSource::Asserted,
            };
        }
        if let Some(role) = stored {
            return ResolvedRole {
                role,
                source: RoleSource::Directory,
            };
        }
        if self.admin_ids.contains(&identity.id) {
            return ResolvedRole {
                role: Role::Admin,
                source: RoleSource::Allowlist,
            };
        }
        ResolvedRole {
            role: Role::User,
            source: RoleSource::Default,
        }
    }

    /// Role for a brand-new directory record: the asserted role, else `user`.
    pub fn initial_role(&self, identity: &LoginIdentity) -> Role {
        match identity.role_assertion() {
            RoleAssertion::Asserted(role) => role,
            RoleAssertion::Unasserted => Role::User,
        }
    }

    pub fn is_allowlisted(&self, telegram_id: u64) -> bool {
        self.admin_ids.contains(&telegram_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWLISTED: u64 = 1001;

    fn policy() -> RolePolicy {
        RolePolicy::new([ALLOWLISTED])
    }

    #[test]
    fn test_anonymous_is_user() {
        let resolved = policy().resolve(None, Some(Role::Admin));
        assert_eq!(resolved.role, Role::User);
        assert_eq!(resolved.source, RoleSource::Default);
    }

    #[test]
    fn test_asserted_role_wins_over_everything() {
        let identity = LoginIdentity::new(ALLOWLISTED, "A").asserting(Role::User);
        let resolved = policy().resolve(Some(&identity), Some(Role::Admin));
        assert_eq!(resolved.role, Role::User);
        assert_eq!(resolved.source, RoleSource::Asserted);
    }

    #[test]
    fn test_stored_role_beats_allowlist() {
        let identity = LoginIdentity::new(ALLOWLISTED, "A");
        let resolved = policy().resolve(Some(&identity), Some(Role::User));
        assert_eq!(resolved.role, Role::User);
        assert_eq!(resolved.source, RoleSource::Directory);
    }

    #[test]
    fn test_allowlist_applies_without_stored_role() {
        let identity = LoginIdentity::new(ALLOWLISTED, "A");
        let resolved = policy().resolve(Some(&identity), None);
        assert!(resolved.is_admin());
        assert_eq!(resolved.source, RoleSource::Allowlist);

        let stranger = LoginIdentity::new(7, "B");
        assert_eq!(policy().resolve(Some(&stranger), None).role, Role::User);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let policy = policy();
        let identity = LoginIdentity::new(ALLOWLISTED, "A");
        for stored in [None, Some(Role::User), Some(Role::Admin)] {
            assert_eq!(
                policy.resolve(Some(&identity), stored),
                policy.resolve(Some(&identity), stored)
            );
        }
    }

    #[test]
    fn test_initial_role_ignores_allowlist() {
        let policy = policy();
        assert_eq!(
            policy.initial_role(&LoginIdentity::new(ALLOWLISTED, "A")),
            Role::User
        );
        assert_eq!(
            policy.initial_role(&LoginIdentity::new(7, "B").asserting(Role::Admin)),
            Role::Admin
        );
    }
}
