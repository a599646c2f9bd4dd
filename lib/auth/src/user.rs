//! User domain type (§3).
//!
//! `User` is an identity record created by the `Repo`; it is immutable from
//! the scheduler's perspective — this crate only reads it to answer
//! authentication and authorization questions.

use crate::role::{Permission, Role};
use jobgrid_core::UserId;
use serde::{Deserialize, Serialize};

/// An identity record: `id, username, email, primary_role, extra_roles[], enabled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String,
    email: String,
    primary_role: Role,
    extra_roles: Vec<Role>,
    enabled: bool,
}

impl User {
    /// Creates a user record with a single role and no extra roles.
    #[must_use]
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        email: impl Into<String>,
        primary_role: Role,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            email: email.into(),
            primary_role,
            extra_roles: Vec::new(),
            enabled: true,
        }
    }

    /// Adds an additional role beyond `primary_role`.
    #[must_use]
    pub fn with_extra_role(mut self, role: Role) -> Self {
        if role != self.primary_role && !self.extra_roles.contains(&role) {
            self.extra_roles.push(role);
        }
        self
    }

    /// Sets whether the account is enabled.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn primary_role(&self) -> Role {
        self.primary_role
    }

    #[must_use]
    pub fn roles(&self) -> Vec<Role> {
        let mut roles = vec![self.primary_role];
        roles.extend(self.extra_roles.iter().copied());
        roles
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// `user.IsAdmin()` short-circuits all path checks (§4.3).
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles().iter().any(|r| matches!(r, Role::Admin))
    }

    /// True iff any of the user's roles grants `permission` (§4.3).
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.is_admin() || self.roles().iter().any(|r| r.grants(permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_permission_without_explicit_grant_check() {
        let user = User::new(UserId::new(), "alice", "alice@example.com", Role::Admin);
        assert!(user.is_admin());
        assert!(user.has_permission(Permission::SystemAdmin));
    }

    #[test]
    fn viewer_cannot_delete() {
        let user = User::new(UserId::new(), "bob", "bob@example.com", Role::Viewer);
        assert!(!user.has_permission(Permission::TaskDelete));
        assert!(user.has_permission(Permission::TaskRead));
    }

    #[test]
    fn extra_roles_union_permissions() {
        let user = User::new(UserId::new(), "carol", "carol@example.com", Role::Viewer)
            .with_extra_role(Role::Operator);
        assert!(user.has_permission(Permission::TaskCreate));
        assert_eq!(user.roles().len(), 2);
    }

    #[test]
    fn extra_role_matching_primary_is_not_duplicated() {
        let user = User::new(UserId::new(), "dave", "dave@example.com", Role::Operator)
            .with_extra_role(Role::Operator);
        assert_eq!(user.roles().len(), 1);
    }

    #[test]
    fn disabled_user_is_not_implicitly_denied_here() {
        // `enabled` gating is the edge's job (TokenNotFound/PermissionDenied
        // flow), not User::has_permission's — a disabled admin still
        // evaluates as holding every permission in isolation.
        let user = User::new(UserId::new(), "eve", "eve@example.com", Role::Admin)
            .with_enabled(false);
        assert!(!user.enabled());
        assert!(user.has_permission(Permission::SystemAdmin));
    }

    #[test]
    fn user_serde_roundtrip() {
        let user = User::new(UserId::new(), "frank", "frank@example.com", Role::Operator);
        let json = serde_json::to_string(&user).expect("serialize");
        let parsed: User = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(user, parsed);
    }
}
