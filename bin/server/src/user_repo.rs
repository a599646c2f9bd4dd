//! User lookup for the login/refresh endpoints.
//!
//! Persistence of users is explicitly a `Repo`-interface-only concern;
//! this binary defines the trait boundary it needs and, for the reference
//! deployment, an in-memory fake seeded at startup — the same
//! fakes-over-mocks split `jobgrid_collector::repo::testing::InMemoryTaskRepo`
//! uses for `TaskRepo`.

use async_trait::async_trait;
use jobgrid_auth::{Role, User};
use jobgrid_core::UserId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// What the login/refresh handlers need from a user store: look a user up
/// by username and check a submitted password against it.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Option<User>;
    async fn verify_password(&self, username: &str, password: &str) -> bool;
}

/// In-memory `UserRepo`. Passwords are compared as plain strings — there is
/// no credential store behind this beyond the process's own memory, so
/// hashing would protect against nothing a real deployment's `Repo` should
/// be doing instead.
pub struct InMemoryUserRepo {
    users: Mutex<HashMap<String, (User, String)>>,
}

impl InMemoryUserRepo {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a user with a password, returning `self` for chaining at
    /// startup.
    #[must_use]
    pub fn with_user(self, username: &str, password: &str, role: Role) -> Self {
        let user = User::new(UserId::new(), username, format!("{username}@jobgrid.local"), role);
        self.users
            .lock()
            .insert(username.to_string(), (user, password.to_string()));
        self
    }
}

impl Default for InMemoryUserRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn find_by_username(&self, username: &str) -> Option<User> {
        self.users.lock().get(username).map(|(user, _)| user.clone())
    }

    async fn verify_password(&self, username: &str, password: &str) -> bool {
        self.users
            .lock()
            .get(username)
            .is_some_and(|(_, expected)| expected == password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_registered_user_and_verifies_password() {
        let repo = InMemoryUserRepo::new().with_user("alice", "hunter2", Role::Admin);
        assert!(repo.find_by_username("alice").await.is_some());
        assert!(repo.verify_password("alice", "hunter2").await);
        assert!(!repo.verify_password("alice", "wrong").await);
        assert!(repo.find_by_username("nobody").await.is_none());
    }
}
