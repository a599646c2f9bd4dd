//! JWT authentication and static RBAC (C3, C4, §4.3).
//!
//! This crate answers two questions for the edge: "who is this bearer
//! token for" (`token`) and "is that user allowed to do this" (`rbac`,
//! `role`). It has no knowledge of HTTP framework types or of how users are
//! persisted — both are the caller's concern.

pub mod error;
pub mod rbac;
pub mod role;
pub mod token;
pub mod user;

pub use error::{AuthError, AuthorizationError, TokenError};
pub use rbac::{Method, RbacPolicy, default_skip_paths, match_path};
pub use role::{Permission, Role};
pub use token::{Claims, TokenService, DEFAULT_ACCESS_TTL, DEFAULT_REFRESH_TTL};
pub use user::User;
