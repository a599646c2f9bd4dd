//! Error types for the auth crate.
//!
//! Hand-written `Display`/`Error` impls, composed via `From` at crate
//! boundaries, following the same convention as the rest of the workspace
//! rather than a derive macro.

use std::fmt;

/// Errors raised while issuing or validating a bearer token (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No `Authorization` header was present.
    TokenNotFound,
    /// The token's signature or structure failed to validate.
    InvalidToken { reason: String },
    /// The token parsed and verified but has passed its `exp`.
    TokenExpired,
    /// The token verified but its claims were malformed (missing/invalid
    /// field) or could not be mapped back to a `User`.
    InvalidClaims { reason: String },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenNotFound => write!(f, "no bearer token present"),
            Self::InvalidToken { reason } => write!(f, "invalid token: {reason}"),
            Self::TokenExpired => write!(f, "token has expired"),
            Self::InvalidClaims { reason } => write!(f, "invalid token claims: {reason}"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Errors raised by RBAC checks (§7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// The authenticated user does not hold the required permission, or the
    /// user account is disabled.
    PermissionDenied {
        user_id: String,
        required: String,
    },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied { user_id, required } => {
                write!(
                    f,
                    "user {user_id} lacks required permission: {required}"
                )
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}

/// Umbrella error for the auth crate, used where a caller needs to handle
/// both authentication and authorization failures through one type (e.g. the
/// edge middleware).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    Token(TokenError),
    Authorization(AuthorizationError),
    /// The user matched a valid token but `enabled == false`.
    UserDisabled { user_id: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(e) => write!(f, "{e}"),
            Self::Authorization(e) => write!(f, "{e}"),
            Self::UserDisabled { user_id } => write!(f, "user {user_id} is disabled"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        Self::Token(e)
    }
}

impl From<AuthorizationError> for AuthError {
    fn from(e: AuthorizationError) -> Self {
        Self::Authorization(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expired_display() {
        let err = TokenError::TokenExpired;
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn permission_denied_display() {
        let err = AuthorizationError::PermissionDenied {
            user_id: "usr_123".to_string(),
            required: "task:delete".to_string(),
        };
        assert!(err.to_string().contains("usr_123"));
        assert!(err.to_string().contains("task:delete"));
    }

    #[test]
    fn auth_error_from_token_error() {
        let err: AuthError = TokenError::TokenNotFound.into();
        assert!(matches!(err, AuthError::Token(TokenError::TokenNotFound)));
    }
}
