//! JWT signer/verifier (C3, §4.3).
//!
//! HS256 over claims `{iss, sub=user_id, iat, nbf, exp, user_id, username,
//! email, role, roles[]}`. Two TTLs: access (default 24h) and refresh
//! (default 7d). `enabled` is carried in the claims too — the core has no
//! `Repo` to re-check a live user record against (persistence is explicitly
//! out of scope, §1), so a token's enabled bit is fixed at issuance time and
//! only changes on the next login/refresh.

use crate::error::TokenError;
use crate::role::Role;
use crate::user::User;
use chrono::{DateTime, Duration, Utc};
use jobgrid_core::UserId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Default access token lifetime: 24 hours.
pub const DEFAULT_ACCESS_TTL: Duration = Duration::hours(24);
/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL: Duration = Duration::days(7);

/// The decoded claims of a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub roles: Vec<String>,
    pub enabled: bool,
}

impl Claims {
    /// Reconstructs the `User` this token was issued for.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClaims` if `user_id`/`role`/`roles` do not parse.
    pub fn to_user(&self) -> Result<User, TokenError> {
        let id: UserId = self
            .user_id
            .parse()
            .map_err(|e: jobgrid_core::ParseIdError| TokenError::InvalidClaims {
                reason: e.to_string(),
            })?;
        let primary_role = parse_role(&self.role)?;
        let mut user = User::new(id, self.username.clone(), self.email.clone(), primary_role)
            .with_enabled(self.enabled);
        for r in &self.roles {
            if r == &self.role {
                continue;
            }
            user = user.with_extra_role(parse_role(r)?);
        }
        Ok(user)
    }
}

fn parse_role(s: &str) -> Result<Role, TokenError> {
    match s {
        "admin" => Ok(Role::Admin),
        "operator" => Ok(Role::Operator),
        "viewer" => Ok(Role::Viewer),
        other => Err(TokenError::InvalidClaims {
            reason: format!("unknown role: {other}"),
        }),
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Operator => "operator",
        Role::Viewer => "viewer",
    }
}

/// Issues and validates HS256 bearer tokens.
pub struct TokenService {
    secret: String,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }

    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    /// Issues an access token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the underlying HS256 signing fails (e.g. an
    /// unsupported secret encoding).
    pub fn generate_access_token(&self, user: &User) -> Result<String, TokenError> {
        self.generate(user, self.access_ttl)
    }

    /// Issues a refresh token for `user`.
    ///
    /// # Errors
    ///
    /// See [`Self::generate_access_token`].
    pub fn generate_refresh_token(&self, user: &User) -> Result<String, TokenError> {
        self.generate(user, self.refresh_ttl)
    }

    fn generate(&self, user: &User, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user.id().to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
            user_id: user.id().to_string(),
            username: user.username().to_string(),
            email: user.email().to_string(),
            role: role_str(user.primary_role()).to_string(),
            roles: user.roles().into_iter().map(role_str).map(String::from).collect(),
            enabled: user.enabled(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TokenError::InvalidToken {
            reason: e.to_string(),
        })
    }

    /// Validates and decodes a bearer token.
    ///
    /// `TokenExpired` is returned specifically when the signature is valid
    /// but `exp` has passed; any other structural/signature failure is
    /// `InvalidToken`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] per the rules above.
    pub fn parse_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_nbf = true;

        let result = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        );

        match result {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(TokenError::TokenExpired),
                _ => Err(TokenError::InvalidToken {
                    reason: e.to_string(),
                }),
            },
        }
    }

    /// Convenience wrapper returning the expiry instant of a still-valid
    /// token, used by tests that need to assert TTL arithmetic without
    /// sleeping for the full duration.
    #[must_use]
    pub fn expires_at(&self, claims: &Claims) -> DateTime<Utc> {
        DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    fn user() -> User {
        User::new(UserId::new(), "alice", "alice@example.com", Role::Admin)
    }

    #[test]
    fn round_trip_preserves_identity_fields() {
        let service = TokenService::new("s", "jobgrid");
        let u = user();
        let token = service.generate_access_token(&u).expect("generate");
        let claims = service.parse_token(&token).expect("parse");
        let round_tripped = claims.to_user().expect("to_user");

        assert_eq!(round_tripped.id(), u.id());
        assert_eq!(round_tripped.username(), u.username());
        assert_eq!(round_tripped.email(), u.email());
        assert_eq!(round_tripped.primary_role(), u.primary_role());
        assert_eq!(round_tripped.roles(), u.roles());
    }

    #[test]
    fn expired_token_is_reported_distinctly() {
        let service = TokenService::new("s", "jobgrid").with_access_ttl(Duration::milliseconds(1));
        let token = service.generate_access_token(&user()).expect("generate");
        std::thread::sleep(std::time::Duration::from_millis(50));
        let err = service.parse_token(&token).unwrap_err();
        assert_eq!(err, TokenError::TokenExpired);
    }

    #[test]
    fn tampered_token_is_invalid_not_expired() {
        let service = TokenService::new("s", "jobgrid");
        let mut token = service.generate_access_token(&user()).expect("generate");
        token.push('x');
        let err = service.parse_token(&token).unwrap_err();
        assert!(matches!(err, TokenError::InvalidToken { .. }));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let service = TokenService::new("s", "jobgrid");
        let token = service.generate_access_token(&user()).expect("generate");
        let other = TokenService::new("other-secret", "jobgrid");
        let err = other.parse_token(&token).unwrap_err();
        assert!(matches!(err, TokenError::InvalidToken { .. }));
    }

    #[test]
    fn refresh_token_uses_longer_ttl() {
        let service = TokenService::new("s", "jobgrid");
        let u = user();
        let access = service.parse_token(&service.generate_access_token(&u).unwrap()).unwrap();
        let refresh = service.parse_token(&service.generate_refresh_token(&u).unwrap()).unwrap();
        assert!(refresh.exp > access.exp);
    }
}
