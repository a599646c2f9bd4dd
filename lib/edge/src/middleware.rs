//! The edge middleware stack (C10, §4.9): JWT bearer auth + RBAC,
//! generalized from the teacher's session-cookie `RequireAuth`/
//! `OptionalAuth` pair (`bin/server/src/auth/middleware.rs`) to stateless
//! bearer-token parsing plus a static permission lookup.
//!
//! Authentication and RBAC each run as an `axum::middleware::from_fn_with_state`
//! layer ([`auth_layer`], [`rbac_layer`], assembled in [`crate::stack`]) so
//! every request is checked regardless of what a given handler's
//! signature asks for. [`RequestContext`] and [`Authorized`] remain
//! `FromRequestParts` extractors for handlers to pull the
//! already-authenticated context back out — they read what `auth_layer`
//! already validated and stashed in the request's extensions rather than
//! re-parsing the token.

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::{request::Parts, Extensions, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobgrid_auth::{RbacPolicy, TokenService, User};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use ulid::Ulid;

/// The services the extractors below need from application state. The
/// binary's `AppState` exposes one of these via `FromRef`.
#[derive(Clone)]
pub struct EdgeServices {
    pub token_service: Arc<TokenService>,
    pub rbac: Arc<RbacPolicy>,
    pub skip_paths: Arc<Vec<&'static str>>,
}

/// Per-request context attached after the auth stage: a fresh request id,
/// the caller's IP/user-agent, and the authenticated user when one was
/// required. Skip-listed paths (§4.9) carry `user: None` — auth and RBAC
/// are bypassed for them, but rate limiting and audit still see a context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: Option<User>,
    pub request_id: String,
    pub client_ip: String,
    pub user_agent: String,
}

impl RequestContext {
    /// The authenticated user, for call sites that already know this path
    /// required auth (e.g. after an `Authorized` extraction succeeded).
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }
}

/// Rejection for `RequestContext`/`RequireAuth`-style extractors.
#[derive(Debug)]
pub enum EdgeRejection {
    MissingToken,
    InvalidToken,
    TokenExpired,
    Disabled,
    Forbidden,
}

impl EdgeRejection {
    /// The enumerated error code this rejection maps to on the wire (§6).
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "TOKEN_NOT_FOUND",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::Disabled => "USER_DISABLED",
            Self::Forbidden => "PERMISSION_DENIED",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing bearer token",
            Self::InvalidToken => "invalid token",
            Self::TokenExpired => "token expired",
            Self::Disabled => "user disabled",
            Self::Forbidden => "permission denied",
        }
    }
}

impl IntoResponse for EdgeRejection {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MissingToken | Self::InvalidToken | Self::TokenExpired => StatusCode::UNAUTHORIZED,
            Self::Disabled | Self::Forbidden => StatusCode::FORBIDDEN,
        };
        let body = json!({ "code": self.code(), "message": self.message() });
        (status, Json(body)).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Caller IP precedence (§4.2): `X-Forwarded-For`'s first hop, then
/// `X-Real-IP`, then the TCP peer address axum records via `ConnectInfo`
/// (wired in `main.rs` via `into_make_service_with_connect_info`).
pub(crate) fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            return first.trim().to_string();
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        return real_ip.trim().to_string();
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Maps an axum/http method onto the RBAC table's framework-independent
/// `Method`. Methods the table has no concept of (HEAD, OPTIONS, ...) are
/// treated as `Get` for lookup purposes, since this system's routes are
/// all read/write CRUD verbs.
fn rbac_method(method: &axum::http::Method) -> jobgrid_auth::Method {
    match method.as_str() {
        "POST" => jobgrid_auth::Method::Post,
        "PUT" | "PATCH" => jobgrid_auth::Method::Put,
        "DELETE" => jobgrid_auth::Method::Delete,
        _ => jobgrid_auth::Method::Get,
    }
}

fn user_agent(parts: &Parts) -> String {
    parts
        .headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Parses and validates the caller's identity for one request: skip-listed
/// paths pass through as anonymous, everything else needs a live, enabled
/// bearer token. The sole parsing path — called once by [`auth_layer`],
/// never re-run downstream.
async fn authenticate(parts: &mut Parts, services: &EdgeServices) -> Result<RequestContext, EdgeRejection> {
    let path = parts.uri.path().to_string();
    let request_id = Ulid::new().to_string();
    let ip = client_ip(&parts.headers, &parts.extensions);
    let agent = user_agent(parts);

    if services.skip_paths.iter().any(|p| *p == path) {
        return Ok(RequestContext {
            user: None,
            request_id,
            client_ip: ip,
            user_agent: agent,
        });
    }

    let token = bearer_token(parts).ok_or(EdgeRejection::MissingToken)?;
    let claims = services.token_service.parse_token(token).map_err(|e| {
        if matches!(e, jobgrid_auth::TokenError::TokenExpired) {
            EdgeRejection::TokenExpired
        } else {
            EdgeRejection::InvalidToken
        }
    })?;

    if !claims.enabled {
        return Err(EdgeRejection::Disabled);
    }

    let user = claims.to_user().map_err(|_| EdgeRejection::InvalidToken)?;

    Ok(RequestContext {
        user: Some(user),
        request_id,
        client_ip: ip,
        user_agent: agent,
    })
}

/// Authentication layer (§4.9): runs before rate limiting so an
/// unauthenticated caller is rejected before consuming rate-limit budget.
/// Stashes the resulting [`RequestContext`] in the request's extensions for
/// [`rbac_layer`], the audit layer, and every handler-level extractor
/// downstream to read back.
pub async fn auth_layer(State(services): State<Arc<EdgeServices>>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let context = match authenticate(&mut parts, &services).await {
        Ok(context) => context,
        Err(rejection) => return rejection.into_response(),
    };
    parts.extensions.insert(context);
    next.run(Request::from_parts(parts, body)).await
}

/// RBAC layer (§4.9, §4.3): requires the authenticated user to hold the
/// permission `RbacPolicy` maps this request's `(method, path)` to,
/// short-circuiting for admins. Runs after rate limiting and before audit,
/// reading the context [`auth_layer`] already validated.
pub async fn rbac_layer(State(services): State<Arc<EdgeServices>>, request: Request, next: Next) -> Response {
    let method = rbac_method(request.method());
    let path = request.uri().path().to_string();
    let Some(context) = request.extensions().get::<RequestContext>() else {
        return EdgeRejection::MissingToken.into_response();
    };

    match context.user() {
        Some(user) if user.is_admin() => {}
        Some(user) => {
            if let Some(permission) = services.rbac.required_permission(method, &path) {
                if !user.has_permission(permission) {
                    return EdgeRejection::Forbidden.into_response();
                }
            }
        }
        None => {
            if services.rbac.required_permission(method, &path).is_some() {
                return EdgeRejection::MissingToken.into_response();
            }
        }
    }

    next.run(request).await
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = EdgeRejection;

    /// Reads the context [`auth_layer`] already attached to the request —
    /// this never re-parses a token.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestContext>().cloned().ok_or(EdgeRejection::MissingToken)
    }
}

/// Guarantees the request carries an authenticated user, for handlers that
/// need one (RBAC itself was already enforced by [`rbac_layer`]).
pub struct Authorized(pub RequestContext);

impl<S> FromRequestParts<S> for Authorized
where
    S: Send + Sync,
{
    type Rejection = EdgeRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = RequestContext::from_request_parts(parts, state).await?;
        if context.user.is_none() {
            return Err(EdgeRejection::MissingToken);
        }
        Ok(Self(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_prefers_forwarded_for_first_hop() {
        let mut req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.5, 70.41.3.18")
            .body(())
            .unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(client_ip(&parts.headers, &parts.extensions), "203.0.113.5");
        req = axum::http::Request::builder().body(()).unwrap();
        let (parts, _) = req.into_parts();
        assert_eq!(client_ip(&parts.headers, &parts.extensions), "unknown");
    }

    #[test]
    fn client_ip_falls_back_to_connect_info() {
        let mut req = axum::http::Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 7], 1234))));
        let (parts, _) = req.into_parts();
        assert_eq!(client_ip(&parts.headers, &parts.extensions), "198.51.100.7");
    }
}
