//! Login/refresh (§4.3, §6). Both paths are on the auth skip list —
//! `RequestContext` is still extracted here for its request id/IP/agent,
//! but carries no authenticated user to gate on.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use jobgrid_audit::{AuditRecordBuilder, EntityRef, UserRef};
use jobgrid_auth::User;
use jobgrid_edge::RequestContext;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

fn user_ref(user: &User) -> UserRef {
    UserRef {
        user_id: user.id().to_string(),
        username: user.username().to_string(),
        role: user.primary_role().to_string(),
    }
}

fn issue_tokens(state: &AppState, user: &User) -> Result<TokenResponse, ApiError> {
    let access_token = state
        .edge
        .token_service
        .generate_access_token(user)
        .map_err(|e| ApiError::InvalidRequest {
            message: e.to_string(),
        })?;
    let refresh_token = state
        .edge
        .token_service
        .generate_refresh_token(user)
        .map_err(|e| ApiError::InvalidRequest {
            message: e.to_string(),
        })?;
    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
    })
}

pub async fn login(
    State(state): State<AppState>,
    context: RequestContext,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let unauthorized = || ApiError::Unauthorized {
        message: "invalid username or password".to_string(),
    };

    let Some(user) = state.users.find_by_username(&req.username).await else {
        audit_login_failure(&state, &context, &req.username).await;
        return Err(unauthorized());
    };
    if !state.users.verify_password(&req.username, &req.password).await {
        audit_login_failure(&state, &context, &req.username).await;
        return Err(unauthorized());
    }
    if !user.enabled() {
        return Err(ApiError::Unauthorized {
            message: "user disabled".to_string(),
        });
    }

    let response = issue_tokens(&state, &user)?;

    let record = AuditRecordBuilder::new("login", EntityRef::new("user", user.id().to_string()), user_ref(&user))
        .client_ip(context.client_ip.clone())
        .user_agent(context.user_agent.clone())
        .request_id(context.request_id.clone())
        .build();
    state.audit.emit(record).await;

    Ok(Json(response))
}

async fn audit_login_failure(state: &AppState, context: &RequestContext, username: &str) {
    let record = AuditRecordBuilder::new(
        "login_failed",
        EntityRef::new("user", username),
        UserRef {
            user_id: "unknown".to_string(),
            username: username.to_string(),
            role: "none".to_string(),
        },
    )
    .client_ip(context.client_ip.clone())
    .user_agent(context.user_agent.clone())
    .request_id(context.request_id.clone())
    .failure("invalid credentials")
    .build();
    state.audit.emit(record).await;
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn refresh(
    State(state): State<AppState>,
    context: RequestContext,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = bearer_from_headers(&headers).ok_or_else(|| ApiError::Unauthorized {
        message: "missing bearer token".to_string(),
    })?;

    let claims = state
        .edge
        .token_service
        .parse_token(token)
        .map_err(|e| ApiError::Unauthorized {
            message: e.to_string(),
        })?;
    if !claims.enabled {
        return Err(ApiError::Unauthorized {
            message: "user disabled".to_string(),
        });
    }
    let user = claims.to_user().map_err(|e| ApiError::Unauthorized {
        message: e.to_string(),
    })?;

    let response = issue_tokens(&state, &user)?;

    let record = AuditRecordBuilder::new(
        "token_refresh",
        EntityRef::new("user", user.id().to_string()),
        user_ref(&user),
    )
    .client_ip(context.client_ip.clone())
    .user_agent(context.user_agent.clone())
    .request_id(context.request_id.clone())
    .build();
    state.audit.emit(record).await;

    Ok(Json(response))
}
