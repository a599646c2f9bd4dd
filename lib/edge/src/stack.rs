//! Assembles the edge's `axum` layer stack in the order §4.9 specifies
//! (outermost first): recovery → request-id → authentication → rate limit
//! → RBAC → audit. [`crate::middleware::auth_layer`] and
//! [`crate::middleware::rbac_layer`] live next to the `RequestContext`/
//! `Authorized` extractors they populate; what's assembled here is panic
//! recovery, request-id propagation, rate limiting, and audit emission —
//! plus the ordering itself, which callers wire via repeated `.layer()`
//! calls in [`crate::stack`]'s reverse order (innermost first).

use crate::middleware::RequestContext;
use crate::rate_limit::EndpointRateLimiter;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jobgrid_audit::{AuditRecordBuilder, AuditSink, EntityRef, UserRef};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tower_http::catch_panic::CatchPanicLayer;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// The outermost layer (§4.9 "recovery"): traps panics inside any handler
/// and turns them into a 500 instead of tearing down the connection.
/// Mirrors `tower_http`'s catch-panic equivalent named in the edge stack
/// description.
#[must_use]
pub fn recovery_layer() -> CatchPanicLayer<fn(Box<dyn std::any::Any + Send>) -> Response> {
    CatchPanicLayer::custom(handle_panic)
}

fn handle_panic(_err: Box<dyn std::any::Any + Send>) -> Response {
    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(serde_json::json!({ "code": "INTERNAL", "message": "internal error" })),
    )
        .into_response()
}

/// Stamps `X-Request-ID` on the response, reusing an inbound header value
/// verbatim when the caller already supplied one (so a load balancer's id
/// survives end to end) and minting a ULID otherwise.
pub async fn request_id_layer(request: Request, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(request).await;
    let id = incoming.unwrap_or_else(|| ulid::Ulid::new().to_string());
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Per-endpoint rate limiting (§4.2, §4.9), keyed by the caller's IP as
/// derived by [`crate::middleware`]'s `client_ip` precedence. Runs after
/// auth so a caller's identity is resolvable for future per-user limits,
/// but the limiter itself is IP-keyed per the configuration surface.
pub async fn rate_limit_layer(
    State(limiter): State<Arc<EndpointRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().as_str().to_string();
    let client_key = crate::middleware::client_ip(request.headers(), request.extensions());

    if !limiter.allow(&path, &method, &client_key) {
        let stats = limiter.stats(&path, &method, &client_key);
        let mut response = (
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            axum::Json(serde_json::json!({
                "code": "RATE_LIMIT_EXCEEDED",
                "message": "rate limit exceeded",
            })),
        )
            .into_response();
        insert_rate_limit_headers(&mut response, stats);
        return response;
    }

    let mut response = next.run(request).await;
    let stats = limiter.stats(&path, &method, &client_key);
    insert_rate_limit_headers(&mut response, stats);
    response
}

/// Stamps the rate-limit headers §6 requires: limit/remaining/reset on
/// every response, plus `Retry-After` when the request was denied.
fn insert_rate_limit_headers(response: &mut Response, stats: crate::rate_limit::Stats) {
    let denied = response.status() == axum::http::StatusCode::TOO_MANY_REQUESTS;
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&stats.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&stats.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&stats.reset.to_rfc3339()) {
        headers.insert("x-ratelimit-reset", v);
    }
    if denied {
        let retry_after = (stats.reset - chrono::Utc::now()).num_seconds().max(0);
        if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
            headers.insert("retry-after", v);
        }
    }
}

/// Routes that already emit their own domain-specific audit record
/// (`tasks.rs`'s `emit_task_audit`, `datasources.rs`'s
/// `emit_datasource_audit`, and `stop_task`'s inline record) — this layer
/// skips them so a single mutating request produces exactly one audit
/// record instead of a generic one plus a domain one.
const SELF_AUDITED: &[(&str, &str)] = &[
    ("POST", "/api/v1/tasks"),
    ("PUT", "/api/v1/tasks/*"),
    ("DELETE", "/api/v1/tasks/*"),
    ("POST", "/api/v1/tasks/*/start"),
    ("POST", "/api/v1/tasks/*/pause"),
    ("POST", "/api/v1/tasks/*/resume"),
    ("POST", "/api/v1/tasks/*/retry"),
    ("POST", "/api/v1/tasks/*/stop"),
    ("POST", "/api/v1/datasources"),
    ("PUT", "/api/v1/datasources/*"),
    ("DELETE", "/api/v1/datasources/*"),
    ("POST", "/api/v1/datasources/batch"),
    ("POST", "/api/v1/datasources/import"),
];

fn is_self_audited(method: &str, path: &str) -> bool {
    SELF_AUDITED
        .iter()
        .any(|(m, pattern)| *m == method && jobgrid_auth::match_path(pattern, path))
}

/// One audit record per request (§4.9's final step), tagged with the
/// outcome status and the authenticated user when the request carried
/// one. Routes that emit their own domain record (see [`SELF_AUDITED`])
/// are skipped here to keep the one-record-per-request invariant.
/// Swallows sink failures per the audit crate's fire-and-forget contract
/// — this layer never turns a sink problem into a response change.
pub async fn audit_layer(
    State(sink): State<Arc<dyn AuditSink>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let skip = is_self_audited(&method, &path);
    let user_ref = request
        .extensions()
        .get::<RequestContext>()
        .and_then(RequestContext::user)
        .map(|user| UserRef {
            user_id: user.id().to_string(),
            username: user.username().to_string(),
            role: user.primary_role().to_string(),
        })
        .unwrap_or_else(|| UserRef {
            user_id: "anonymous".to_string(),
            username: "anonymous".to_string(),
            role: "none".to_string(),
        });
    let response = next.run(request).await;
    if skip {
        return response;
    }
    let success = response.status().is_success();

    let record = AuditRecordBuilder::new(
        format!("http_{}", method.to_ascii_lowercase()),
        EntityRef::new("http_request", &path),
        user_ref,
    )
    .details(serde_json::json!({ "path": path, "method": method, "status": response.status().as_u16() }));
    let record = if success { record } else { record.failure("non-2xx response") };
    sink.emit(record.build()).await;

    response
}

/// Background janitor: sweeps rate-limiter state on an interval (§4.2's
/// cleanup period), meant to be spawned once at startup alongside the
/// router.
pub async fn run_rate_limit_janitor(limiter: Arc<EndpointRateLimiter>, period: StdDuration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        limiter.sweep();
    }
}
