//! Routes and the edge middleware stack assembly (§4.9, §6).

pub mod audit;
pub mod auth;
pub mod datasources;
pub mod health;
pub mod system;
pub mod tasks;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Builds the full router: every path from §6's table, wrapped outer-to-
/// inner in recovery → request-id → authentication → rate-limit → RBAC →
/// audit, per §4.9. Auth and RBAC each run as an unconditional
/// `from_fn_with_state` layer (see `jobgrid_edge::middleware`); handlers
/// pull the already-authenticated context back out via the `Authorized`/
/// `RequestContext` extractors.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let audit_sink = state.audit.clone();
    let rate_limiter = state.rate_limiter.clone();
    let edge_services = state.edge.clone();

    let router = Router::new()
        .route("/health", get(health::health))
        .route("/api/v1/login", post(auth::login))
        .route("/api/v1/refresh", post(auth::refresh))
        .route("/api/v1/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/api/v1/tasks/{id}",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/api/v1/tasks/{id}/start", post(tasks::start_task))
        .route("/api/v1/tasks/{id}/stop", post(tasks::stop_task))
        .route("/api/v1/tasks/{id}/pause", post(tasks::pause_task))
        .route("/api/v1/tasks/{id}/resume", post(tasks::resume_task))
        .route("/api/v1/tasks/{id}/retry", post(tasks::retry_task))
        .route(
            "/api/v1/datasources",
            get(datasources::list_datasources).post(datasources::create_datasource),
        )
        .route("/api/v1/datasources/batch", post(datasources::batch_update_datasources))
        .route("/api/v1/datasources/export", get(datasources::export_datasources))
        .route("/api/v1/datasources/import", post(datasources::import_datasources))
        .route(
            "/api/v1/datasources/{id}",
            get(datasources::get_datasource)
                .put(datasources::update_datasource)
                .delete(datasources::delete_datasource),
        )
        .route("/api/v1/datasources/{id}/test", post(datasources::test_datasource))
        .route("/api/v1/audit", get(audit::list_audit_records))
        .route("/api/v1/audit/{entity_id}", get(audit::get_entity_audit_records))
        .route("/api/v1/system/status", get(system::status))
        .route("/api/v1/system/scheduler", post(system::switch_scheduler))
        .with_state(state);

    router
        .layer(axum::middleware::from_fn_with_state(audit_sink, jobgrid_edge::audit_layer))
        .layer(axum::middleware::from_fn_with_state(
            edge_services.clone(),
            jobgrid_edge::rbac_layer,
        ))
        .layer(axum::middleware::from_fn_with_state(
            rate_limiter,
            jobgrid_edge::rate_limit_layer,
        ))
        .layer(axum::middleware::from_fn_with_state(edge_services, jobgrid_edge::auth_layer))
        .layer(axum::middleware::from_fn(jobgrid_edge::request_id_layer))
        .layer(jobgrid_edge::recovery_layer())
}
