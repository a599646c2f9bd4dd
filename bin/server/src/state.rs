//! Shared application state, wired once in `main` and cloned per request
//! via `axum::extract::FromRef`, matching the teacher's `Arc<AppState>`
//! convention in `bin/server/src/auth/mod.rs`.

use axum::extract::FromRef;
use jobgrid_audit::AuditSink;
use jobgrid_edge::{EdgeServices, EndpointRateLimiter};
use jobgrid_scheduler::SchedulerManager;
use std::sync::Arc;

use crate::audit_sink::QueryableAuditSink;
use crate::datasource_repo::DatasourceRepo;
use crate::user_repo::UserRepo;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<SchedulerManager>,
    pub edge: Arc<EdgeServices>,
    pub rate_limiter: Arc<EndpointRateLimiter>,
    pub audit: Arc<dyn AuditSink>,
    /// Readable handle onto the in-memory half of `audit`'s fan-out, for the
    /// `/api/v1/audit` routes (§6). See [`crate::audit_sink::CombinedSink`].
    pub audit_query: QueryableAuditSink,
    pub users: Arc<dyn UserRepo>,
    pub datasources: Arc<dyn DatasourceRepo>,
}

impl FromRef<AppState> for Arc<EdgeServices> {
    fn from_ref(state: &AppState) -> Self {
        state.edge.clone()
    }
}

impl FromRef<AppState> for Arc<EndpointRateLimiter> {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}

impl FromRef<AppState> for Arc<dyn AuditSink> {
    fn from_ref(state: &AppState) -> Self {
        state.audit.clone()
    }
}
