//! Audit log read endpoints (§4.4, §6), backed by the in-memory half of the
//! binary's fan-out audit sink (`state.audit_query`).

use axum::extract::{Path, Query, State};
use axum::Json;
use jobgrid_audit::AuditRecord;
use jobgrid_edge::Authorized;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListAuditQuery {
    pub entity_type: Option<String>,
    pub action: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

pub async fn list_audit_records(
    _auth: Authorized,
    State(state): State<AppState>,
    Query(query): Query<ListAuditQuery>,
) -> Json<Vec<AuditRecord>> {
    let mut records = state.audit_query.records();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let filtered = records
        .into_iter()
        .filter(|r| query.entity_type.as_deref().is_none_or(|t| r.entity.entity_type == t))
        .filter(|r| query.action.as_deref().is_none_or(|a| r.action == a))
        .take(query.limit)
        .collect();
    Json(filtered)
}

/// Audit trail scoped to a single entity (e.g. one workflow or data
/// source), keyed on the path segment against `entity.entity_id`.
pub async fn get_entity_audit_records(
    _auth: Authorized,
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Json<Vec<AuditRecord>> {
    let mut records: Vec<AuditRecord> = state
        .audit_query
        .records()
        .into_iter()
        .filter(|r| r.entity.entity_id == entity_id)
        .collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Json(records)
}
