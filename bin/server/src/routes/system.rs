//! `/api/v1/system/*` (§6): `system:admin`-gated operational endpoints.
//! RBAC matches any method/depth under this prefix (§4.3's wildcard rule),
//! so these are the only handlers mounted on a catch-all path in this
//! binary.

use axum::extract::State;
use axum::Json;
use jobgrid_edge::Authorized;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// Reports which scheduler adapter is currently active.
pub async fn status(_auth: Authorized, State(state): State<AppState>) -> Json<Value> {
    let current = state.scheduler.current_type().await;
    Json(json!({ "scheduler_type": current }))
}

#[derive(Debug, serde::Deserialize)]
pub struct SwitchSchedulerRequest {
    pub scheduler_type: String,
}

/// Switches the active scheduler adapter, migrating tasks per §4.8.
pub async fn switch_scheduler(
    _auth: Authorized,
    State(state): State<AppState>,
    Json(req): Json<SwitchSchedulerRequest>,
) -> Result<Json<Value>, ApiError> {
    state.scheduler.switch_scheduler(&req.scheduler_type).await?;
    Ok(Json(json!({ "scheduler_type": req.scheduler_type })))
}
