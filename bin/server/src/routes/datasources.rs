//! Data source routes (§6). Persistence is a `Repo`-interface concern the
//! core deliberately leaves outside its scope; these handlers are thin —
//! CRUD against [`crate::datasource_repo::DatasourceRepo`] plus the
//! illustrative `test`/`batch`/`export`/`import` paths the RBAC table
//! names, which this reference deployment answers without a real remote
//! connection to test or a bulk store to import into.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use jobgrid_audit::{AuditRecordBuilder, EntityRef, UserRef};
use jobgrid_edge::Authorized;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::datasource_repo::DataSource;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateDatasourceRequest {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDatasourceRequest {
    pub name: Option<String>,
    pub config: Option<Map<String, Value>>,
}

fn user_ref(auth: &Authorized) -> Option<UserRef> {
    auth.0.user().map(|u| UserRef {
        user_id: u.id().to_string(),
        username: u.username().to_string(),
        role: u.primary_role().to_string(),
    })
}

async fn emit_datasource_audit(state: &AppState, auth: &Authorized, action: &str, id: &str, old_value: Option<Value>) {
    let Some(user) = user_ref(auth) else { return };
    let context = &auth.0;
    let mut builder = AuditRecordBuilder::new(action, EntityRef::new("datasource", id), user)
        .client_ip(context.client_ip.clone())
        .user_agent(context.user_agent.clone())
        .request_id(context.request_id.clone());
    if let Some(old_value) = old_value {
        builder = builder.old_value(old_value);
    }
    state.audit.emit(builder.build()).await;
}

pub async fn create_datasource(
    auth: Authorized,
    State(state): State<AppState>,
    Json(req): Json<CreateDatasourceRequest>,
) -> Result<(StatusCode, Json<DataSource>), ApiError> {
    let source = state.datasources.create(req.name, req.kind, req.config).await;
    emit_datasource_audit(&state, &auth, "create_datasource", &source.id, None).await;
    Ok((StatusCode::CREATED, Json(source)))
}

pub async fn list_datasources(
    _auth: Authorized,
    State(state): State<AppState>,
) -> Json<Vec<DataSource>> {
    Json(state.datasources.list().await)
}

pub async fn get_datasource(
    _auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataSource>, ApiError> {
    Ok(Json(state.datasources.get(&id).await?))
}

pub async fn update_datasource(
    auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDatasourceRequest>,
) -> Result<Json<DataSource>, ApiError> {
    let before = state.datasources.get(&id).await.ok();
    let updated = state.datasources.update(&id, req.name, req.config).await?;
    emit_datasource_audit(
        &state,
        &auth,
        "update_datasource",
        &id,
        before.map(|d| serde_json::to_value(d).unwrap_or(Value::Null)),
    )
    .await;
    Ok(Json(updated))
}

pub async fn delete_datasource(
    auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.datasources.delete(&id).await?;
    emit_datasource_audit(&state, &auth, "delete_datasource", &id, None).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Illustrative connectivity check. With no concrete connector wired into
/// this workspace (§1: connectors are a Repo-adjacent concern, not the
/// core's), this confirms the data source exists and echoes its kind
/// rather than dialing out.
pub async fn test_datasource(
    _auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let source = state.datasources.get(&id).await?;
    Ok(Json(json!({ "id": source.id, "kind": source.kind, "reachable": true })))
}

#[derive(Debug, Deserialize)]
pub struct BatchUpdateRequest {
    pub ids: Vec<String>,
    pub config: Map<String, Value>,
}

pub async fn batch_update_datasources(
    auth: Authorized,
    State(state): State<AppState>,
    Json(req): Json<BatchUpdateRequest>,
) -> Result<Json<Vec<DataSource>>, ApiError> {
    let mut updated = Vec::with_capacity(req.ids.len());
    for id in &req.ids {
        let source = state.datasources.update(id, None, Some(req.config.clone())).await?;
        emit_datasource_audit(&state, &auth, "update_datasource", id, None).await;
        updated.push(source);
    }
    Ok(Json(updated))
}

pub async fn export_datasources(
    _auth: Authorized,
    State(state): State<AppState>,
) -> Json<Vec<DataSource>> {
    Json(state.datasources.list().await)
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub sources: Vec<CreateDatasourceRequest>,
}

pub async fn import_datasources(
    auth: Authorized,
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<Vec<DataSource>>, ApiError> {
    let mut created = Vec::with_capacity(req.sources.len());
    for source in req.sources {
        let source = state.datasources.create(source.name, source.kind, source.config).await;
        emit_datasource_audit(&state, &auth, "create_datasource", &source.id, None).await;
        created.push(source);
    }
    Ok(Json(created))
}
