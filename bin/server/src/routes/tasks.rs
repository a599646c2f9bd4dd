//! Task CRUD and lifecycle actions (C6/C9, §4.5, §4.8, §6).
//!
//! `CollectionTask` (the collector's wire-facing DTO) is translated to/from
//! the scheduler's `Workflow` at this boundary, mirroring the translation
//! `SchedulerManager` itself does one layer down (§4.8).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use jobgrid_audit::{AuditRecordBuilder, EntityRef};
use jobgrid_collector::CollectionTask;
use jobgrid_core::{ExecutionId, WorkflowId};
use jobgrid_edge::Authorized;
use jobgrid_scheduler::{Schedule, ScheduleError, Workflow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// Wire shape for a `Schedule` (§3): a discriminated `kind` plus the window
/// fields common to every kind, matching `ScheduleKind`'s JSON tagging.
#[derive(Debug, Deserialize, Serialize)]
pub struct ScheduleRequest {
    pub kind: String,
    pub start_time: Option<DateTime<Utc>>,
    pub interval_seconds: Option<u64>,
    pub cron_expr: Option<String>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
}

impl ScheduleRequest {
    fn into_schedule(self) -> Result<Schedule, ApiError> {
        let schedule = match self.kind.as_str() {
            "immediate" => Schedule::immediate(),
            "once" => {
                let start_time = self.start_time.ok_or_else(|| ApiError::InvalidRequest {
                    message: "once schedule requires start_time".to_string(),
                })?;
                Schedule::once(start_time)
            }
            "interval" => {
                let interval_seconds = self.interval_seconds.ok_or_else(|| ApiError::InvalidRequest {
                    message: "interval schedule requires interval_seconds".to_string(),
                })?;
                Schedule::interval(interval_seconds)
            }
            "cron" => {
                let cron_expr = self.cron_expr.ok_or_else(|| ApiError::InvalidRequest {
                    message: "cron schedule requires cron_expr".to_string(),
                })?;
                Schedule::cron(cron_expr)
            }
            other => {
                return Err(ApiError::InvalidRequest {
                    message: format!("unknown schedule kind: {other}"),
                })
            }
        }
        .with_window(self.window_start, self.window_end);
        schedule.validate().map_err(|e: ScheduleError| ApiError::InvalidRequest {
            message: e.to_string(),
        })?;
        Ok(schedule)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub id: String,
    pub name: String,
    pub data_source_id: String,
    pub schedule: ScheduleRequest,
    #[serde(default)]
    pub config: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub schedule: Option<ScheduleRequest>,
    pub config: Option<Map<String, Value>>,
    pub properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TriggerRequest {
    #[serde(default)]
    pub params: Map<String, Value>,
}

async fn emit_task_audit(
    state: &AppState,
    auth: &Authorized,
    action: &str,
    workflow_id: &WorkflowId,
    details: Option<Value>,
) {
    let context = &auth.0;
    let Some(user) = context.user() else { return };
    let mut builder = AuditRecordBuilder::new(
        action,
        EntityRef::new("workflow", workflow_id.to_string()),
        jobgrid_audit::UserRef {
            user_id: user.id().to_string(),
            username: user.username().to_string(),
            role: user.primary_role().to_string(),
        },
    )
    .client_ip(context.client_ip.clone())
    .user_agent(context.user_agent.clone())
    .request_id(context.request_id.clone());
    if let Some(details) = details {
        builder = builder.details(details);
    }
    state.audit.emit(builder.build()).await;
}

pub async fn create_task(
    auth: Authorized,
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    let schedule = req.schedule.into_schedule()?;
    let workflow_id = WorkflowId::new(req.id);
    let task = CollectionTask::new(workflow_id.clone(), req.data_source_id).with_config(req.config);

    let workflow = state.scheduler.create_task(&task, req.name, schedule).await?;
    emit_task_audit(&state, &auth, "create_task", &workflow_id, None).await;
    Ok((StatusCode::CREATED, Json(workflow)))
}

pub async fn list_tasks(
    _auth: Authorized,
    State(state): State<AppState>,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    let ids = state.scheduler.list_running_tasks().await?;
    let mut workflows = Vec::with_capacity(ids.len());
    for id in ids {
        if let Ok(workflow) = state.scheduler.get_task(id).await {
            workflows.push(workflow);
        }
    }
    Ok(Json(workflows))
}

pub async fn get_task(
    _auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow = state.scheduler.get_task(WorkflowId::new(id)).await?;
    Ok(Json(workflow))
}

pub async fn update_task(
    auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Workflow>, ApiError> {
    let workflow_id = WorkflowId::new(id);
    let schedule = req.schedule.map(ScheduleRequest::into_schedule).transpose()?;
    let update = jobgrid_scheduler::UpdateWorkflowRequest {
        name: req.name,
        description: req.description,
        schedule,
        config: req.config,
        properties: req.properties,
    };
    let workflow = state.scheduler.update_task(workflow_id.clone(), update).await?;
    emit_task_audit(&state, &auth, "update_task", &workflow_id, None).await;
    Ok(Json(workflow))
}

pub async fn delete_task(
    auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let workflow_id = WorkflowId::new(id);
    state.scheduler.delete_task(workflow_id.clone()).await?;
    emit_task_audit(&state, &auth, "delete_task", &workflow_id, None).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn start_task(
    auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let workflow_id = WorkflowId::new(id);
    state.scheduler.start_task(workflow_id.clone()).await?;
    emit_task_audit(&state, &auth, "start_task", &workflow_id, None).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn pause_task(
    auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let workflow_id = WorkflowId::new(id);
    state.scheduler.pause_task(workflow_id.clone()).await?;
    emit_task_audit(&state, &auth, "pause_task", &workflow_id, None).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume_task(
    auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let workflow_id = WorkflowId::new(id);
    state.scheduler.resume_task(workflow_id.clone()).await?;
    emit_task_audit(&state, &auth, "resume_task", &workflow_id, None).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Stops a single in-flight execution. Unlike the other task actions, the
/// path segment here names an `ExecutionId`, not a `WorkflowId` — stopping
/// is scoped to one run, not the workflow as a whole (§4.5).
pub async fn stop_task(
    auth: Authorized,
    State(state): State<AppState>,
    Path(execution_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let execution_id: ExecutionId = execution_id
        .parse()
        .map_err(|_| ApiError::InvalidRequest {
            message: "invalid execution id".to_string(),
        })?;
    state.scheduler.stop_task(execution_id).await?;
    let context = &auth.0;
    if let Some(user) = context.user() {
        let record = AuditRecordBuilder::new(
            "stop_execution",
            EntityRef::new("execution", execution_id.to_string()),
            jobgrid_audit::UserRef {
                user_id: user.id().to_string(),
                username: user.username().to_string(),
                role: user.primary_role().to_string(),
            },
        )
        .client_ip(context.client_ip.clone())
        .user_agent(context.user_agent.clone())
        .request_id(context.request_id.clone())
        .build();
        state.audit.emit(record).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Ad hoc re-run of a task, regardless of its schedule or `is_running`
/// state (§4.5) — the same trigger semantics the manager exposes for
/// emulated `StartTask` calls.
pub async fn retry_task(
    auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<TriggerRequest>>,
) -> Result<Json<ExecutionId>, ApiError> {
    let workflow_id = WorkflowId::new(id);
    let params = body.map(|Json(req)| req.params).unwrap_or_default();
    let execution_id = state.scheduler.trigger_task(workflow_id.clone(), params).await?;
    emit_task_audit(
        &state,
        &auth,
        "retry_task",
        &workflow_id,
        Some(serde_json::json!({ "execution_id": execution_id.to_string() })),
    )
    .await;
    Ok(Json(execution_id))
}
