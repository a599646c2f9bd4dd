//! External Adapter reference implementation (C8, §4.7).
//!
//! Maintains a local `internal_id → {external_workflow_code,
//! external_schedule_id, workflow}` map and mirrors every lifecycle call
//! onto a remote orchestrator over HTTP. The adapter's lock is always
//! released before the outbound request is issued (§9 re-architecture
//! note on mixed lock-holding and blocking remote calls).

use crate::adapter::{CreateWorkflowRequest, SchedulerAdapter, UpdateWorkflowRequest};
use crate::error::{AdapterError, WorkflowError};
use crate::workflow::{ScheduleKind, Workflow, WorkflowExecution, WorkflowStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobgrid_core::{ExecutionId, WorkflowId};
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

#[derive(Clone)]
struct RemoteWorkflow {
    workflow: Workflow,
    external_code: String,
    external_schedule_id: Option<String>,
}

#[derive(Default)]
struct State {
    workflows: HashMap<WorkflowId, RemoteWorkflow>,
    executions: HashMap<ExecutionId, WorkflowExecution>,
    /// Insertion order of `executions`, since `HashMap` iteration order is
    /// arbitrary and `list_executions`' descending-by-start-time sort needs
    /// a stable starting order to break ties on.
    execution_order: Vec<ExecutionId>,
}

impl State {
    fn record_execution(&mut self, id: ExecutionId, execution: WorkflowExecution) {
        if self.executions.insert(id, execution).is_none() {
            self.execution_order.push(id);
        }
    }
}

/// Static bearer-token configuration for the reference HTTP client.
#[derive(Debug, Clone)]
pub struct ExternalAdapterConfig {
    pub base_url: String,
    pub bearer_token: String,
    pub timezone: String,
    pub request_timeout: Duration,
}

/// The reference external scheduler adapter. Talks to a remote
/// orchestrator over `reqwest`, form/JSON-encoded per the remote's
/// convention; a non-2xx response is treated as `RemoteError`.
#[derive(Clone)]
pub struct ExternalAdapter {
    config: ExternalAdapterConfig,
    client: Client,
    state: Arc<Mutex<State>>,
}

impl ExternalAdapter {
    /// # Panics
    ///
    /// Panics if `reqwest::Client::builder()` fails to build (invalid TLS
    /// configuration), mirroring the teacher's OIDC discovery client setup.
    #[must_use]
    pub fn new(config: ExternalAdapterConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("reqwest client configuration is valid");
        Self {
            config,
            client,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn remote_cron(schedule_kind: &ScheduleKind, timezone: &str) -> Result<Value, AdapterError> {
        let cron = match schedule_kind {
            ScheduleKind::Cron { cron_expr } => cron_expr.clone(),
            ScheduleKind::Interval { interval_seconds } => {
                bucket_interval_to_cron(*interval_seconds)
            }
            ScheduleKind::Immediate | ScheduleKind::Once { .. } => {
                return Err(WorkflowError::InvalidTransition {
                    reason: "remote schedule requires cron or interval".to_string(),
                }
                .into());
            }
        };
        Ok(serde_json::json!({ "cron": cron, "timezone": timezone }))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, AdapterError> {
        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::RemoteError {
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(AdapterError::RemoteError {
                reason: format!("remote returned status {}", response.status()),
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| AdapterError::RemoteError {
                reason: e.to_string(),
            })
    }
}

fn bucket_interval_to_cron(interval_seconds: u64) -> String {
    if interval_seconds % 3600 == 0 {
        format!("0 0 */{} * * *", interval_seconds / 3600)
    } else if interval_seconds % 60 == 0 {
        format!("0 */{} * * * *", interval_seconds / 60)
    } else {
        format!("*/{interval_seconds} * * * * *")
    }
}

#[async_trait]
impl SchedulerAdapter for ExternalAdapter {
    #[instrument(skip(self, _cancellation))]
    async fn initialize(&self, _cancellation: CancellationToken) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn shutdown(&self, _cancellation: CancellationToken) -> Result<(), AdapterError> {
        self.state.lock().workflows.clear();
        Ok(())
    }

    #[instrument(skip(self, req), fields(workflow_id = %req.id))]
    async fn create_workflow(&self, req: CreateWorkflowRequest) -> Result<Workflow, AdapterError> {
        req.schedule.validate().map_err(WorkflowError::from)?;
        if self.state.lock().workflows.contains_key(&req.id) {
            return Err(WorkflowError::Conflict { id: req.id }.into());
        }

        let mut workflow = Workflow::new(req.id.clone(), req.name.clone(), req.schedule.clone());
        workflow.description = req.description;
        workflow.config = req.config;
        workflow.data_source_id = req.data_source_id;
        workflow.properties = req.properties;

        let body = serde_json::json!({
            "name": req.name,
            "definition": { "tasks": [workflow.config.clone()] },
        });
        let response = self.post("/api/projects/definitions", body).await?;
        let external_code = response
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        workflow.external_id = Some(external_code.clone());

        self.state.lock().workflows.insert(
            req.id,
            RemoteWorkflow {
                workflow: workflow.clone(),
                external_code,
                external_schedule_id: None,
            },
        );
        Ok(workflow)
    }

    async fn update_workflow(
        &self,
        id: WorkflowId,
        req: UpdateWorkflowRequest,
    ) -> Result<Workflow, AdapterError> {
        let external_code = {
            let state = self.state.lock();
            state
                .workflows
                .get(&id)
                .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?
                .external_code
                .clone()
        };
        let body = serde_json::json!({ "code": external_code, "update": true });
        self.post("/api/projects/definitions/update", body).await?;

        let mut state = self.state.lock();
        let remote = state
            .workflows
            .get_mut(&id)
            .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?;
        if let Some(name) = req.name {
            remote.workflow.name = name;
        }
        if let Some(description) = req.description {
            remote.workflow.description = description;
        }
        if let Some(schedule) = req.schedule {
            remote.workflow.schedule = schedule;
        }
        if let Some(config) = req.config {
            remote.workflow.config = config;
        }
        if let Some(properties) = req.properties {
            remote.workflow.properties = properties;
        }
        Ok(remote.workflow.clone())
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), AdapterError> {
        let remote = self.state.lock().workflows.get(&id).cloned();
        let Some(remote) = remote.map(|r| (r.external_code.clone(), r.external_schedule_id.clone())) else {
            return Ok(());
        };
        let (external_code, external_schedule_id) = remote;

        if let Some(schedule_id) = external_schedule_id {
            if let Err(e) = self
                .post(
                    "/api/schedules/offline",
                    serde_json::json!({ "schedule_id": schedule_id }),
                )
                .await
            {
                warn!(workflow_id = %id, error = %e, "failed to offline remote schedule during delete");
            }
            if let Err(e) = self
                .post(
                    "/api/schedules/delete",
                    serde_json::json!({ "schedule_id": schedule_id }),
                )
                .await
            {
                warn!(workflow_id = %id, error = %e, "failed to delete remote schedule during delete");
            }
        }
        if let Err(e) = self
            .post(
                "/api/projects/definitions/delete",
                serde_json::json!({ "code": external_code }),
            )
            .await
        {
            warn!(workflow_id = %id, error = %e, "failed to delete remote definition during delete");
        }

        self.state.lock().workflows.remove(&id);
        Ok(())
    }

    async fn start_workflow(&self, id: WorkflowId) -> Result<(), AdapterError> {
        let (external_code, schedule, has_schedule_id) = {
            let state = self.state.lock();
            let remote = state
                .workflows
                .get(&id)
                .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?;
            (
                remote.external_code.clone(),
                remote.workflow.schedule.clone(),
                remote.external_schedule_id.is_some(),
            )
        };

        self.post(
            "/api/projects/definitions/online",
            serde_json::json!({ "code": external_code }),
        )
        .await?;

        if !has_schedule_id && !matches!(schedule.kind, ScheduleKind::Immediate | ScheduleKind::Once { .. })
        {
            let timezone = schedule.timezone.clone().unwrap_or(self.config.timezone.clone());
            let cron_body = Self::remote_cron(&schedule.kind, &timezone)?;
            let response = self
                .post("/api/schedules/create", cron_body)
                .await?;
            let schedule_id = response
                .get("schedule_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            self.post(
                "/api/schedules/online",
                serde_json::json!({ "schedule_id": schedule_id }),
            )
            .await?;

            let mut state = self.state.lock();
            if let Some(remote) = state.workflows.get_mut(&id) {
                remote.external_schedule_id = Some(schedule_id);
                remote.workflow.status = WorkflowStatus::Active;
            }
        } else {
            let mut state = self.state.lock();
            if let Some(remote) = state.workflows.get_mut(&id) {
                remote.workflow.status = WorkflowStatus::Active;
            }
        }
        Ok(())
    }

    async fn pause_workflow(&self, id: WorkflowId) -> Result<(), AdapterError> {
        let schedule_id = {
            let state = self.state.lock();
            state
                .workflows
                .get(&id)
                .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?
                .external_schedule_id
                .clone()
        };
        if let Some(schedule_id) = schedule_id {
            self.post(
                "/api/schedules/offline",
                serde_json::json!({ "schedule_id": schedule_id }),
            )
            .await?;
        }
        let mut state = self.state.lock();
        if let Some(remote) = state.workflows.get_mut(&id) {
            remote.workflow.status = WorkflowStatus::Paused;
        }
        Ok(())
    }

    async fn resume_workflow(&self, id: WorkflowId) -> Result<(), AdapterError> {
        let schedule_id = {
            let state = self.state.lock();
            state
                .workflows
                .get(&id)
                .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?
                .external_schedule_id
                .clone()
        };
        if let Some(schedule_id) = schedule_id {
            self.post(
                "/api/schedules/online",
                serde_json::json!({ "schedule_id": schedule_id }),
            )
            .await?;
        }
        let mut state = self.state.lock();
        if let Some(remote) = state.workflows.get_mut(&id) {
            remote.workflow.status = WorkflowStatus::Active;
        }
        Ok(())
    }

    async fn trigger_workflow(
        &self,
        id: WorkflowId,
        params: Map<String, Value>,
    ) -> Result<ExecutionId, AdapterError> {
        let external_code = {
            let state = self.state.lock();
            state
                .workflows
                .get(&id)
                .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?
                .external_code
                .clone()
        };
        let response = self
            .post(
                "/api/projects/instances/start",
                serde_json::json!({ "code": external_code, "params": params }),
            )
            .await?;
        let instance_id = response
            .get("instance_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut execution = WorkflowExecution::new(id, Utc::now());
        execution.external_id = Some(instance_id);
        let exec_id = execution.id;
        self.state.lock().record_execution(exec_id, execution);
        Ok(exec_id)
    }

    async fn stop_execution(&self, execution_id: ExecutionId) -> Result<(), AdapterError> {
        let instance_id = {
            let state = self.state.lock();
            state
                .executions
                .get(&execution_id)
                .and_then(|e| e.external_id.clone())
                .ok_or_else(|| WorkflowError::ExecutionNotFound {
                    id: execution_id.to_string(),
                })?
        };
        self.post(
            "/api/projects/instances/stop",
            serde_json::json!({ "instance_id": instance_id }),
        )
        .await?;
        if let Some(exec) = self.state.lock().executions.get_mut(&execution_id) {
            exec.cancel(Utc::now(), "stopped by caller");
        }
        Ok(())
    }

    async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, AdapterError> {
        self.state
            .lock()
            .workflows
            .get(&id)
            .map(|r| r.workflow.clone())
            .ok_or(WorkflowError::NotFound { id })
            .map_err(AdapterError::from)
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<WorkflowExecution, AdapterError> {
        self.state
            .lock()
            .executions
            .get(&id)
            .cloned()
            .ok_or_else(|| {
                WorkflowError::ExecutionNotFound {
                    id: id.to_string(),
                }
                .into()
            })
    }

    async fn list_executions(
        &self,
        workflow_id: WorkflowId,
        limit: usize,
    ) -> Result<Vec<WorkflowExecution>, AdapterError> {
        let state = self.state.lock();
        let mut executions: Vec<WorkflowExecution> = state
            .execution_order
            .iter()
            .filter_map(|id| state.executions.get(id))
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        executions.truncate(limit);
        Ok(executions)
    }

    async fn get_workflow_status(&self, id: WorkflowId) -> Result<WorkflowStatus, AdapterError> {
        Ok(self
            .state
            .lock()
            .workflows
            .get(&id)
            .map(|r| r.workflow.status)
            .unwrap_or(WorkflowStatus::Inactive))
    }

    async fn get_workflow_next_run_time(
        &self,
        _id: WorkflowId,
    ) -> Result<Option<DateTime<Utc>>, AdapterError> {
        // The reference remote does not expose a next-run query in this
        // minimal contract; callers needing it should poll the remote's
        // own schedule listing endpoint directly.
        Ok(None)
    }

    async fn get_running_workflows(&self) -> Result<Vec<WorkflowId>, AdapterError> {
        Ok(self
            .state
            .lock()
            .workflows
            .iter()
            .filter(|(_, r)| r.workflow.status == WorkflowStatus::Active)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn get_execution_logs(&self, id: ExecutionId) -> Result<Vec<String>, AdapterError> {
        let state = self.state.lock();
        let exec = state.executions.get(&id).ok_or_else(|| {
            WorkflowError::ExecutionNotFound {
                id: id.to_string(),
            }
        })?;
        Ok(vec![
            format!("start: {}", exec.start_time),
            format!("state: {:?}", exec.status),
            format!("end: {:?}", exec.end_time),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_interval_prefers_largest_unit() {
        assert_eq!(bucket_interval_to_cron(3600), "0 0 */1 * * *");
        assert_eq!(bucket_interval_to_cron(120), "0 */2 * * * *");
        assert_eq!(bucket_interval_to_cron(45), "*/45 * * * * *");
    }
}
