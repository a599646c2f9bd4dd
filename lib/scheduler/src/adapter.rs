//! The `SchedulerAdapter` contract shared by the built-in (C6) and external
//! (C8) implementations, and consumed by the scheduler manager (C9).
//!
//! §9 re-architecture note: the source asserts `StartWorkflow`/
//! `StopWorkflow` support at runtime via an interface type-check. Here
//! every adapter implements the full trait directly — there is no optional
//! capability to downcast for.

use crate::error::AdapterError;
use crate::workflow::{Workflow, WorkflowExecution};
use async_trait::async_trait;
use jobgrid_core::{ExecutionId, WorkflowId};
use tokio_util::sync::CancellationToken;

/// Request payload for `create_workflow`.
#[derive(Debug, Clone)]
pub struct CreateWorkflowRequest {
    pub id: WorkflowId,
    pub name: String,
    pub description: String,
    pub schedule: crate::workflow::Schedule,
    pub config: serde_json::Map<String, serde_json::Value>,
    pub data_source_id: Option<String>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Request payload for `update_workflow`; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub schedule: Option<crate::workflow::Schedule>,
    pub config: Option<serde_json::Map<String, serde_json::Value>>,
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
}

/// The contract both the built-in and external schedulers satisfy.
#[async_trait]
pub trait SchedulerAdapter: Send + Sync {
    /// Starts the adapter's background machinery (e.g. the cron engine).
    /// Idempotent.
    async fn initialize(&self, cancellation: CancellationToken) -> Result<(), AdapterError>;

    /// Stops the adapter, observing `cancellation` as the upper bound on
    /// how long to wait for in-flight work to quiesce (§5).
    async fn shutdown(&self, cancellation: CancellationToken) -> Result<(), AdapterError>;

    async fn create_workflow(&self, req: CreateWorkflowRequest) -> Result<Workflow, AdapterError>;
    async fn update_workflow(
        &self,
        id: WorkflowId,
        req: UpdateWorkflowRequest,
    ) -> Result<Workflow, AdapterError>;
    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), AdapterError>;

    async fn start_workflow(&self, id: WorkflowId) -> Result<(), AdapterError>;
    async fn pause_workflow(&self, id: WorkflowId) -> Result<(), AdapterError>;
    async fn resume_workflow(&self, id: WorkflowId) -> Result<(), AdapterError>;

    /// Fires a workflow immediately regardless of `is_running` (§4.5).
    async fn trigger_workflow(
        &self,
        id: WorkflowId,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> Result<ExecutionId, AdapterError>;

    async fn stop_execution(&self, execution_id: ExecutionId) -> Result<(), AdapterError>;

    async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, AdapterError>;
    async fn get_execution(&self, id: ExecutionId) -> Result<WorkflowExecution, AdapterError>;
    async fn list_executions(
        &self,
        workflow_id: WorkflowId,
        limit: usize,
    ) -> Result<Vec<WorkflowExecution>, AdapterError>;

    /// Returns `inactive` for an unknown workflow rather than erroring,
    /// keeping the source's drop-in-compatible polling behavior (§9 Q4).
    async fn get_workflow_status(
        &self,
        id: WorkflowId,
    ) -> Result<crate::workflow::WorkflowStatus, AdapterError>;

    async fn get_workflow_next_run_time(
        &self,
        id: WorkflowId,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>, AdapterError>;

    async fn get_running_workflows(&self) -> Result<Vec<WorkflowId>, AdapterError>;

    async fn get_execution_logs(&self, id: ExecutionId) -> Result<Vec<String>, AdapterError>;
}
