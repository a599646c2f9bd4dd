//! Scheduler manager (C9, §4.8): multiplexes one active scheduler adapter
//! and migrates workflows across adapters on switch.

use crate::adapter::{CreateWorkflowRequest, SchedulerAdapter, UpdateWorkflowRequest};
use crate::error::ManagerError;
use crate::workflow::{Workflow, WorkflowExecution, WorkflowStatus};
use chrono::{DateTime, Utc};
use jobgrid_collector::{CollectionTask, TaskRepo};
use jobgrid_core::{ExecutionId, WorkflowId};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

/// The task-facing status vocabulary (§4.8's translation table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Active,
    Inactive,
    Paused,
    Failed,
}

impl From<WorkflowStatus> for TaskStatus {
    fn from(status: WorkflowStatus) -> Self {
        match status {
            WorkflowStatus::Active => Self::Active,
            WorkflowStatus::Inactive => Self::Inactive,
            WorkflowStatus::Paused => Self::Paused,
            WorkflowStatus::Error => Self::Failed,
        }
    }
}

fn task_to_create_request(
    task: &CollectionTask,
    name: impl Into<String>,
    schedule: crate::workflow::Schedule,
) -> CreateWorkflowRequest {
    let mut config = Map::new();
    for (k, v) in &task.config {
        config.insert(k.clone(), v.clone());
    }
    CreateWorkflowRequest {
        id: task.workflow_id.clone(),
        name: name.into(),
        description: String::new(),
        schedule,
        config,
        data_source_id: Some(task.data_source_id.clone()),
        properties: Map::new(),
    }
}

/// Whether a just-migrated task's config marks it as previously active.
/// The collector's `CollectionTask` has no first-class status field (that
/// lives on the scheduler side's `Workflow`); migration reads it back out
/// of the opaque `config` map under the `status` key it was stored with.
fn config_marks_active(task: &CollectionTask) -> bool {
    task.config.get("status").and_then(Value::as_str) == Some("active")
}

struct Registered {
    adapter: Arc<dyn SchedulerAdapter>,
}

struct Inner {
    adapters: HashMap<String, Registered>,
    current_type: Option<String>,
}

/// Multiplexes scheduler adapters and exposes the public task-facing API
/// (`CreateTask`/`UpdateTask`/... of §4.8) by translating to/from `Workflow`
/// DTOs and forwarding to whichever adapter is current.
pub struct SchedulerManager {
    inner: Arc<Mutex<Inner>>,
    repo: Option<Arc<dyn TaskRepo>>,
}

impl SchedulerManager {
    #[must_use]
    pub fn new(repo: Option<Arc<dyn TaskRepo>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                adapters: HashMap::new(),
                current_type: None,
            })),
            repo,
        }
    }

    /// Registers an adapter under `type_name`. Does not initialize it or
    /// make it current.
    pub async fn register_adapter(
        &self,
        type_name: impl Into<String>,
        adapter: Arc<dyn SchedulerAdapter>,
    ) {
        let mut inner = self.inner.lock().await;
        inner
            .adapters
            .insert(type_name.into(), Registered { adapter });
    }

    /// Picks `default_type` as current and initializes it.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::UnknownAdapterType` if `default_type` was not
    /// registered, or the adapter's own initialize error otherwise.
    pub async fn initialize(&self, default_type: &str) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().await;
        let adapter = inner
            .adapters
            .get(default_type)
            .ok_or_else(|| ManagerError::UnknownAdapterType {
                type_name: default_type.to_string(),
            })?
            .adapter
            .clone();
        adapter.initialize(CancellationToken::new()).await?;
        inner.current_type = Some(default_type.to_string());
        Ok(())
    }

    /// Shuts down every registered adapter.
    pub async fn shutdown(&self) -> Result<(), ManagerError> {
        let inner = self.inner.lock().await;
        for (type_name, registered) in &inner.adapters {
            if let Err(e) = registered.adapter.shutdown(CancellationToken::new()).await {
                warn!(adapter = %type_name, error = %e, "adapter shutdown failed");
            }
        }
        Ok(())
    }

    async fn current(&self) -> Result<Arc<dyn SchedulerAdapter>, ManagerError> {
        let inner = self.inner.lock().await;
        let type_name = inner
            .current_type
            .clone()
            .ok_or(ManagerError::AdapterUnavailable)?;
        inner
            .adapters
            .get(&type_name)
            .map(|r| r.adapter.clone())
            .ok_or(ManagerError::AdapterUnavailable)
    }

    /// Switches the current adapter to `new_type`, migrating active
    /// workflows from the old adapter via the configured `TaskRepo`.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError::UnknownAdapterType` if `new_type` was not
    /// registered.
    #[instrument(skip(self))]
    pub async fn switch_scheduler(&self, new_type: &str) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().await;

        let new_adapter = inner
            .adapters
            .get(new_type)
            .ok_or_else(|| ManagerError::UnknownAdapterType {
                type_name: new_type.to_string(),
            })?
            .adapter
            .clone();
        new_adapter.initialize(CancellationToken::new()).await?;

        let old = inner
            .current_type
            .clone()
            .and_then(|t| inner.adapters.get(&t).map(|r| (t, r.adapter.clone())));

        if let Some(repo) = &self.repo {
            self.migrate(repo.as_ref(), &new_adapter).await;
        }

        if let Some((old_type, old_adapter)) = old {
            if old_type != new_type {
                if let Err(e) = old_adapter.shutdown(CancellationToken::new()).await {
                    warn!(adapter = %old_type, error = %e, "old adapter shutdown failed during switch");
                }
            }
        }

        inner.current_type = Some(new_type.to_string());
        Ok(())
    }

    async fn migrate(&self, repo: &dyn TaskRepo, new_adapter: &Arc<dyn SchedulerAdapter>) {
        const PAGE_SIZE: u64 = 1000;
        let mut offset = 0u64;
        loop {
            let page = match repo.list_paged(offset, PAGE_SIZE).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "migration: failed to list tasks, aborting migration");
                    return;
                }
            };
            if page.items.is_empty() {
                break;
            }
            for task in &page.items {
                let was_active = config_marks_active(task);
                let name = task.workflow_id.to_string();
                // Migration only has the collector's `CollectionTask` to go on, which
                // carries no schedule of its own; the new adapter's copy starts as an
                // on-demand workflow and relies on the caller to re-apply a schedule.
                let req = task_to_create_request(task, name, crate::workflow::Schedule::immediate());
                let id = req.id.clone();
                match new_adapter.create_workflow(req).await {
                    Ok(_) if was_active => {
                        if let Err(e) = new_adapter.start_workflow(id.clone()).await {
                            warn!(workflow_id = %id, error = %e, "migration: failed to start workflow on new adapter");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(workflow_id = %id, error = %e, "migration: failed to create workflow on new adapter");
                    }
                }
            }
            match page.next_offset {
                Some(next) => offset = next,
                None => break,
            }
        }
    }

    /// Creates a task (translated to a `Workflow`) on the current adapter.
    ///
    /// # Errors
    ///
    /// Returns `ManagerError` if no adapter is current or the adapter call
    /// fails.
    pub async fn create_task(
        &self,
        task: &CollectionTask,
        name: impl Into<String>,
        schedule: crate::workflow::Schedule,
    ) -> Result<Workflow, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter
            .create_workflow(task_to_create_request(task, name, schedule))
            .await?)
    }

    pub async fn update_task(
        &self,
        id: WorkflowId,
        req: UpdateWorkflowRequest,
    ) -> Result<Workflow, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.update_workflow(id, req).await?)
    }

    pub async fn delete_task(&self, id: WorkflowId) -> Result<(), ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.delete_workflow(id).await?)
    }

    pub async fn start_task(&self, id: WorkflowId) -> Result<(), ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.start_workflow(id).await?)
    }

    pub async fn stop_task(&self, execution_id: ExecutionId) -> Result<(), ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.stop_execution(execution_id).await?)
    }

    pub async fn pause_task(&self, id: WorkflowId) -> Result<(), ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.pause_workflow(id).await?)
    }

    pub async fn resume_task(&self, id: WorkflowId) -> Result<(), ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.resume_workflow(id).await?)
    }

    pub async fn get_task_status(&self, id: WorkflowId) -> Result<TaskStatus, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.get_workflow_status(id).await?.into())
    }

    pub async fn get_task(&self, id: WorkflowId) -> Result<Workflow, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.get_workflow(id).await?)
    }

    /// Ids of workflows the current adapter considers running. The core
    /// keeps no enumeration of every workflow ever created (§1: persisted
    /// state belongs to the Repo), so this is the closest thing to a task
    /// listing a caller with no `TaskRepo` wired up can get.
    pub async fn list_running_tasks(&self) -> Result<Vec<WorkflowId>, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.get_running_workflows().await?)
    }

    /// Triggers a task. When the current adapter has no distinct
    /// "start" semantics wired up by the caller, this is how ad hoc runs
    /// and emulated `StartTask` calls both flow (§4.8).
    pub async fn trigger_task(
        &self,
        id: WorkflowId,
        params: Map<String, Value>,
    ) -> Result<ExecutionId, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.trigger_workflow(id, params).await?)
    }

    pub async fn get_execution_logs(&self, id: ExecutionId) -> Result<Vec<String>, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.get_execution_logs(id).await?)
    }

    pub async fn get_execution(&self, id: ExecutionId) -> Result<WorkflowExecution, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.get_execution(id).await?)
    }

    pub async fn list_executions(
        &self,
        workflow_id: WorkflowId,
        limit: usize,
    ) -> Result<Vec<WorkflowExecution>, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.list_executions(workflow_id, limit).await?)
    }

    pub async fn get_workflow_next_run_time(
        &self,
        id: WorkflowId,
    ) -> Result<Option<DateTime<Utc>>, ManagerError> {
        let adapter = self.current().await?;
        Ok(adapter.get_workflow_next_run_time(id).await?)
    }

    pub async fn current_type(&self) -> Option<String> {
        self.inner.lock().await.current_type.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::BuiltinScheduler;
    use crate::dependency::DependencyManager;
    use jobgrid_collector::repo::testing::InMemoryTaskRepo;

    fn task(id: &str, active: bool) -> CollectionTask {
        let mut config = Map::new();
        if active {
            config.insert("status".to_string(), Value::from("active"));
        }
        CollectionTask::new(WorkflowId::new(id), "ds1").with_config(config)
    }

    #[tokio::test]
    async fn unregistered_default_type_is_unknown_adapter() {
        let manager = SchedulerManager::new(None);
        let err = manager.initialize("built-in").await.unwrap_err();
        assert!(matches!(err, ManagerError::UnknownAdapterType { .. }));
    }

    #[tokio::test]
    async fn no_current_adapter_is_unavailable() {
        let manager = SchedulerManager::new(None);
        let err = manager
            .get_task_status(WorkflowId::new("w1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::AdapterUnavailable));
    }

    #[tokio::test]
    async fn switch_scheduler_migrates_active_tasks_only() {
        let repo = Arc::new(InMemoryTaskRepo::new());
        repo.insert(task("w1", true));
        repo.insert(task("w2", false));

        let manager = SchedulerManager::new(Some(repo));
        let builtin: Arc<dyn SchedulerAdapter> =
            Arc::new(BuiltinScheduler::new(Arc::new(DependencyManager::default())));
        manager.register_adapter("built-in", builtin).await;
        manager.initialize("built-in").await.unwrap();

        let second = Arc::new(BuiltinScheduler::new(Arc::new(DependencyManager::default())));
        let second_dyn: Arc<dyn SchedulerAdapter> = second.clone();
        manager.register_adapter("second", second_dyn).await;
        manager.switch_scheduler("second").await.unwrap();

        assert_eq!(manager.current_type().await.as_deref(), Some("second"));
        let status_w1 = second
            .get_workflow_status(WorkflowId::new("w1"))
            .await
            .unwrap();
        assert_eq!(status_w1, WorkflowStatus::Active);
        let status_w2 = second
            .get_workflow_status(WorkflowId::new("w2"))
            .await
            .unwrap();
        assert_eq!(status_w2, WorkflowStatus::Inactive);
    }
}
