//! Built-in scheduler (C6, §4.5): the reference `SchedulerAdapter`
//! implementation backed entirely by in-process state and a `tokio`
//! cron/interval/once engine.

use crate::adapter::{CreateWorkflowRequest, SchedulerAdapter, UpdateWorkflowRequest};
use crate::clock::{Clock, CronSchedule, SystemClock};
use crate::dependency::{DependencyManager, LatestExecution, LatestExecutionLookup};
use crate::error::{AdapterError, WorkflowError};
use crate::workflow::{ScheduleKind, Workflow, WorkflowExecution, WorkflowStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobgrid_collector::{TaskExecutor, TaskRepo};
use jobgrid_core::{ExecutionId, WorkflowId};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

struct Entry {
    workflow: Workflow,
    is_running: bool,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
    cancellation: Option<CancellationToken>,
}

#[derive(Default)]
struct State {
    entries: HashMap<WorkflowId, Entry>,
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

struct ExecutionSnapshot(HashMap<WorkflowId, LatestExecution>);

impl LatestExecutionLookup for ExecutionSnapshot {
    fn latest_execution(&self, workflow_id: &WorkflowId) -> Option<LatestExecution> {
        self.0.get(workflow_id).copied()
    }
}

fn snapshot_latest_executions(state: &State) -> ExecutionSnapshot {
    let mut latest: HashMap<WorkflowId, &WorkflowExecution> = HashMap::new();
    for exec in state.executions.values() {
        latest
            .entry(exec.workflow_id.clone())
            .and_modify(|current| {
                if exec.start_time > current.start_time {
                    *current = exec;
                }
            })
            .or_insert(exec);
    }
    ExecutionSnapshot(
        latest
            .into_iter()
            .map(|(id, exec)| {
                (
                    id,
                    LatestExecution {
                        status: exec.status,
                        end_time: exec.end_time,
                    },
                )
            })
            .collect(),
    )
}

/// The built-in scheduler. Cheap to clone: every field is an `Arc`, so
/// spawned firing tasks hold their own handle without borrowing `self`.
#[derive(Clone)]
pub struct BuiltinScheduler {
    clock: Arc<dyn Clock>,
    dependencies: Arc<DependencyManager>,
    executor: Option<Arc<dyn TaskExecutor>>,
    repo: Option<Arc<dyn TaskRepo>>,
    state: Arc<Mutex<State>>,
}

impl BuiltinScheduler {
    #[must_use]
    pub fn new(dependencies: Arc<DependencyManager>) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            dependencies,
            executor: None,
            repo: None,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>, repo: Arc<dyn TaskRepo>) -> Self {
        self.executor = Some(executor);
        self.repo = Some(repo);
        self
    }

    /// Arms `id` per its schedule kind (§4.5).
    fn arm(&self, id: &WorkflowId) -> Result<(), AdapterError> {
        let (schedule, token) = {
            let mut state = self.state.lock();
            let entry = state
                .entries
                .get_mut(id)
                .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?;
            let token = CancellationToken::new();
            entry.cancellation = Some(token.clone());
            entry.workflow.status = WorkflowStatus::Active;
            (entry.workflow.schedule.clone(), token)
        };

        match schedule.kind {
            ScheduleKind::Immediate => {
                let this = self.clone();
                let id = id.clone();
                tokio::spawn(async move { this.fire_if_not_running(id, Map::new()).await });
            }
            ScheduleKind::Once { start_time } => {
                let this = self.clone();
                let id = id.clone();
                tokio::spawn(async move { this.run_once(id, start_time, token).await });
            }
            ScheduleKind::Interval { interval_seconds } => {
                let this = self.clone();
                let id = id.clone();
                tokio::spawn(async move { this.run_interval(id, interval_seconds, token).await });
            }
            ScheduleKind::Cron { cron_expr } => {
                let cron = CronSchedule::parse(cron_expr)?;
                let this = self.clone();
                let id = id.clone();
                tokio::spawn(async move { this.run_cron(id, cron, token).await });
            }
        }
        Ok(())
    }

    async fn run_once(&self, id: WorkflowId, start_time: DateTime<Utc>, token: CancellationToken) {
        let now = self.clock.now();
        if start_time > now {
            let dur = (start_time - now).to_std().unwrap_or_default();
            tokio::select! {
                () = tokio::time::sleep(dur) => {}
                () = token.cancelled() => return,
            }
        }
        self.fire_if_not_running(id, Map::new()).await;
    }

    async fn run_interval(&self, id: WorkflowId, interval_seconds: u64, token: CancellationToken) {
        let dur = std::time::Duration::from_secs(interval_seconds);
        loop {
            {
                let mut state = self.state.lock();
                if let Some(entry) = state.entries.get_mut(&id) {
                    entry.next_run = Some(self.clock.now() + chrono::Duration::seconds(interval_seconds as i64));
                }
            }
            tokio::select! {
                () = tokio::time::sleep(dur) => {}
                () = token.cancelled() => return,
            }
            self.fire_if_not_running(id.clone(), Map::new()).await;
        }
    }

    async fn run_cron(&self, id: WorkflowId, cron: CronSchedule, token: CancellationToken) {
        loop {
            let now = self.clock.now();
            let Some(next) = cron.next_after(now) else {
                return;
            };
            {
                let mut state = self.state.lock();
                if let Some(entry) = state.entries.get_mut(&id) {
                    entry.next_run = Some(next);
                }
            }
            let dur = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                () = tokio::time::sleep(dur) => {}
                () = token.cancelled() => return,
            }
            self.fire_if_not_running(id.clone(), Map::new()).await;
        }
    }

    async fn fire_if_not_running(&self, id: WorkflowId, params: Map<String, Value>) {
        let already_running = {
            let state = self.state.lock();
            state.entries.get(&id).map(|e| e.is_running).unwrap_or(true)
        };
        if already_running {
            debug!(workflow_id = %id, "skipping time-driven firing: already running");
            return;
        }
        let _ = self.fire(id, params).await;
    }

    /// Firing sequence (§4.5): dependency check, `pending → running`,
    /// invoke the executor if wired, record the terminal outcome.
    #[instrument(skip(self, params), fields(workflow_id = %id))]
    async fn fire(&self, id: WorkflowId, params: Map<String, Value>) -> ExecutionId {
        let now = self.clock.now();
        let snapshot = {
            let state = self.state.lock();
            snapshot_latest_executions(&state)
        };

        let mut execution = WorkflowExecution::new(id.clone(), now);
        if !params.is_empty() {
            execution.result = params;
        }
        let exec_id = execution.id;

        if let Err(dep_err) = self.dependencies.check_dependencies(&id, now, &snapshot) {
            warn!(workflow_id = %id, error = %dep_err, "dependency check failed; execution cancelled");
            execution.cancel(now, dep_err.to_string());
            let mut state = self.state.lock();
            state.record_execution(exec_id, execution);
            return exec_id;
        }

        {
            let mut state = self.state.lock();
            if let Some(entry) = state.entries.get_mut(&id) {
                entry.is_running = true;
                entry.last_run = Some(now);
            }
            execution.start_running();
            state.record_execution(exec_id, execution);
        }
        info!(workflow_id = %id, execution_id = %exec_id, "workflow execution started");

        let outcome = match (&self.executor, &self.repo) {
            (Some(executor), Some(repo)) => match repo.get(id.clone()).await {
                Ok(task) => executor.execute(&task).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            _ => Ok(jobgrid_collector::ExecutionResult::default()),
        };

        let end = self.clock.now();
        {
            let mut state = self.state.lock();
            if let Some(exec) = state.executions.get_mut(&exec_id) {
                match outcome {
                    Ok(result) => exec.complete(end, result.summarize()),
                    Err(reason) => exec.fail(end, reason),
                }
            }
            if let Some(entry) = state.entries.get_mut(&id) {
                entry.is_running = false;
            }
        }
        debug!(workflow_id = %id, execution_id = %exec_id, "workflow execution finished");
        exec_id
    }
}

#[async_trait]
impl SchedulerAdapter for BuiltinScheduler {
    async fn initialize(&self, _cancellation: CancellationToken) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn shutdown(&self, _cancellation: CancellationToken) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        for entry in state.entries.values() {
            if let Some(token) = &entry.cancellation {
                token.cancel();
            }
        }
        state.entries.clear();
        Ok(())
    }

    #[instrument(skip(self, req), fields(workflow_id = %req.id))]
    async fn create_workflow(&self, req: CreateWorkflowRequest) -> Result<Workflow, AdapterError> {
        req.schedule.validate().map_err(WorkflowError::from)?;
        let mut state = self.state.lock();
        if state.entries.contains_key(&req.id) {
            return Err(WorkflowError::Conflict { id: req.id }.into());
        }
        let mut workflow = Workflow::new(req.id.clone(), req.name, req.schedule);
        workflow.description = req.description;
        workflow.config = req.config;
        workflow.data_source_id = req.data_source_id;
        workflow.properties = req.properties;
        info!(workflow_id = %workflow.id, "workflow created");
        state.entries.insert(
            req.id,
            Entry {
                workflow: workflow.clone(),
                is_running: false,
                last_run: None,
                next_run: None,
                cancellation: None,
            },
        );
        Ok(workflow)
    }

    #[instrument(skip(self, req), fields(workflow_id = %id))]
    async fn update_workflow(
        &self,
        id: WorkflowId,
        req: UpdateWorkflowRequest,
    ) -> Result<Workflow, AdapterError> {
        if let Some(schedule) = &req.schedule {
            schedule.validate().map_err(WorkflowError::from)?;
        }

        let disarm_first = {
            let state = self.state.lock();
            let entry = state
                .entries
                .get(&id)
                .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?;
            entry.workflow.status == WorkflowStatus::Active && req.schedule.is_some()
        };
        if disarm_first {
            self.disarm(&id);
        }

        let mut state = self.state.lock();
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?;
        if let Some(name) = req.name {
            entry.workflow.name = name;
        }
        if let Some(description) = req.description {
            entry.workflow.description = description;
        }
        if let Some(schedule) = req.schedule {
            entry.workflow.schedule = schedule;
        }
        if let Some(config) = req.config {
            entry.workflow.config = config;
        }
        if let Some(properties) = req.properties {
            entry.workflow.properties = properties;
        }
        entry.workflow.updated_at = self.clock.now();
        Ok(entry.workflow.clone())
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), AdapterError> {
        self.disarm(&id);
        self.state.lock().entries.remove(&id);
        info!(workflow_id = %id, "workflow deleted");
        Ok(())
    }

    async fn start_workflow(&self, id: WorkflowId) -> Result<(), AdapterError> {
        self.arm(&id)
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn pause_workflow(&self, id: WorkflowId) -> Result<(), AdapterError> {
        self.disarm(&id);
        let mut state = self.state.lock();
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(WorkflowError::NotFound { id })?;
        entry.workflow.status = WorkflowStatus::Paused;
        Ok(())
    }

    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn resume_workflow(&self, id: WorkflowId) -> Result<(), AdapterError> {
        {
            let state = self.state.lock();
            let entry = state
                .entries
                .get(&id)
                .ok_or_else(|| WorkflowError::NotFound { id: id.clone() })?;
            if entry.workflow.status != WorkflowStatus::Paused {
                return Err(WorkflowError::InvalidTransition {
                    reason: format!("workflow {id} is not paused"),
                }
                .into());
            }
        }
        self.arm(&id)
    }

    #[instrument(skip(self, params), fields(workflow_id = %id))]
    async fn trigger_workflow(
        &self,
        id: WorkflowId,
        params: Map<String, Value>,
    ) -> Result<ExecutionId, AdapterError> {
        if !self.state.lock().entries.contains_key(&id) {
            return Err(WorkflowError::NotFound { id }.into());
        }
        Ok(self.fire(id, params).await)
    }

    #[instrument(skip(self))]
    async fn stop_execution(&self, execution_id: ExecutionId) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        let workflow_id = {
            let exec = state.executions.get(&execution_id).ok_or_else(|| {
                WorkflowError::ExecutionNotFound {
                    id: execution_id.to_string(),
                }
            })?;
            if exec.status.is_terminal() {
                return Err(WorkflowError::InvalidTransition {
                    reason: format!("execution {execution_id} is already terminal"),
                }
                .into());
            }
            exec.workflow_id.clone()
        };
        let now = self.clock.now();
        if let Some(exec) = state.executions.get_mut(&execution_id) {
            exec.cancel(now, "stopped by caller");
        }
        if let Some(entry) = state.entries.get_mut(&workflow_id) {
            entry.is_running = false;
        }
        Ok(())
    }

    async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, AdapterError> {
        self.state
            .lock()
            .entries
            .get(&id)
            .map(|e| e.workflow.clone())
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
            .entries
            .get(&id)
            .map(|e| e.workflow.status)
            .unwrap_or(WorkflowStatus::Inactive))
    }

    async fn get_workflow_next_run_time(
        &self,
        id: WorkflowId,
    ) -> Result<Option<DateTime<Utc>>, AdapterError> {
        Ok(self.state.lock().entries.get(&id).and_then(|e| e.next_run))
    }

    async fn get_running_workflows(&self) -> Result<Vec<WorkflowId>, AdapterError> {
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .filter(|(_, e)| e.is_running)
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
        let mut logs = vec![
            format!("start: {}", exec.start_time),
            format!("state: {:?}", exec.status),
        ];
        if let Some(msg) = &exec.error_message {
            logs.push(format!("error: {msg}"));
        }
        if let Some(end) = exec.end_time {
            logs.push(format!("end: {end}"));
        }
        Ok(logs)
    }
}

impl BuiltinScheduler {
    fn disarm(&self, id: &WorkflowId) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(id) {
            if let Some(token) = entry.cancellation.take() {
                token.cancel();
            }
            if entry.workflow.status == WorkflowStatus::Active {
                entry.workflow.status = WorkflowStatus::Inactive;
            }
            entry.next_run = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{ExecutionStatus, Schedule};
    use jobgrid_collector::executor::testing::EchoExecutor;
    use jobgrid_collector::{CollectionTask, ExecutionResult};

    fn create_req(id: &str, schedule: Schedule) -> CreateWorkflowRequest {
        CreateWorkflowRequest {
            id: WorkflowId::new(id),
            name: id.to_string(),
            description: String::new(),
            schedule,
            config: Map::new(),
            data_source_id: None,
            properties: Map::new(),
        }
    }

    #[tokio::test]
    async fn create_workflow_is_inactive_until_started() {
        let scheduler = BuiltinScheduler::new(Arc::new(DependencyManager::default()));
        let workflow = scheduler
            .create_workflow(create_req("w1", Schedule::immediate()))
            .await
            .expect("create");
        assert_eq!(workflow.status, WorkflowStatus::Inactive);
    }

    #[tokio::test]
    async fn duplicate_create_is_conflict() {
        let scheduler = BuiltinScheduler::new(Arc::new(DependencyManager::default()));
        scheduler
            .create_workflow(create_req("w1", Schedule::immediate()))
            .await
            .unwrap();
        let err = scheduler
            .create_workflow(create_req("w1", Schedule::immediate()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Workflow(WorkflowError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn delete_workflow_is_idempotent() {
        let scheduler = BuiltinScheduler::new(Arc::new(DependencyManager::default()));
        scheduler
            .create_workflow(create_req("w1", Schedule::immediate()))
            .await
            .unwrap();
        scheduler.delete_workflow(WorkflowId::new("w1")).await.unwrap();
        scheduler.delete_workflow(WorkflowId::new("w1")).await.unwrap();
    }

    #[tokio::test]
    async fn immediate_workflow_fires_and_completes() {
        let concrete_repo = jobgrid_collector::repo::testing::InMemoryTaskRepo::new();
        concrete_repo.insert(CollectionTask::new(WorkflowId::new("w1"), "ds1"));
        let repo: Arc<dyn TaskRepo> = Arc::new(concrete_repo);
        let executor: Arc<dyn TaskExecutor> = Arc::new(EchoExecutor::new(ExecutionResult::new(10, 1000)));

        let scheduler = BuiltinScheduler::new(Arc::new(DependencyManager::default()))
            .with_executor(executor, repo);
        scheduler
            .create_workflow(create_req("w1", Schedule::immediate()))
            .await
            .unwrap();
        scheduler.start_workflow(WorkflowId::new("w1")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let executions = scheduler
            .list_executions(WorkflowId::new("w1"), 10)
            .await
            .unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Completed);
        assert_eq!(
            executions[0].result.get("tables_processed"),
            Some(&Value::from(10))
        );
    }

    #[tokio::test]
    async fn unknown_workflow_status_is_inactive_not_error() {
        let scheduler = BuiltinScheduler::new(Arc::new(DependencyManager::default()));
        let status = scheduler
            .get_workflow_status(WorkflowId::new("ghost"))
            .await
            .unwrap();
        assert_eq!(status, WorkflowStatus::Inactive);
    }

    #[tokio::test]
    async fn manual_trigger_bypasses_is_running() {
        let scheduler = BuiltinScheduler::new(Arc::new(DependencyManager::default()));
        scheduler
            .create_workflow(create_req("w1", Schedule::immediate()))
            .await
            .unwrap();
        let mut params = Map::new();
        params.insert("source".to_string(), Value::from("manual"));
        let exec_id = scheduler
            .trigger_workflow(WorkflowId::new("w1"), params)
            .await
            .unwrap();
        let exec = scheduler.get_execution(exec_id).await.unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
    }
}
