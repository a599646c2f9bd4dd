//! `TaskExecutor` contract (the collector side of C6's firing step) and the
//! `CollectionTask`/`ExecutionResult` DTOs that cross the scheduler/collector
//! boundary.

use crate::error::CollectorError;
use async_trait::async_trait;
use jobgrid_core::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The external-facing task configuration a `TaskExecutor` runs against.
///
/// This is distinct from the scheduler's internal `Workflow` record: the
/// scheduler manager translates `CollectionTask ⇄ Workflow` at its public
/// API boundary (§4.8), while this crate only needs enough of the shape to
/// hand an executor something to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionTask {
    pub workflow_id: WorkflowId,
    pub data_source_id: String,
    /// Opaque, executor-specific configuration (query, endpoint, credentials
    /// reference, ...).
    pub config: Map<String, Value>,
}

impl CollectionTask {
    #[must_use]
    pub fn new(workflow_id: WorkflowId, data_source_id: impl Into<String>) -> Self {
        Self {
            workflow_id,
            data_source_id: data_source_id.into(),
            config: Map::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }
}

/// The outcome of one collection run, as reported by a `TaskExecutor`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub tables: u64,
    pub records: u64,
    pub details: Map<String, Value>,
}

impl ExecutionResult {
    #[must_use]
    pub fn new(tables: u64, records: u64) -> Self {
        Self {
            tables,
            records,
            details: Map::new(),
        }
    }

    /// Summarizes this result into the `result` map stored on a
    /// `WorkflowExecution` (§4.5 step 5).
    #[must_use]
    pub fn summarize(&self) -> Map<String, Value> {
        let mut map = self.details.clone();
        map.insert("tables_processed".to_string(), Value::from(self.tables));
        map.insert("records_processed".to_string(), Value::from(self.records));
        map
    }
}

/// Runs a `CollectionTask` and reports what happened.
///
/// Per the cooperative-cancellation decision (§9 Q1), `execute` is a plain
/// `async fn` returning a value rather than threading a cancellation token
/// through — an in-flight call is allowed to run to completion even if the
/// owning execution has already been marked `cancelled`.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &CollectionTask) -> Result<ExecutionResult, CollectorError>;
}

/// Test fakes for `TaskExecutor`, grounded on the teacher's
/// `EchoExecutor`/`MockExecutor` pair (`lib/workflow/src/worker.rs`).
pub mod testing {
    use super::{CollectionTask, CollectorError, ExecutionResult, TaskExecutor};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Always succeeds with a fixed result, optionally after a delay.
    pub struct EchoExecutor {
        result: ExecutionResult,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl EchoExecutor {
        #[must_use]
        pub fn new(result: ExecutionResult) -> Self {
            Self {
                result,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskExecutor for EchoExecutor {
        async fn execute(&self, _task: &CollectionTask) -> Result<ExecutionResult, CollectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.result.clone())
        }
    }

    /// Always fails with a fixed reason.
    pub struct FailingExecutor {
        reason: String,
    }

    impl FailingExecutor {
        #[must_use]
        pub fn new(reason: impl Into<String>) -> Self {
            Self {
                reason: reason.into(),
            }
        }
    }

    #[async_trait]
    impl TaskExecutor for FailingExecutor {
        async fn execute(&self, _task: &CollectionTask) -> Result<ExecutionResult, CollectorError> {
            Err(CollectorError::ExecutionFailed {
                reason: self.reason.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{EchoExecutor, FailingExecutor};
    use super::*;
    use jobgrid_core::WorkflowId;

    fn task() -> CollectionTask {
        CollectionTask::new(WorkflowId::new("w1"), "ds1")
    }

    #[test]
    fn summarize_includes_counts_and_details() {
        let mut details = Map::new();
        details.insert("source".to_string(), Value::from("imap"));
        let result = ExecutionResult {
            tables: 10,
            records: 1000,
            details,
        };
        let summary = result.summarize();
        assert_eq!(summary.get("tables_processed"), Some(&Value::from(10)));
        assert_eq!(summary.get("records_processed"), Some(&Value::from(1000)));
        assert_eq!(summary.get("source"), Some(&Value::from("imap")));
    }

    #[tokio::test]
    async fn echo_executor_returns_fixed_result() {
        let exec = EchoExecutor::new(ExecutionResult::new(10, 1000));
        let result = exec.execute(&task()).await.expect("execute");
        assert_eq!(result.tables, 10);
        assert_eq!(exec.call_count(), 1);
    }

    #[tokio::test]
    async fn failing_executor_returns_execution_failed() {
        let exec = FailingExecutor::new("connection refused");
        let err = exec.execute(&task()).await.unwrap_err();
        assert!(matches!(err, CollectorError::ExecutionFailed { .. }));
    }
}
