//! Error types for the collector crate.

use jobgrid_core::WorkflowId;
use std::fmt;

/// Errors raised while executing or looking up a collection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    /// No task is registered for the given workflow id.
    TaskNotFound { workflow_id: WorkflowId },
    /// The task executor itself failed.
    ExecutionFailed { reason: String },
    /// The repo backing store failed.
    StorageFailed { reason: String },
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskNotFound { workflow_id } => {
                write!(f, "no collection task registered for workflow {workflow_id}")
            }
            Self::ExecutionFailed { reason } => write!(f, "task execution failed: {reason}"),
            Self::StorageFailed { reason } => write!(f, "task repo storage failed: {reason}"),
        }
    }
}

impl std::error::Error for CollectorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_not_found_display_includes_id() {
        let id = WorkflowId::new("w1");
        let err = CollectorError::TaskNotFound { workflow_id: id };
        assert!(err.to_string().contains("w1"));
    }
}
