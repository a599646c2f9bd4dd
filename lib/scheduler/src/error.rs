//! Error types for the scheduler crate.
//!
//! One plain enum per concern (`ScheduleError`, `WorkflowError`,
//! `DependencyError`, `AdapterError`, `ManagerError`), hand-written
//! `Display`/`Error`, composed via `From` at the boundary that needs the
//! broader type — never `thiserror`, matching the rest of the workspace.

use jobgrid_core::WorkflowId;
use std::fmt;

/// Errors from parsing or validating a `Schedule` (C1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    InvalidCron { expression: String, reason: String },
    InvalidSchedule { reason: String },
    InvalidTimezone { timezone: String },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCron { expression, reason } => {
                write!(f, "invalid cron expression '{expression}': {reason}")
            }
            Self::InvalidSchedule { reason } => write!(f, "invalid schedule: {reason}"),
            Self::InvalidTimezone { timezone } => write!(f, "invalid timezone: {timezone}"),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Errors from workflow CRUD/lifecycle operations (C6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    NotFound { id: WorkflowId },
    Conflict { id: WorkflowId },
    ExecutionNotFound { id: String },
    InvalidTransition { reason: String },
    Schedule(ScheduleError),
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "workflow not found: {id}"),
            Self::Conflict { id } => write!(f, "workflow already exists: {id}"),
            Self::ExecutionNotFound { id } => write!(f, "execution not found: {id}"),
            Self::InvalidTransition { reason } => write!(f, "invalid transition: {reason}"),
            Self::Schedule(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WorkflowError {}

impl From<ScheduleError> for WorkflowError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}

/// Errors from the dependency manager (C7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    CircularDependency {
        workflow_id: WorkflowId,
        upstream: WorkflowId,
    },
    InvalidDependency {
        reason: String,
    },
    /// `CheckDependencies` found an unmet dependency; `reason` is the
    /// human-readable explanation surfaced to the caller (§4.6).
    NotSatisfied {
        reason: String,
    },
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircularDependency {
                workflow_id,
                upstream,
            } => write!(
                f,
                "adding dependency on {upstream} from {workflow_id} would create a cycle"
            ),
            Self::InvalidDependency { reason } => write!(f, "invalid dependency: {reason}"),
            Self::NotSatisfied { reason } => write!(f, "dependency not satisfied: {reason}"),
        }
    }
}

impl std::error::Error for DependencyError {}

/// Errors from a scheduler adapter (built-in or external, C6/C8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    Workflow(WorkflowError),
    Dependency(DependencyError),
    /// The external adapter's remote call failed. Per §7, this is logged
    /// and swallowed on delete/offline paths, but surfaced elsewhere.
    RemoteError { reason: String },
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workflow(e) => write!(f, "{e}"),
            Self::Dependency(e) => write!(f, "{e}"),
            Self::RemoteError { reason } => write!(f, "remote adapter call failed: {reason}"),
        }
    }
}

impl std::error::Error for AdapterError {}

impl From<WorkflowError> for AdapterError {
    fn from(e: WorkflowError) -> Self {
        Self::Workflow(e)
    }
}

impl From<DependencyError> for AdapterError {
    fn from(e: DependencyError) -> Self {
        Self::Dependency(e)
    }
}

impl From<ScheduleError> for AdapterError {
    fn from(e: ScheduleError) -> Self {
        Self::Workflow(WorkflowError::Schedule(e))
    }
}

/// Errors from the scheduler manager (C9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    /// No current adapter is registered/initialized.
    AdapterUnavailable,
    UnknownAdapterType { type_name: String },
    Adapter(AdapterError),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterUnavailable => write!(f, "no scheduler adapter is available"),
            Self::UnknownAdapterType { type_name } => {
                write!(f, "unknown scheduler adapter type: {type_name}")
            }
            Self::Adapter(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ManagerError {}

impl From<AdapterError> for ManagerError {
    fn from(e: AdapterError) -> Self {
        Self::Adapter(e)
    }
}

impl From<WorkflowError> for ManagerError {
    fn from(e: WorkflowError) -> Self {
        Self::Adapter(AdapterError::Workflow(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_not_found_display() {
        let id = WorkflowId::new("w1");
        let err = WorkflowError::NotFound { id };
        assert!(err.to_string().contains("w1"));
    }

    #[test]
    fn adapter_error_from_workflow_error() {
        let err: AdapterError = WorkflowError::NotFound {
            id: WorkflowId::new("w1"),
        }
        .into();
        assert!(matches!(err, AdapterError::Workflow(_)));
    }

    #[test]
    fn manager_error_from_adapter_error() {
        let err: ManagerError = AdapterError::RemoteError {
            reason: "timeout".to_string(),
        }
        .into();
        assert!(matches!(err, ManagerError::Adapter(_)));
    }

    #[test]
    fn circular_dependency_display_names_both_ids() {
        let err = DependencyError::CircularDependency {
            workflow_id: WorkflowId::new("a"),
            upstream: WorkflowId::new("b"),
        };
        let msg = err.to_string();
        assert!(msg.contains('a'));
        assert!(msg.contains('b'));
    }
}
