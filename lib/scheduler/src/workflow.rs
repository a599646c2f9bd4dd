//! Workflow data model (§3): `Workflow`, `Schedule`, `WorkflowExecution`.

use crate::error::ScheduleError;
use chrono::{DateTime, Utc};
use jobgrid_core::{ExecutionId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The discriminated schedule kind (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Fire once as soon as scheduled.
    Immediate,
    /// Fire once at an absolute time (past ⇒ fire immediately).
    Once { start_time: DateTime<Utc> },
    /// Fire every `interval_seconds`.
    Interval { interval_seconds: u64 },
    /// Fire on cron ticks (6-field, seconds precision).
    Cron { cron_expr: String },
}

/// A workflow's schedule: a kind plus the window common to all kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub kind: ScheduleKind,
    /// Firings before this time (if set) do not occur.
    pub start_time: Option<DateTime<Utc>>,
    /// Firings after this time (if set) do not occur.
    pub end_time: Option<DateTime<Utc>>,
    /// IANA timezone name; defaults to the operator's local zone (here:
    /// the dependency manager's configured `chrono_tz::Tz`, §9 Q3).
    pub timezone: Option<String>,
}

impl Schedule {
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            kind: ScheduleKind::Immediate,
            start_time: None,
            end_time: None,
            timezone: None,
        }
    }

    #[must_use]
    pub fn once(start_time: DateTime<Utc>) -> Self {
        Self {
            kind: ScheduleKind::Once { start_time },
            start_time: None,
            end_time: None,
            timezone: None,
        }
    }

    #[must_use]
    pub fn interval(interval_seconds: u64) -> Self {
        Self {
            kind: ScheduleKind::Interval { interval_seconds },
            start_time: None,
            end_time: None,
            timezone: None,
        }
    }

    #[must_use]
    pub fn cron(cron_expr: impl Into<String>) -> Self {
        Self {
            kind: ScheduleKind::Cron {
                cron_expr: cron_expr.into(),
            },
            start_time: None,
            end_time: None,
            timezone: None,
        }
    }

    #[must_use]
    pub fn with_window(
        mut self,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    /// Validates shape: `interval_seconds > 0`, cron expression parses.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError` per the invalid kind.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        match &self.kind {
            ScheduleKind::Immediate | ScheduleKind::Once { .. } => Ok(()),
            ScheduleKind::Interval { interval_seconds } => {
                if *interval_seconds == 0 {
                    return Err(ScheduleError::InvalidSchedule {
                        reason: "interval_seconds must be > 0".to_string(),
                    });
                }
                Ok(())
            }
            ScheduleKind::Cron { cron_expr } => {
                crate::clock::CronSchedule::parse(cron_expr.clone()).map(|_| ())
            }
        }
    }
}

/// Lifecycle status of a `Workflow` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    Inactive,
    Paused,
    Error,
}

/// A scheduled unit (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub description: String,
    pub status: WorkflowStatus,
    pub schedule: Schedule,
    pub config: Map<String, Value>,
    pub data_source_id: Option<String>,
    /// Set when an external adapter owns the remote definition (§3).
    pub external_id: Option<String>,
    pub properties: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    #[must_use]
    pub fn new(id: WorkflowId, name: impl Into<String>, schedule: Schedule) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: String::new(),
            status: WorkflowStatus::Inactive,
            schedule,
            config: Map::new(),
            data_source_id: None,
            external_id: None,
            properties: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of one firing (§3). Monotonic: `pending → running → {completed,
/// failed, cancelled}`; no transition ever leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One firing of a workflow (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub result: Map<String, Value>,
    pub error_message: Option<String>,
    pub external_id: Option<String>,
}

impl WorkflowExecution {
    #[must_use]
    pub fn new(workflow_id: WorkflowId, start_time: DateTime<Utc>) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            status: ExecutionStatus::Pending,
            start_time,
            end_time: None,
            duration_ms: None,
            result: Map::new(),
            error_message: None,
            external_id: None,
        }
    }

    /// `pending → running`. No-op guard: panics in debug builds are not
    /// used here; callers are expected to check `status` themselves before
    /// calling, as C6's firing sequence does.
    pub fn start_running(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    pub fn complete(&mut self, now: DateTime<Utc>, result: Map<String, Value>) {
        self.finish(now, ExecutionStatus::Completed);
        self.result = result;
    }

    pub fn fail(&mut self, now: DateTime<Utc>, error_message: impl Into<String>) {
        self.finish(now, ExecutionStatus::Failed);
        self.error_message = Some(error_message.into());
    }

    pub fn cancel(&mut self, now: DateTime<Utc>, reason: impl Into<String>) {
        self.finish(now, ExecutionStatus::Cancelled);
        self.error_message = Some(reason.into());
    }

    fn finish(&mut self, now: DateTime<Utc>, status: ExecutionStatus) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.end_time = Some(now);
        self.duration_ms = Some((now - self.start_time).num_milliseconds());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_schedule_requires_positive_seconds() {
        assert!(Schedule::interval(0).validate().is_err());
        assert!(Schedule::interval(60).validate().is_ok());
    }

    #[test]
    fn cron_schedule_validates_expression() {
        assert!(Schedule::cron("*/1 * * * * *").validate().is_ok());
        assert!(Schedule::cron("garbage").validate().is_err());
    }

    #[test]
    fn execution_lifecycle_is_monotonic_and_terminal() {
        let start = Utc::now();
        let mut exec = WorkflowExecution::new(WorkflowId::new("w1"), start);
        assert_eq!(exec.status, ExecutionStatus::Pending);

        exec.start_running();
        assert_eq!(exec.status, ExecutionStatus::Running);

        let mut result = Map::new();
        result.insert("tables_processed".to_string(), Value::from(10));
        exec.complete(start + chrono::Duration::milliseconds(50), result);
        assert_eq!(exec.status, ExecutionStatus::Completed);
        assert_eq!(exec.duration_ms, Some(50));

        // Terminal state never changes, even via a later call.
        exec.fail(start + chrono::Duration::seconds(5), "too late");
        assert_eq!(exec.status, ExecutionStatus::Completed);
    }

    #[test]
    fn cancel_records_reason_in_error_message() {
        let start = Utc::now();
        let mut exec = WorkflowExecution::new(WorkflowId::new("w1"), start);
        exec.cancel(start, "dependency not satisfied: w1 has no completed run today");
        assert_eq!(exec.status, ExecutionStatus::Cancelled);
        assert!(exec.error_message.unwrap().contains("dependency"));
    }
}
