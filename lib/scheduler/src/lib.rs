//! Pluggable workflow scheduler (§4 of the architecture: C1, C6–C9).
//!
//! This crate provides:
//!
//! - **Clock & cron** (`clock`): the `Clock` abstraction used for
//!   deterministic tests, and `CronSchedule`, a thin wrapper over the `cron`
//!   crate.
//! - **Workflow data model** (`workflow`): `Schedule`, `Workflow`,
//!   `WorkflowExecution` and their lifecycle.
//! - **Dependency manager** (`dependency`): upstream-workflow and
//!   time-window dependency checks, with cycle detection.
//! - **Adapter contract** (`adapter`): the `SchedulerAdapter` trait shared
//!   by the built-in and external implementations.
//! - **Built-in scheduler** (`builtin`): the in-process adapter with its own
//!   cron/interval/once/immediate firing engine.
//! - **External adapter** (`external`): a reference HTTP-backed adapter for
//!   a remote orchestrator.
//! - **Scheduler manager** (`manager`): multiplexes one current adapter and
//!   migrates workflows across adapters on switch.

pub mod adapter;
pub mod builtin;
pub mod clock;
pub mod dependency;
pub mod error;
pub mod external;
pub mod manager;
pub mod workflow;

pub use adapter::{CreateWorkflowRequest, SchedulerAdapter, UpdateWorkflowRequest};
pub use builtin::BuiltinScheduler;
pub use clock::{Clock, CronSchedule, SystemClock, TestClock};
pub use dependency::{
    Dependency, DependencyExpectedStatus, DependencyManager, LatestExecution, LatestExecutionLookup,
};
pub use error::{AdapterError, DependencyError, ManagerError, ScheduleError, WorkflowError};
pub use external::{ExternalAdapter, ExternalAdapterConfig};
pub use manager::{SchedulerManager, TaskStatus};
pub use workflow::{Schedule, ScheduleKind, Workflow, WorkflowExecution, WorkflowStatus, ExecutionStatus};
