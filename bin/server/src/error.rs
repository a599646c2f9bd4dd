//! Maps every domain error this binary can surface onto the JSON error
//! body and status code table (§6, §7): `{code: STRING_ENUM, message:
//! STRING}`. This is the single place that conversion happens, mirroring
//! the teacher's per-domain `into_server_error()` convention in
//! `bin/server/src/error.rs` — generalized from `ServerFnError` to an
//! axum `IntoResponse`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobgrid_scheduler::{AdapterError, DependencyError, ManagerError, ScheduleError, WorkflowError};
use serde_json::json;

use crate::datasource_repo::DatasourceRepoError;

/// Every error an HTTP handler in this binary can return.
#[derive(Debug)]
pub enum ApiError {
    Manager(ManagerError),
    Collector(jobgrid_collector::CollectorError),
    Datasource(DatasourceRepoError),
    NotFound { message: String },
    InvalidRequest { message: String },
    Unauthorized { message: String },
}

impl From<ManagerError> for ApiError {
    fn from(e: ManagerError) -> Self {
        Self::Manager(e)
    }
}

impl From<AdapterError> for ApiError {
    fn from(e: AdapterError) -> Self {
        Self::Manager(ManagerError::Adapter(e))
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        Self::Manager(ManagerError::Adapter(AdapterError::Workflow(e)))
    }
}

impl From<DependencyError> for ApiError {
    fn from(e: DependencyError) -> Self {
        Self::Manager(ManagerError::Adapter(AdapterError::Dependency(e)))
    }
}

impl From<ScheduleError> for ApiError {
    fn from(e: ScheduleError) -> Self {
        Self::Manager(ManagerError::Adapter(AdapterError::Workflow(e.into())))
    }
}

impl From<jobgrid_collector::CollectorError> for ApiError {
    fn from(e: jobgrid_collector::CollectorError) -> Self {
        Self::Collector(e)
    }
}

impl From<DatasourceRepoError> for ApiError {
    fn from(e: DatasourceRepoError) -> Self {
        Self::Datasource(e)
    }
}

impl ApiError {
    /// The enumerated error code this maps to on the wire (§6, §7).
    fn code_and_status(&self) -> (&'static str, StatusCode) {
        match self {
            Self::Manager(ManagerError::AdapterUnavailable) => {
                ("ADAPTER_UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE)
            }
            Self::Manager(ManagerError::UnknownAdapterType { .. }) => {
                ("NOT_FOUND", StatusCode::NOT_FOUND)
            }
            Self::Manager(ManagerError::Adapter(AdapterError::Workflow(WorkflowError::NotFound {
                ..
            })))
            | Self::Manager(ManagerError::Adapter(AdapterError::Workflow(
                WorkflowError::ExecutionNotFound { .. },
            ))) => ("NOT_FOUND", StatusCode::NOT_FOUND),
            Self::Manager(ManagerError::Adapter(AdapterError::Workflow(WorkflowError::Conflict {
                ..
            }))) => ("CONFLICT", StatusCode::CONFLICT),
            Self::Manager(ManagerError::Adapter(AdapterError::Workflow(
                WorkflowError::InvalidTransition { .. },
            )))
            | Self::Manager(ManagerError::Adapter(AdapterError::Workflow(WorkflowError::Schedule(
                _,
            )))) => ("INVALID_REQUEST", StatusCode::BAD_REQUEST),
            Self::Manager(ManagerError::Adapter(AdapterError::Dependency(
                DependencyError::CircularDependency { .. },
            ))) => ("CIRCULAR_DEPENDENCY", StatusCode::BAD_REQUEST),
            Self::Manager(ManagerError::Adapter(AdapterError::Dependency(_))) => {
                ("INVALID_REQUEST", StatusCode::BAD_REQUEST)
            }
            Self::Manager(ManagerError::Adapter(AdapterError::RemoteError { .. })) => {
                ("REMOTE_ERROR", StatusCode::BAD_GATEWAY)
            }
            Self::Collector(jobgrid_collector::CollectorError::TaskNotFound { .. }) => {
                ("NOT_FOUND", StatusCode::NOT_FOUND)
            }
            Self::Collector(_) => ("INTERNAL", StatusCode::INTERNAL_SERVER_ERROR),
            Self::Datasource(DatasourceRepoError::NotFound { .. }) => ("NOT_FOUND", StatusCode::NOT_FOUND),
            Self::NotFound { .. } => ("NOT_FOUND", StatusCode::NOT_FOUND),
            Self::InvalidRequest { .. } => ("INVALID_REQUEST", StatusCode::BAD_REQUEST),
            Self::Unauthorized { .. } => ("AUTH_ERROR", StatusCode::UNAUTHORIZED),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manager(e) => write!(f, "{e}"),
            Self::Collector(e) => write!(f, "{e}"),
            Self::Datasource(e) => write!(f, "{e}"),
            Self::NotFound { message } | Self::InvalidRequest { message } | Self::Unauthorized { message } => {
                write!(f, "{message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status) = self.code_and_status();
        let message = self.to_string();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %message, code, "request failed");
        }
        (status, Json(json!({ "code": code, "message": message }))).into_response()
    }
}
