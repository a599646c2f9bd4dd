//! Dependency Manager (C7, §4.6).

use crate::error::DependencyError;
use crate::workflow::ExecutionStatus;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use jobgrid_core::WorkflowId;
use parking_lot::Mutex;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A dependency entry (§3). `Workflow` deps require an upstream workflow's
/// latest execution to be in the expected state; `Time` deps gate on a
/// local-time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dependency {
    Workflow {
        workflow_id: WorkflowId,
        #[serde(default = "default_expected_status")]
        expected_status: DependencyExpectedStatus,
    },
    Time {
        start_hour: u32,
        end_hour: u32,
        #[serde(default)]
        days_of_week: Vec<u32>,
    },
}

/// Mirrors `ExecutionStatus` but only the completed/failed/cancelled
/// terminal states a dependency can reasonably require, kept as its own
/// type so the public dependency API does not leak `pending`/`running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyExpectedStatus {
    Completed,
    Failed,
    Cancelled,
}

fn default_expected_status() -> DependencyExpectedStatus {
    DependencyExpectedStatus::Completed
}

impl DependencyExpectedStatus {
    fn matches(self, status: ExecutionStatus) -> bool {
        matches!(
            (self, status),
            (Self::Completed, ExecutionStatus::Completed)
                | (Self::Failed, ExecutionStatus::Failed)
                | (Self::Cancelled, ExecutionStatus::Cancelled)
        )
    }
}

impl Dependency {
    /// Validates field ranges (§4.6's "validate shape").
    ///
    /// # Errors
    ///
    /// Returns `DependencyError::InvalidDependency` on an out-of-range
    /// `Time` window.
    pub fn validate(&self) -> Result<(), DependencyError> {
        if let Self::Time {
            start_hour,
            end_hour,
            days_of_week,
        } = self
        {
            if *start_hour > 23 {
                return Err(DependencyError::InvalidDependency {
                    reason: format!("start_hour {start_hour} out of range [0,23]"),
                });
            }
            if *end_hour == 0 || *end_hour > 24 || *end_hour <= *start_hour {
                return Err(DependencyError::InvalidDependency {
                    reason: format!(
                        "end_hour {end_hour} must be in ({start_hour},24]"
                    ),
                });
            }
            if days_of_week.iter().any(|d| *d > 6) {
                return Err(DependencyError::InvalidDependency {
                    reason: "days_of_week entries must be in [0,6]".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A snapshot of a workflow's latest execution, as needed by
/// `CheckDependencies` — intentionally decoupled from the full
/// `WorkflowExecution` record so this crate's data model doesn't bleed
/// into the dependency manager's contract.
#[derive(Debug, Clone, Copy)]
pub struct LatestExecution {
    pub status: ExecutionStatus,
    pub end_time: Option<DateTime<Utc>>,
}

/// Supplies the dependency manager with the one piece of scheduler state it
/// needs but does not own: each workflow's most recent execution.
pub trait LatestExecutionLookup: Send + Sync {
    fn latest_execution(&self, workflow_id: &WorkflowId) -> Option<LatestExecution>;
}

/// Tracks per-workflow dependency lists and the `workflow`-kind dependency
/// graph used for cycle detection (§4.6).
pub struct DependencyManager {
    timezone: Tz,
    inner: Mutex<Inner>,
}

struct Inner {
    deps: HashMap<WorkflowId, Vec<Dependency>>,
    graph: DiGraph<WorkflowId, ()>,
    nodes: HashMap<WorkflowId, NodeIndex>,
}

impl DependencyManager {
    /// Creates a manager evaluating `time` dependencies and "today" against
    /// `timezone` (§9 Q3; default `UTC` via `Self::default()`).
    #[must_use]
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            inner: Mutex::new(Inner {
                deps: HashMap::new(),
                graph: DiGraph::new(),
                nodes: HashMap::new(),
            }),
        }
    }

    fn node(inner: &mut Inner, workflow_id: &WorkflowId) -> NodeIndex {
        if let Some(idx) = inner.nodes.get(workflow_id) {
            return *idx;
        }
        let idx = inner.graph.add_node(workflow_id.clone());
        inner.nodes.insert(workflow_id.clone(), idx);
        idx
    }

    /// Adds a dependency for `workflow_id`. For `Dependency::Workflow`,
    /// rejects if the new edge would close a cycle in the `workflow`-kind
    /// subgraph (DFS via `petgraph::algo::has_path_connecting`, §4.6).
    ///
    /// # Errors
    ///
    /// Returns `DependencyError::InvalidDependency` on a malformed `Time`
    /// window, or `DependencyError::CircularDependency` on a cycle.
    pub fn add_dependency(
        &self,
        workflow_id: WorkflowId,
        dependency: Dependency,
    ) -> Result<(), DependencyError> {
        dependency.validate()?;

        let mut inner = self.inner.lock();
        if let Dependency::Workflow {
            workflow_id: upstream,
            ..
        } = &dependency
        {
            let from = Self::node(&mut inner, &workflow_id);
            let to = Self::node(&mut inner, upstream);
            // Adding `from -> to` (workflow_id depends on upstream) would
            // close a cycle iff `to` can already reach `from`.
            if has_path_connecting(&inner.graph, to, from, None) {
                return Err(DependencyError::CircularDependency {
                    workflow_id,
                    upstream: upstream.clone(),
                });
            }
            inner.graph.add_edge(from, to, ());
        }
        inner.deps.entry(workflow_id).or_default().push(dependency);
        Ok(())
    }

    /// Checks every dependency for `workflow_id` in order, short-circuiting
    /// on the first failure (§4.6).
    ///
    /// # Errors
    ///
    /// Returns `DependencyError::NotSatisfied` with a human-readable reason
    /// naming the failing dependency.
    pub fn check_dependencies(
        &self,
        workflow_id: &WorkflowId,
        now: DateTime<Utc>,
        executions: &dyn LatestExecutionLookup,
    ) -> Result<(), DependencyError> {
        let deps = {
            let inner = self.inner.lock();
            inner.deps.get(workflow_id).cloned().unwrap_or_default()
        };

        let local_now = now.with_timezone(&self.timezone);
        let start_of_day = local_now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_local_timezone(self.timezone)
            .single()
            .unwrap_or(local_now);

        for dep in &deps {
            match dep {
                Dependency::Workflow {
                    workflow_id: upstream,
                    expected_status,
                } => {
                    let latest = executions.latest_execution(upstream).ok_or_else(|| {
                        DependencyError::NotSatisfied {
                            reason: format!("{upstream} has no execution yet"),
                        }
                    })?;
                    if !expected_status.matches(latest.status) {
                        return Err(DependencyError::NotSatisfied {
                            reason: format!(
                                "{upstream}'s latest execution is {:?}, expected {:?}",
                                latest.status, expected_status
                            ),
                        });
                    }
                    let ended_today = latest
                        .end_time
                        .map(|t| t.with_timezone(&self.timezone) >= start_of_day)
                        .unwrap_or(false);
                    if !ended_today {
                        return Err(DependencyError::NotSatisfied {
                            reason: format!(
                                "{upstream} has no execution that ended today (local day)"
                            ),
                        });
                    }
                }
                Dependency::Time {
                    start_hour,
                    end_hour,
                    days_of_week,
                } => {
                    let hour = local_now.hour();
                    if hour < *start_hour || hour >= *end_hour {
                        return Err(DependencyError::NotSatisfied {
                            reason: format!(
                                "current hour {hour} is outside window [{start_hour},{end_hour})"
                            ),
                        });
                    }
                    if !days_of_week.is_empty() {
                        let weekday = local_now.weekday().num_days_from_sunday();
                        if !days_of_week.contains(&weekday) {
                            return Err(DependencyError::NotSatisfied {
                                reason: format!(
                                    "current day {weekday} is not in allowed days {days_of_week:?}"
                                ),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the `workflow`-kind dependency graph as an adjacency map
    /// (workflow → the upstreams it depends on), for visualization.
    #[must_use]
    pub fn dependency_graph(&self) -> HashMap<WorkflowId, Vec<WorkflowId>> {
        let inner = self.inner.lock();
        let mut out: HashMap<WorkflowId, Vec<WorkflowId>> = HashMap::new();
        for edge in inner.graph.edge_indices() {
            if let Some((from, to)) = inner.graph.edge_endpoints(edge) {
                out.entry(inner.graph[from].clone())
                    .or_default()
                    .push(inner.graph[to].clone());
            }
        }
        out
    }
}

impl Default for DependencyManager {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(HashMap<WorkflowId, LatestExecution>);

    impl LatestExecutionLookup for FixedLookup {
        fn latest_execution(&self, workflow_id: &WorkflowId) -> Option<LatestExecution> {
            self.0.get(workflow_id).copied()
        }
    }

    #[test]
    fn direct_cycle_is_rejected() {
        let mgr = DependencyManager::default();
        mgr.add_dependency(
            WorkflowId::new("a"),
            Dependency::Workflow {
                workflow_id: WorkflowId::new("b"),
                expected_status: DependencyExpectedStatus::Completed,
            },
        )
        .expect("a depends on b");

        let err = mgr
            .add_dependency(
                WorkflowId::new("b"),
                Dependency::Workflow {
                    workflow_id: WorkflowId::new("a"),
                    expected_status: DependencyExpectedStatus::Completed,
                },
            )
            .unwrap_err();
        assert!(matches!(err, DependencyError::CircularDependency { .. }));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mgr = DependencyManager::default();
        let err = mgr
            .add_dependency(
                WorkflowId::new("a"),
                Dependency::Workflow {
                    workflow_id: WorkflowId::new("a"),
                    expected_status: DependencyExpectedStatus::Completed,
                },
            )
            .unwrap_err();
        assert!(matches!(err, DependencyError::CircularDependency { .. }));
    }

    #[test]
    fn check_fails_with_no_upstream_execution() {
        let mgr = DependencyManager::default();
        mgr.add_dependency(
            WorkflowId::new("w2"),
            Dependency::Workflow {
                workflow_id: WorkflowId::new("w1"),
                expected_status: DependencyExpectedStatus::Completed,
            },
        )
        .unwrap();

        let lookup = FixedLookup(HashMap::new());
        let err = mgr
            .check_dependencies(&WorkflowId::new("w2"), Utc::now(), &lookup)
            .unwrap_err();
        assert!(err.to_string().contains("w1"));
    }

    #[test]
    fn check_passes_when_upstream_completed_today() {
        let mgr = DependencyManager::default();
        mgr.add_dependency(
            WorkflowId::new("w2"),
            Dependency::Workflow {
                workflow_id: WorkflowId::new("w1"),
                expected_status: DependencyExpectedStatus::Completed,
            },
        )
        .unwrap();

        let now = Utc::now();
        let mut map = HashMap::new();
        map.insert(
            WorkflowId::new("w1"),
            LatestExecution {
                status: ExecutionStatus::Completed,
                end_time: Some(now),
            },
        );
        let lookup = FixedLookup(map);
        assert!(mgr
            .check_dependencies(&WorkflowId::new("w2"), now, &lookup)
            .is_ok());
    }

    #[test]
    fn time_dependency_validates_hour_range() {
        let bad = Dependency::Time {
            start_hour: 25,
            end_hour: 26,
            days_of_week: vec![],
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn workflow_with_no_dependencies_always_passes() {
        let mgr = DependencyManager::default();
        let lookup = FixedLookup(HashMap::new());
        assert!(mgr
            .check_dependencies(&WorkflowId::new("lonely"), Utc::now(), &lookup)
            .is_ok());
    }
}
