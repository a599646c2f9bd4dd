//! `TaskRepo` boundary: the persistence the scheduler manager reads from
//! when migrating tasks between adapters (§4.8). The core workspace does
//! not implement a backing store — persistence is explicitly out of scope
//! (§1) — only the trait shape the manager depends on.

use crate::error::CollectorError;
use crate::executor::CollectionTask;
use async_trait::async_trait;
use jobgrid_core::WorkflowId;

/// One page of a paged `TaskRepo` listing.
#[derive(Debug, Clone, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_offset: Option<u64>,
}

/// Read access to stored collection tasks, used by `SwitchScheduler`'s
/// migration pass (§4.8) to enumerate every task 1000 at a time.
#[async_trait]
pub trait TaskRepo: Send + Sync {
    async fn get(&self, workflow_id: WorkflowId) -> Result<CollectionTask, CollectorError>;

    /// Lists tasks in pages of `page_size`, starting at `offset`.
    async fn list_paged(
        &self,
        offset: u64,
        page_size: u64,
    ) -> Result<Page<CollectionTask>, CollectorError>;
}

/// In-memory `TaskRepo` fake for tests.
pub mod testing {
    use super::{CollectionTask, CollectorError, Page, TaskRepo, WorkflowId};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryTaskRepo {
        tasks: Mutex<BTreeMap<String, CollectionTask>>,
    }

    impl InMemoryTaskRepo {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, task: CollectionTask) {
            self.tasks
                .lock()
                .unwrap()
                .insert(task.workflow_id.to_string(), task);
        }
    }

    #[async_trait]
    impl TaskRepo for InMemoryTaskRepo {
        async fn get(&self, workflow_id: WorkflowId) -> Result<CollectionTask, CollectorError> {
            self.tasks
                .lock()
                .unwrap()
                .get(&workflow_id.to_string())
                .cloned()
                .ok_or(CollectorError::TaskNotFound { workflow_id })
        }

        async fn list_paged(
            &self,
            offset: u64,
            page_size: u64,
        ) -> Result<Page<CollectionTask>, CollectorError> {
            let tasks = self.tasks.lock().unwrap();
            let all: Vec<CollectionTask> = tasks.values().cloned().collect();
            let start = offset as usize;
            let end = (start + page_size as usize).min(all.len());
            let items = if start < all.len() {
                all[start..end].to_vec()
            } else {
                Vec::new()
            };
            let next_offset = if end < all.len() {
                Some(end as u64)
            } else {
                None
            };
            Ok(Page { items, next_offset })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::InMemoryTaskRepo;
    use super::*;

    #[tokio::test]
    async fn paged_listing_respects_page_size() {
        let repo = InMemoryTaskRepo::new();
        for i in 0..5 {
            repo.insert(CollectionTask::new(
                WorkflowId::new(format!("w{i}")),
                "ds",
            ));
        }

        let page1 = repo.list_paged(0, 2).await.expect("page1");
        assert_eq!(page1.items.len(), 2);
        assert_eq!(page1.next_offset, Some(2));

        let page3 = repo.list_paged(4, 2).await.expect("page3");
        assert_eq!(page3.items.len(), 1);
        assert_eq!(page3.next_offset, None);
    }

    #[tokio::test]
    async fn get_missing_task_is_not_found() {
        let repo = InMemoryTaskRepo::new();
        let err = repo.get(WorkflowId::new("missing")).await.unwrap_err();
        assert!(matches!(err, CollectorError::TaskNotFound { .. }));
    }
}
