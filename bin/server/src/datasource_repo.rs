//! Data source storage boundary.
//!
//! Per-core, persistence of data sources is explicitly a `Repo`-interface
//! concern (§1, §6): "external state lives in the Repo (task/datasource/
//! template/user)". This binary defines the narrow trait its HTTP routes
//! need and, for the reference deployment, an in-memory fake — the same
//! split `UserRepo`/`InMemoryUserRepo` use.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use ulid::Ulid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasourceRepoError {
    NotFound { id: String },
}

impl std::fmt::Display for DatasourceRepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "data source not found: {id}"),
        }
    }
}

impl std::error::Error for DatasourceRepoError {}

#[async_trait]
pub trait DatasourceRepo: Send + Sync {
    async fn create(&self, name: String, kind: String, config: Map<String, Value>) -> DataSource;
    async fn get(&self, id: &str) -> Result<DataSource, DatasourceRepoError>;
    async fn list(&self) -> Vec<DataSource>;
    async fn update(
        &self,
        id: &str,
        name: Option<String>,
        config: Option<Map<String, Value>>,
    ) -> Result<DataSource, DatasourceRepoError>;
    async fn delete(&self, id: &str) -> Result<(), DatasourceRepoError>;
}

#[derive(Default)]
pub struct InMemoryDatasourceRepo {
    sources: Mutex<HashMap<String, DataSource>>,
}

impl InMemoryDatasourceRepo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatasourceRepo for InMemoryDatasourceRepo {
    async fn create(&self, name: String, kind: String, config: Map<String, Value>) -> DataSource {
        let source = DataSource {
            id: Ulid::new().to_string(),
            name,
            kind,
            config,
        };
        self.sources.lock().insert(source.id.clone(), source.clone());
        source
    }

    async fn get(&self, id: &str) -> Result<DataSource, DatasourceRepoError> {
        self.sources
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| DatasourceRepoError::NotFound { id: id.to_string() })
    }

    async fn list(&self) -> Vec<DataSource> {
        self.sources.lock().values().cloned().collect()
    }

    async fn update(
        &self,
        id: &str,
        name: Option<String>,
        config: Option<Map<String, Value>>,
    ) -> Result<DataSource, DatasourceRepoError> {
        let mut sources = self.sources.lock();
        let source = sources
            .get_mut(id)
            .ok_or_else(|| DatasourceRepoError::NotFound { id: id.to_string() })?;
        if let Some(name) = name {
            source.name = name;
        }
        if let Some(config) = config {
            source.config = config;
        }
        Ok(source.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), DatasourceRepoError> {
        self.sources
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DatasourceRepoError::NotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = InMemoryDatasourceRepo::new();
        let created = repo.create("orders-db".to_string(), "postgres".to_string(), Map::new()).await;
        let fetched = repo.get(&created.id).await.expect("get");
        assert_eq!(fetched.name, "orders-db");
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let repo = InMemoryDatasourceRepo::new();
        assert!(matches!(
            repo.delete("missing").await,
            Err(DatasourceRepoError::NotFound { .. })
        ));
    }
}
