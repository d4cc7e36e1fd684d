pub mod memory;
pub mod models;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use models::{NewTask, Task, TaskPatch};

pub use memory::MemoryTaskStore;
pub use postgres::PgTaskStore;

/// Connection string prefix selecting the in-process store
pub const MEMORY_URL_SCHEME: &str = "memory://";

/// Errors from a task store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Corrupt document {id}: {reason}")]
    CorruptDocument { id: Uuid, reason: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// The single `tarefas` collection.
///
/// Implementations must be safe to share across request tasks; isolation
/// between concurrent requests is the store's own business (one statement
/// per operation for Postgres, one lock acquisition for the memory store).
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task under a freshly generated id
    async fn insert(&self, task: NewTask) -> Result<Task, StoreError>;

    /// All tasks in creation order
    async fn list_all(&self) -> Result<Vec<Task>, StoreError>;

    /// Apply only the supplied fields. `None` when no task has this id.
    async fn update(&self, id: Uuid, patch: TaskPatch) -> Result<Option<Task>, StoreError>;

    /// Hard delete. `false` when no task has this id.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Connectivity check for the health endpoint
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Open the store named by the configured connection string
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn TaskStore>, StoreError> {
    if config.url.starts_with(MEMORY_URL_SCHEME) {
        tracing::warn!("Using in-memory task store; data will not survive a restart");
        return Ok(Arc::new(MemoryTaskStore::new()));
    }

    let store = PgTaskStore::connect(config).await?;
    Ok(Arc::new(store))
}
