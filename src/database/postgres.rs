use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::models::{NewTask, Task, TaskPatch};
use super::{StoreError, TaskStore};
use crate::config::DatabaseConfig;

/// PostgreSQL used as a document store: one JSONB document per task.
///
/// `seq` breaks ties between tasks created within the same timestamp tick.
const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS tarefas (
        id UUID PRIMARY KEY,
        seq BIGSERIAL NOT NULL,
        documento JSONB NOT NULL,
        criado_em TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

/// Advisory lock key serializing schema creation across concurrent starts
const SCHEMA_LOCK_KEY: i64 = 0x7461_7265_6661;

#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    /// Connect a pool and make sure the collection table exists
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let store = Self::from_pool(pool);
        store.ensure_schema().await?;
        info!(
            "Connected task store (max_connections={})",
            config.max_connections
        );
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        // CREATE TABLE IF NOT EXISTS is not atomic against a concurrent create
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        sqlx::query(SCHEMA).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn row_to_task(row: &PgRow) -> Result<Task, StoreError> {
    let id: Uuid = row.try_get("id")?;
    let document: Value = row.try_get("documento")?;
    Task::from_document(id, document).map_err(|e| StoreError::CorruptDocument {
        id,
        reason: e.to_string(),
    })
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: NewTask) -> Result<Task, StoreError> {
        let id = Uuid::new_v4();

        sqlx::query("INSERT INTO tarefas (id, documento, criado_em) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(task.to_document())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(task.into_task(id))
    }

    async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query("SELECT id, documento FROM tarefas ORDER BY criado_em, seq")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_task).collect()
    }

    async fn update(&self, id: Uuid, patch: TaskPatch) -> Result<Option<Task>, StoreError> {
        // `||` merges top-level keys, so absent fields keep their stored value
        let row = sqlx::query(
            "UPDATE tarefas SET documento = documento || $2 WHERE id = $1 RETURNING id, documento",
        )
        .bind(id)
        .bind(patch.to_document())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_task).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tarefas WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
