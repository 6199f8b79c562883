/// PostgreSQL storage backend
///
/// Stores each collection as one row. The version column implements the
/// conditional writes described in [`super::backend`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE record_collections (
///     key TEXT PRIMARY KEY,
///     value TEXT NOT NULL,
///     version BIGINT NOT NULL DEFAULT 1,
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::backend::{StoreBackend, StoreError, Stored};

/// Record store backend on a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Creates a backend on an existing pool
    ///
    /// The `record_collections` table must exist; see
    /// [`crate::db::migrations::run_migrations`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_version(&self, key: &str) -> Result<u64, StoreError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM record_collections WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(version.unwrap_or(0) as u64)
    }
}

#[async_trait]
impl StoreBackend for PgBackend {
    async fn get(&self, key: &str) -> Result<Option<Stored>, StoreError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT value, version FROM record_collections WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value, version)| Stored {
            value,
            version: version as u64,
        }))
    }

    async fn put(
        &self,
        key: &str,
        value: String,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let new_version: Option<i64> = match expected_version {
            None => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO record_collections (key, value)
                    VALUES ($1, $2)
                    ON CONFLICT (key) DO UPDATE
                    SET value = EXCLUDED.value,
                        version = record_collections.version + 1,
                        updated_at = NOW()
                    RETURNING version
                    "#,
                )
                .bind(key)
                .bind(&value)
                .fetch_optional(&self.pool)
                .await?
            }
            Some(0) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO record_collections (key, value)
                    VALUES ($1, $2)
                    ON CONFLICT (key) DO NOTHING
                    RETURNING version
                    "#,
                )
                .bind(key)
                .bind(&value)
                .fetch_optional(&self.pool)
                .await?
            }
            Some(expected) => {
                sqlx::query_scalar(
                    r#"
                    UPDATE record_collections
                    SET value = $2, version = version + 1, updated_at = NOW()
                    WHERE key = $1 AND version = $3
                    RETURNING version
                    "#,
                )
                .bind(key)
                .bind(&value)
                .bind(expected as i64)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        match new_version {
            Some(version) => {
                debug!(key, version, "Collection written");
                Ok(version as u64)
            }
            None => Err(StoreError::Conflict {
                key: key.to_string(),
                expected: expected_version.unwrap_or(0),
                actual: self.current_version(key).await?,
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM record_collections WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn health(&self) -> Result<(), StoreError> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }
}
