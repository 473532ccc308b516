//! PostgreSQL document store with connection pooling

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::domain::storage::{Document, DocumentStore};
use crate::domain::DomainError;

/// PostgreSQL connection configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/ezk_gateway".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Opens a connection pool
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

/// Document collection stored as JSONB rows keyed by document id
///
/// The table is named after the collection. Unique fields are enforced with
/// expression indexes on `data->>'field'`.
pub struct PostgresDocumentStore<D>
where
    D: Document,
{
    pool: PgPool,
    _phantom: PhantomData<D>,
}

impl<D> Debug for PostgresDocumentStore<D>
where
    D: Document,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDocumentStore")
            .field("collection", &D::COLLECTION)
            .finish()
    }
}

impl<D> PostgresDocumentStore<D>
where
    D: Document,
{
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }

    /// Ensures the collection table and its unique indexes exist
    pub async fn ensure_collection(&self) -> Result<(), DomainError> {
        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id VARCHAR(255) PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            D::COLLECTION
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create table: {}", e)))?;

        for field in D::UNIQUE_FIELDS {
            let query = format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {table}_{field}_key ON {table} ((data->>'{field}'))",
                table = D::COLLECTION,
                field = field
            );

            sqlx::query(&query)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to create index: {}", e)))?;
        }

        Ok(())
    }

    fn decode(data: serde_json::Value) -> Result<D, DomainError> {
        serde_json::from_value(data).map_err(|e| {
            DomainError::storage(format!("Failed to deserialize {}: {}", D::COLLECTION, e))
        })
    }

    fn encode(document: &D) -> Result<serde_json::Value, DomainError> {
        serde_json::to_value(document).map_err(|e| {
            DomainError::storage(format!("Failed to serialize {}: {}", D::COLLECTION, e))
        })
    }
}

#[async_trait]
impl<D> DocumentStore<D> for PostgresDocumentStore<D>
where
    D: Document + 'static,
{
    async fn get(&self, id: &str) -> Result<Option<D>, DomainError> {
        let query = format!("SELECT data FROM {} WHERE id = $1", D::COLLECTION);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get document: {}", e)))?;

        row.map(|row| Self::decode(row.get("data"))).transpose()
    }

    async fn find_one(&self, field: &str, value: &str) -> Result<Option<D>, DomainError> {
        let query = format!(
            "SELECT data FROM {} WHERE data->>$1 = $2 LIMIT 1",
            D::COLLECTION
        );

        let row = sqlx::query(&query)
            .bind(field)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to find document: {}", e)))?;

        row.map(|row| Self::decode(row.get("data"))).transpose()
    }

    async fn find_many(&self, field: &str, value: &str) -> Result<Vec<D>, DomainError> {
        let query = format!(
            "SELECT data FROM {} WHERE data->>$1 = $2 ORDER BY created_at",
            D::COLLECTION
        );

        let rows = sqlx::query(&query)
            .bind(field)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to find documents: {}", e)))?;

        rows.into_iter()
            .map(|row| Self::decode(row.get("data")))
            .collect()
    }

    async fn insert(&self, document: D) -> Result<D, DomainError> {
        let data = Self::encode(&document)?;
        let query = format!("INSERT INTO {} (id, data) VALUES ($1, $2)", D::COLLECTION);

        sqlx::query(&query)
            .bind(document.id())
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::conflict(format!(
                        "{} document '{}' already exists",
                        D::COLLECTION,
                        document.id()
                    ))
                } else {
                    DomainError::storage(format!("Failed to insert document: {}", e))
                }
            })?;

        Ok(document)
    }

    async fn replace(&self, document: D) -> Result<D, DomainError> {
        let data = Self::encode(&document)?;
        let query = format!(
            "UPDATE {} SET data = $2, updated_at = NOW() WHERE id = $1",
            D::COLLECTION
        );

        let result = sqlx::query(&query)
            .bind(document.id())
            .bind(&data)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::conflict(format!("Duplicate unique field in {}", D::COLLECTION))
                } else {
                    DomainError::storage(format!("Failed to update document: {}", e))
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "{} document '{}' not found",
                D::COLLECTION,
                document.id()
            )));
        }

        Ok(document)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("PostgreSQL ping failed: {}", e)))?;

        Ok(())
    }
}
