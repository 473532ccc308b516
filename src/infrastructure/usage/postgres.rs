//! PostgreSQL usage ledger
//!
//! One JSONB row per `(namespace, subject_id)`. A transaction holds the row
//! lock from `SELECT ... FOR UPDATE` until it commits or is dropped.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Row, Transaction};

use crate::domain::usage::{
    LedgerKey, LedgerNamespace, LedgerTransaction, UsageCounter, UsageKind, UsageLedger,
};
use crate::domain::DomainError;

const COUNTERS_TABLE: &str = "usage_counters";
const AGGREGATES_TABLE: &str = "usage_aggregates";

#[derive(Debug, Clone)]
pub struct PostgresUsageLedger {
    pool: PgPool,
}

impl PostgresUsageLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensures the counter and aggregate tables exist
    pub async fn ensure_tables(&self) -> Result<(), DomainError> {
        let statements = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    namespace VARCHAR(32) NOT NULL,
                    subject_id VARCHAR(512) NOT NULL,
                    data JSONB NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    PRIMARY KEY (namespace, subject_id)
                )
                "#,
                COUNTERS_TABLE
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    namespace VARCHAR(32) NOT NULL,
                    kind VARCHAR(64) NOT NULL,
                    month CHAR(7) NOT NULL,
                    count BIGINT NOT NULL DEFAULT 0,
                    PRIMARY KEY (namespace, kind, month)
                )
                "#,
                AGGREGATES_TABLE
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to create table: {}", e)))?;
        }

        Ok(())
    }

    fn decode(data: serde_json::Value) -> Result<UsageCounter, DomainError> {
        serde_json::from_value(data)
            .map_err(|e| DomainError::storage(format!("Failed to deserialize usage counter: {}", e)))
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    key: LedgerKey,
    counter: UsageCounter,
}

#[async_trait]
impl LedgerTransaction for PostgresTransaction {
    fn counter(&self) -> &UsageCounter {
        &self.counter
    }

    async fn commit(self: Box<Self>, counter: UsageCounter) -> Result<(), DomainError> {
        let PostgresTransaction { mut tx, key, .. } = *self;
        let data = serde_json::to_value(&counter)
            .map_err(|e| DomainError::storage(format!("Failed to serialize usage counter: {}", e)))?;

        let query = format!(
            "UPDATE {} SET data = $3, updated_at = NOW() WHERE namespace = $1 AND subject_id = $2",
            COUNTERS_TABLE
        );
        sqlx::query(&query)
            .bind(key.namespace.as_str())
            .bind(&key.subject_id)
            .bind(data)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to write usage counter: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit usage counter: {}", e)))
    }
}

#[async_trait]
impl UsageLedger for PostgresUsageLedger {
    async fn begin(&self, key: &LedgerKey) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        let seed = serde_json::to_value(UsageCounter::new(&key.subject_id))
            .map_err(|e| DomainError::storage(format!("Failed to serialize usage counter: {}", e)))?;
        let insert = format!(
            "INSERT INTO {} (namespace, subject_id, data) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            COUNTERS_TABLE
        );
        sqlx::query(&insert)
            .bind(key.namespace.as_str())
            .bind(&key.subject_id)
            .bind(seed)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create usage counter: {}", e)))?;

        let select = format!(
            "SELECT data FROM {} WHERE namespace = $1 AND subject_id = $2 FOR UPDATE",
            COUNTERS_TABLE
        );
        let row = sqlx::query(&select)
            .bind(key.namespace.as_str())
            .bind(&key.subject_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to lock usage counter: {}", e)))?;

        Ok(Box::new(PostgresTransaction {
            counter: Self::decode(row.get("data"))?,
            key: key.clone(),
            tx,
        }))
    }

    async fn get(&self, key: &LedgerKey) -> Result<Option<UsageCounter>, DomainError> {
        let query = format!(
            "SELECT data FROM {} WHERE namespace = $1 AND subject_id = $2",
            COUNTERS_TABLE
        );

        let row = sqlx::query(&query)
            .bind(key.namespace.as_str())
            .bind(&key.subject_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to read usage counter: {}", e)))?;

        row.map(|row| Self::decode(row.get("data"))).transpose()
    }

    async fn bump_aggregate(
        &self,
        namespace: LedgerNamespace,
        kind: UsageKind,
        month: &str,
    ) -> Result<(), DomainError> {
        let query = format!(
            r#"
            INSERT INTO {} (namespace, kind, month, count) VALUES ($1, $2, $3, 1)
            ON CONFLICT (namespace, kind, month) DO UPDATE SET count = {}.count + 1
            "#,
            AGGREGATES_TABLE, AGGREGATES_TABLE
        );

        sqlx::query(&query)
            .bind(namespace.as_str())
            .bind(kind.as_str())
            .bind(month)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update aggregate: {}", e)))?;

        Ok(())
    }

    async fn aggregate(
        &self,
        namespace: LedgerNamespace,
        kind: UsageKind,
        month: &str,
    ) -> Result<u64, DomainError> {
        let query = format!(
            "SELECT count FROM {} WHERE namespace = $1 AND kind = $2 AND month = $3",
            AGGREGATES_TABLE
        );

        let row = sqlx::query(&query)
            .bind(namespace.as_str())
            .bind(kind.as_str())
            .bind(month)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to read aggregate: {}", e)))?;

        Ok(row
            .map(|row| row.get::<i64, _>("count"))
            .unwrap_or(0)
            .max(0) as u64)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Database ping failed: {}", e)))?;
        Ok(())
    }
}
