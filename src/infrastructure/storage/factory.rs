//! Storage factory for runtime backend selection

use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use crate::domain::storage::{Document, DocumentStore};
use crate::domain::usage::UsageLedger;
use crate::domain::DomainError;
use crate::infrastructure::usage::{InMemoryUsageLedger, PostgresUsageLedger};

use super::in_memory::InMemoryDocumentStore;
use super::postgres::{PostgresConfig, PostgresDocumentStore};

/// Supported storage types
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    #[default]
    #[serde(alias = "memory")]
    InMemory,
    /// PostgreSQL storage
    #[serde(alias = "postgresql")]
    Postgres,
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    InMemory,
    Postgres(PostgresConfig),
}

/// Builds document stores and the usage ledger on one backend.
///
/// For Postgres every collection shares a single connection pool.
#[derive(Debug, Clone)]
pub enum StorageFactory {
    InMemory,
    Postgres(PgPool),
}

impl StorageFactory {
    /// Connects to the configured backend
    pub async fn connect(config: &StorageConfig) -> Result<Self, DomainError> {
        match config {
            StorageConfig::InMemory => {
                info!("Using in-memory credential store");
                Ok(Self::InMemory)
            }
            StorageConfig::Postgres(pg_config) => {
                info!(
                    max_connections = pg_config.max_connections,
                    "Connecting to PostgreSQL credential store"
                );
                Ok(Self::Postgres(pg_config.connect().await?))
            }
        }
    }

    /// Creates the store for a document collection
    pub async fn document_store<D>(&self) -> Result<Arc<dyn DocumentStore<D>>, DomainError>
    where
        D: Document + 'static,
    {
        match self {
            Self::InMemory => Ok(Arc::new(InMemoryDocumentStore::<D>::new())),
            Self::Postgres(pool) => {
                let store = PostgresDocumentStore::<D>::new(pool.clone());
                store.ensure_collection().await?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Creates the usage ledger
    pub async fn usage_ledger(&self) -> Result<Arc<dyn UsageLedger>, DomainError> {
        match self {
            Self::InMemory => Ok(Arc::new(InMemoryUsageLedger::new())),
            Self::Postgres(pool) => {
                let ledger = PostgresUsageLedger::new(pool.clone());
                ledger.ensure_tables().await?;
                Ok(Arc::new(ledger))
            }
        }
    }
}
