//! In-memory usage ledger

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::usage::{
    LedgerKey, LedgerNamespace, LedgerTransaction, UsageCounter, UsageKind, UsageLedger,
};
use crate::domain::DomainError;

type AggregateKey = (LedgerNamespace, UsageKind, String);

/// Usage ledger held in process memory.
///
/// Each subject has its own async mutex; a transaction owns the guard until
/// it is committed or dropped.
#[derive(Debug, Default)]
pub struct InMemoryUsageLedger {
    counters: RwLock<HashMap<LedgerKey, Arc<Mutex<UsageCounter>>>>,
    aggregates: RwLock<HashMap<AggregateKey, u64>>,
}

impl InMemoryUsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &LedgerKey) -> Result<Arc<Mutex<UsageCounter>>, DomainError> {
        if let Some(slot) = self
            .counters
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?
            .get(key)
        {
            return Ok(slot.clone());
        }

        let mut counters = self
            .counters
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;

        Ok(counters
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(UsageCounter::new(&key.subject_id))))
            .clone())
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<UsageCounter>,
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    fn counter(&self) -> &UsageCounter {
        &self.guard
    }

    async fn commit(mut self: Box<Self>, counter: UsageCounter) -> Result<(), DomainError> {
        *self.guard = counter;
        Ok(())
    }
}

#[async_trait]
impl UsageLedger for InMemoryUsageLedger {
    async fn begin(&self, key: &LedgerKey) -> Result<Box<dyn LedgerTransaction>, DomainError> {
        let guard = self.slot(key)?.lock_owned().await;
        Ok(Box::new(InMemoryTransaction { guard }))
    }

    async fn get(&self, key: &LedgerKey) -> Result<Option<UsageCounter>, DomainError> {
        let slot = self
            .counters
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?
            .get(key)
            .cloned();

        match slot {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn bump_aggregate(
        &self,
        namespace: LedgerNamespace,
        kind: UsageKind,
        month: &str,
    ) -> Result<(), DomainError> {
        let mut aggregates = self
            .aggregates
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;

        *aggregates
            .entry((namespace, kind, month.to_string()))
            .or_insert(0) += 1;

        Ok(())
    }

    async fn aggregate(
        &self,
        namespace: LedgerNamespace,
        kind: UsageKind,
        month: &str,
    ) -> Result<u64, DomainError> {
        let aggregates = self
            .aggregates
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(aggregates
            .get(&(namespace, kind, month.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
