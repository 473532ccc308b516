//! Transactional usage ledger traits

use std::fmt::Debug;

use async_trait::async_trait;

use super::{LedgerKey, LedgerNamespace, UsageCounter, UsageKind};
use crate::domain::DomainError;

/// Exclusive handle on one subject's counter.
///
/// Other transactions on the same subject wait until this one is committed
/// or dropped. Dropping without commit discards the changes.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Counter as read when the transaction began
    fn counter(&self) -> &UsageCounter;

    /// Writes `counter` and releases the subject
    async fn commit(self: Box<Self>, counter: UsageCounter) -> Result<(), DomainError>;
}

/// Durable per-subject usage counters plus global aggregates
#[async_trait]
pub trait UsageLedger: Send + Sync + Debug {
    /// Opens an exclusive transaction on a subject, creating its row if absent
    async fn begin(&self, key: &LedgerKey) -> Result<Box<dyn LedgerTransaction>, DomainError>;

    /// Reads a counter without locking
    async fn get(&self, key: &LedgerKey) -> Result<Option<UsageCounter>, DomainError>;

    /// Adds one to the aggregate for `(namespace, kind, month)`
    async fn bump_aggregate(
        &self,
        namespace: LedgerNamespace,
        kind: UsageKind,
        month: &str,
    ) -> Result<(), DomainError>;

    /// Reads the aggregate for `(namespace, kind, month)`
    async fn aggregate(
        &self,
        namespace: LedgerNamespace,
        kind: UsageKind,
        month: &str,
    ) -> Result<u64, DomainError>;

    /// Round-trips the backend
    async fn ping(&self) -> Result<(), DomainError>;
}
