//! Document store trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::Document;

/// Collection-level access to the credential store
#[async_trait]
pub trait DocumentStore<D>: Send + Sync + Debug
where
    D: Document + 'static,
{
    /// Retrieves a document by its id
    async fn get(&self, id: &str) -> Result<Option<D>, DomainError>;

    /// Retrieves the first document whose top-level `field` equals `value`
    async fn find_one(&self, field: &str, value: &str) -> Result<Option<D>, DomainError>;

    /// Retrieves every document whose top-level `field` equals `value`
    async fn find_many(&self, field: &str, value: &str) -> Result<Vec<D>, DomainError>;

    /// Inserts a new document; fails with `Conflict` on a duplicate id or
    /// unique field
    async fn insert(&self, document: D) -> Result<D, DomainError>;

    /// Replaces an existing document; fails with `NotFound` if absent
    async fn replace(&self, document: D) -> Result<D, DomainError>;

    /// Checks that the backend is reachable
    async fn ping(&self) -> Result<(), DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Store wrapper that can be switched offline and counts reads
    #[derive(Debug)]
    pub struct FlakyStore<D: Document> {
        inner: Arc<dyn DocumentStore<D>>,
        offline: AtomicBool,
        reads: AtomicUsize,
    }

    impl<D: Document + 'static> FlakyStore<D> {
        pub fn new(inner: Arc<dyn DocumentStore<D>>) -> Self {
            Self {
                inner,
                offline: AtomicBool::new(false),
                reads: AtomicUsize::new(0),
            }
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<(), DomainError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(DomainError::storage("credential store offline"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl<D: Document + 'static> DocumentStore<D> for FlakyStore<D> {
        async fn get(&self, id: &str) -> Result<Option<D>, DomainError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.get(id).await
        }

        async fn find_one(&self, field: &str, value: &str) -> Result<Option<D>, DomainError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.find_one(field, value).await
        }

        async fn find_many(&self, field: &str, value: &str) -> Result<Vec<D>, DomainError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.find_many(field, value).await
        }

        async fn insert(&self, document: D) -> Result<D, DomainError> {
            self.check()?;
            self.inner.insert(document).await
        }

        async fn replace(&self, document: D) -> Result<D, DomainError> {
            self.check()?;
            self.inner.replace(document).await
        }

        async fn ping(&self) -> Result<(), DomainError> {
            self.check()
        }
    }
}
