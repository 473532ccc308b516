//! The set of collections making up the credential store

use std::sync::Arc;

use crate::domain::api_key::ApiKey;
use crate::domain::storage::DocumentStore;
use crate::domain::tenant::{Plan, Project, User};
use crate::domain::DomainError;

use super::factory::StorageFactory;
use super::in_memory::InMemoryDocumentStore;

#[derive(Debug, Clone)]
pub struct CredentialStores {
    pub keys: Arc<dyn DocumentStore<ApiKey>>,
    pub projects: Arc<dyn DocumentStore<Project>>,
    pub plans: Arc<dyn DocumentStore<Plan>>,
    pub users: Arc<dyn DocumentStore<User>>,
}

impl CredentialStores {
    pub fn in_memory() -> Self {
        Self {
            keys: Arc::new(InMemoryDocumentStore::new()),
            projects: Arc::new(InMemoryDocumentStore::new()),
            plans: Arc::new(InMemoryDocumentStore::new()),
            users: Arc::new(InMemoryDocumentStore::new()),
        }
    }

    pub async fn from_factory(factory: &StorageFactory) -> Result<Self, DomainError> {
        Ok(Self {
            keys: factory.document_store().await?,
            projects: factory.document_store().await?,
            plans: factory.document_store().await?,
            users: factory.document_store().await?,
        })
    }

    /// Checks every collection's backend
    pub async fn ping(&self) -> Result<(), DomainError> {
        self.keys.ping().await?;
        self.projects.ping().await?;
        self.plans.ping().await?;
        self.users.ping().await
    }
}
