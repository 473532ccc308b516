//! In-memory document store

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::storage::{field_value, Document, DocumentStore};
use crate::domain::DomainError;

/// Thread-safe in-memory document store
///
/// Useful for testing and development. Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryDocumentStore<D>
where
    D: Document,
{
    documents: RwLock<HashMap<String, D>>,
}

impl<D> Default for InMemoryDocumentStore<D>
where
    D: Document,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<D> InMemoryDocumentStore<D>
where
    D: Document,
{
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store pre-populated with documents
    pub fn with_documents(documents: Vec<D>) -> Self {
        let store = Self::new();
        {
            let mut map = store
                .documents
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            for document in documents {
                map.insert(document.id().to_string(), document);
            }
        }
        store
    }

    fn unique_conflict(existing: &HashMap<String, D>, candidate: &D) -> Option<&'static str> {
        D::UNIQUE_FIELDS.iter().copied().find(|field| {
            let Some(value) = field_value(candidate, field) else {
                return false;
            };

            existing.values().any(|other| {
                other.id() != candidate.id()
                    && field_value(other, field).as_deref() == Some(value.as_str())
            })
        })
    }
}

#[async_trait]
impl<D> DocumentStore<D> for InMemoryDocumentStore<D>
where
    D: Document + 'static,
{
    async fn get(&self, id: &str) -> Result<Option<D>, DomainError> {
        let documents = self.documents.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(documents.get(id).cloned())
    }

    async fn find_one(&self, field: &str, value: &str) -> Result<Option<D>, DomainError> {
        let documents = self.documents.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(documents
            .values()
            .find(|d| field_value(*d, field).as_deref() == Some(value))
            .cloned())
    }

    async fn find_many(&self, field: &str, value: &str) -> Result<Vec<D>, DomainError> {
        let documents = self.documents.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(documents
            .values()
            .filter(|d| field_value(*d, field).as_deref() == Some(value))
            .cloned()
            .collect())
    }

    async fn insert(&self, document: D) -> Result<D, DomainError> {
        let id = document.id().to_string();
        let mut documents = self.documents.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if documents.contains_key(&id) {
            return Err(DomainError::conflict(format!(
                "{} document '{}' already exists",
                D::COLLECTION,
                id
            )));
        }

        if let Some(field) = Self::unique_conflict(&documents, &document) {
            return Err(DomainError::conflict(format!(
                "{} document with duplicate '{}'",
                D::COLLECTION,
                field
            )));
        }

        documents.insert(id, document.clone());
        Ok(document)
    }

    async fn replace(&self, document: D) -> Result<D, DomainError> {
        let id = document.id().to_string();
        let mut documents = self.documents.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if !documents.contains_key(&id) {
            return Err(DomainError::not_found(format!(
                "{} document '{}' not found",
                D::COLLECTION,
                id
            )));
        }

        if let Some(field) = Self::unique_conflict(&documents, &document) {
            return Err(DomainError::conflict(format!(
                "{} document with duplicate '{}'",
                D::COLLECTION,
                field
            )));
        }

        documents.insert(id, document.clone());
        Ok(document)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
