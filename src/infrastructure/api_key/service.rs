//! API key service
//!
//! Issues, lists and revokes project-scoped keys. The plaintext key leaves
//! this service exactly once, in the [`IssuedKey`] returned by `issue`.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::api_key::ApiKey;
use crate::domain::storage::DocumentStore;
use crate::domain::tenant::Project;
use crate::domain::DomainError;

use super::generator::ApiKeyGenerator;
use super::hasher::KeyHasher;

const MAX_NAME_LEN: usize = 100;

/// Result of issuing a key
#[derive(Debug)]
pub struct IssuedKey {
    /// Full key; never stored
    pub plaintext: String,
    pub key_prefix: String,
    pub api_key: ApiKey,
}

#[derive(Debug)]
pub struct ApiKeyService {
    keys: Arc<dyn DocumentStore<ApiKey>>,
    projects: Arc<dyn DocumentStore<Project>>,
    hasher: Option<Arc<KeyHasher>>,
    generator: ApiKeyGenerator,
}

impl ApiKeyService {
    pub fn new(
        keys: Arc<dyn DocumentStore<ApiKey>>,
        projects: Arc<dyn DocumentStore<Project>>,
        hasher: Option<Arc<KeyHasher>>,
    ) -> Self {
        Self {
            keys,
            projects,
            hasher,
            generator: ApiKeyGenerator::new(),
        }
    }

    fn hasher(&self) -> Result<Arc<KeyHasher>, DomainError> {
        self.hasher
            .clone()
            .ok_or_else(|| DomainError::internal("API key pepper is not configured"))
    }

    async fn owned_project(&self, owner_id: &str, project_id: &str) -> Result<Project, DomainError> {
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Project '{}' not found", project_id)))?;

        if project.owner_id != owner_id {
            return Err(DomainError::forbidden("Caller does not own this project"));
        }

        Ok(project)
    }

    /// Creates a key for a project the caller owns.
    ///
    /// The duplicate-name check and the insert are separate store calls.
    /// Two concurrent issues with the same name can both pass the check, so
    /// names are unique per project only for sequential callers.
    pub async fn issue(
        &self,
        owner_id: &str,
        project_id: &str,
        name: &str,
    ) -> Result<IssuedKey, DomainError> {
        let name = name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "Key name must be between 1 and {} characters",
                MAX_NAME_LEN
            )));
        }

        let hasher = self.hasher()?;
        self.owned_project(owner_id, project_id).await?;

        let existing = self.keys.find_many("project_id", project_id).await?;
        if existing.iter().any(|k| k.name() == name) {
            return Err(DomainError::conflict(format!(
                "A key named '{}' already exists in this project",
                name
            )));
        }

        let generated = self.generator.generate();
        let plaintext = generated.key.clone();
        let hashes = tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| DomainError::internal(format!("Hashing task failed: {}", e)))??;

        let api_key = ApiKey::new(owner_id, project_id, name, &generated.prefix, hashes);
        let api_key = self.keys.insert(api_key).await?;

        info!(
            key_id = %api_key.id(),
            key_prefix = %generated.prefix,
            project_id = %project_id,
            "API key issued"
        );

        Ok(IssuedKey {
            plaintext: generated.key,
            key_prefix: generated.prefix,
            api_key,
        })
    }

    /// Keys of a project the caller owns
    pub async fn list(&self, owner_id: &str, project_id: &str) -> Result<Vec<ApiKey>, DomainError> {
        self.owned_project(owner_id, project_id).await?;

        let mut keys = self.keys.find_many("project_id", project_id).await?;
        keys.sort_by_key(|k| k.created_at());

        Ok(keys)
    }

    /// Marks a key revoked. Cached authorizations keep accepting it until
    /// they expire.
    pub async fn revoke(
        &self,
        owner_id: &str,
        project_id: &str,
        key_id: &str,
    ) -> Result<ApiKey, DomainError> {
        let mut api_key = self
            .keys
            .get(key_id)
            .await?
            .filter(|k| k.project_id() == project_id)
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", key_id)))?;

        if api_key.owner_id() != owner_id {
            return Err(DomainError::forbidden("Caller does not own this key"));
        }

        if !api_key.is_active() {
            debug!(key_id = %key_id, "API key already revoked");
            return Ok(api_key);
        }

        api_key.revoke();
        let api_key = self.keys.replace(api_key).await?;

        info!(key_id = %key_id, key_prefix = %api_key.key_prefix(), "API key revoked");

        Ok(api_key)
    }

    /// Slow-hash check of a plaintext against a stored key
    pub async fn verify_secret(&self, plaintext: &str, api_key: &ApiKey) -> Result<bool, DomainError> {
        self.hasher()?
            .verify_off_thread(plaintext, api_key.verification_hash())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::ApiKeyStatus;
    use crate::infrastructure::api_key::Argon2Settings;
    use crate::infrastructure::storage::InMemoryDocumentStore;

    struct Fixture {
        service: ApiKeyService,
        keys: Arc<InMemoryDocumentStore<ApiKey>>,
    }

    fn fixture() -> Fixture {
        let keys = Arc::new(InMemoryDocumentStore::new());
        let projects = Arc::new(InMemoryDocumentStore::with_documents(vec![
            Project::new("p1", "alice", "Alice's app"),
            Project::new("p2", "bob", "Bob's app"),
        ]));
        let hasher = KeyHasher::new("test-pepper", Argon2Settings::fast()).unwrap();

        Fixture {
            service: ApiKeyService::new(keys.clone(), projects, Some(Arc::new(hasher))),
            keys,
        }
    }

    #[tokio::test]
    async fn test_issue_returns_plaintext_once() {
        let fx = fixture();
        let issued = fx.service.issue("alice", "p1", "ci").await.unwrap();

        assert!(ApiKeyGenerator::validate_format(&issued.plaintext).is_ok());
        assert_eq!(issued.key_prefix, &issued.plaintext[..12]);
        assert_eq!(issued.api_key.key_prefix(), issued.key_prefix);

        let stored = fx.keys.get(issued.api_key.id().as_str()).await.unwrap().unwrap();
        let stored_json = serde_json::to_string(&stored).unwrap();
        assert!(!stored_json.contains(&issued.plaintext));
        assert_ne!(stored.lookup_hash(), issued.plaintext);
    }

    #[tokio::test]
    async fn test_issued_key_verifies() {
        let fx = fixture();
        let issued = fx.service.issue("alice", "p1", "ci").await.unwrap();

        assert!(fx
            .service
            .verify_secret(&issued.plaintext, &issued.api_key)
            .await
            .unwrap());
        assert!(!fx
            .service
            .verify_secret("ezk_WRONG", &issued.api_key)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_issue_errors() {
        let fx = fixture();

        let missing = fx.service.issue("alice", "nope", "ci").await;
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));

        let not_owner = fx.service.issue("alice", "p2", "ci").await;
        assert!(matches!(not_owner, Err(DomainError::Forbidden { .. })));

        fx.service.issue("alice", "p1", "ci").await.unwrap();
        let duplicate = fx.service.issue("alice", "p1", "ci").await;
        assert!(matches!(duplicate, Err(DomainError::Conflict { .. })));

        let blank = fx.service.issue("alice", "p1", "  ").await;
        assert!(matches!(blank, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_issue_without_pepper_is_internal_error() {
        let service = ApiKeyService::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryDocumentStore::with_documents(vec![Project::new(
                "p1", "alice", "app",
            )])),
            None,
        );

        let result = service.issue("alice", "p1", "ci").await;
        assert!(matches!(result, Err(DomainError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_list_and_revoke() {
        let fx = fixture();
        let first = fx.service.issue("alice", "p1", "ci").await.unwrap();
        fx.service.issue("alice", "p1", "prod").await.unwrap();

        let listed = fx.service.list("alice", "p1").await.unwrap();
        assert_eq!(listed.len(), 2);

        let not_owner = fx.service.list("bob", "p1").await;
        assert!(matches!(not_owner, Err(DomainError::Forbidden { .. })));

        let key_id = first.api_key.id().as_str().to_string();

        let wrong_project = fx.service.revoke("alice", "p2", &key_id).await;
        assert!(matches!(wrong_project, Err(DomainError::NotFound { .. })));

        let revoked = fx.service.revoke("alice", "p1", &key_id).await.unwrap();
        assert_eq!(revoked.status(), ApiKeyStatus::Revoked);

        // Idempotent
        let again = fx.service.revoke("alice", "p1", &key_id).await.unwrap();
        assert_eq!(again.revoked_at(), revoked.revoked_at());
    }
}
