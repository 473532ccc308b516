//! Credential verification gate
//!
//! Turns a presented credential into an [`AuthContext`] or a rejection.
//! API keys go through the introspection cache tiers before the credential
//! store; session tokens are validated locally and bypass key caching.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::api_key::ApiKeyStatus;
use crate::domain::auth::{
    AccessScope, AuthContext, Credential, CredentialKind, IntrospectionResult, KeySnapshot,
    PlanSnapshot, TenantSnapshot,
};
use crate::domain::tenant::{Plan, ProjectStatus, User};
use crate::domain::DomainError;
use crate::infrastructure::api_key::{ApiKeyGenerator, KeyHasher, KEY_LEN};
use crate::infrastructure::cache::IntrospectionCache;
use crate::infrastructure::storage::CredentialStores;

use super::jwt::JwtGenerator;

const BEARER_PREFIX: &str = "bearer ";

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Keys shorter than this are rejected before hashing
    pub min_key_length: usize,
    /// Reuse the last cached decision when the store is unreachable
    pub fail_safe: bool,
    /// Upper bound on one credential store lookup
    pub store_timeout: Duration,
    /// Check the Argon2 hash whenever a key is read from the store
    pub verify_secret_on_store_read: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_key_length: KEY_LEN,
            fail_safe: false,
            store_timeout: Duration::from_secs(2),
            verify_secret_on_store_read: true,
        }
    }
}

#[derive(Debug)]
pub struct CredentialGate {
    stores: CredentialStores,
    cache: Arc<IntrospectionCache>,
    hasher: Option<Arc<KeyHasher>>,
    sessions: Arc<dyn JwtGenerator>,
    config: GateConfig,
}

impl CredentialGate {
    pub fn new(
        stores: CredentialStores,
        cache: Arc<IntrospectionCache>,
        hasher: Option<Arc<KeyHasher>>,
        sessions: Arc<dyn JwtGenerator>,
        config: GateConfig,
    ) -> Self {
        Self {
            stores,
            cache,
            hasher,
            sessions,
            config,
        }
    }

    /// Picks the credential from the `x-api-key` and `Authorization` header
    /// values. A static key wins when both are present.
    pub fn classify(
        api_key: Option<&str>,
        authorization: Option<&str>,
    ) -> Result<Credential, DomainError> {
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(Credential::ApiKey(key.to_string()));
        }

        let token = authorization
            .map(str::trim)
            .filter(|h| h.len() > BEARER_PREFIX.len())
            .filter(|h| h[..BEARER_PREFIX.len()].eq_ignore_ascii_case(BEARER_PREFIX))
            .map(|h| h[BEARER_PREFIX.len()..].trim())
            .filter(|t| !t.is_empty());

        match token {
            Some(token) => Ok(Credential::Bearer(token.to_string())),
            None => Err(DomainError::unauthorized(
                "Missing credentials: provide x-api-key or Authorization: Bearer",
            )),
        }
    }

    pub async fn authorize(
        &self,
        credential: &Credential,
        scope: AccessScope,
    ) -> Result<AuthContext, DomainError> {
        match credential {
            Credential::ApiKey(key) => self.authorize_api_key(key, scope).await,
            Credential::Bearer(token) => self.authorize_session(token, scope).await,
        }
    }

    async fn authorize_api_key(
        &self,
        key: &str,
        scope: AccessScope,
    ) -> Result<AuthContext, DomainError> {
        let hasher = self
            .hasher
            .clone()
            .ok_or_else(|| DomainError::internal("API key pepper is not configured"))?;

        if key.len() < self.config.min_key_length {
            return Err(DomainError::unauthorized("Invalid API key"));
        }

        if let Err(e) = ApiKeyGenerator::validate_format(key) {
            debug!(key_prefix = %ApiKeyGenerator::prefix_of(key), reason = %e, "Rejected malformed API key");
            return Err(DomainError::unauthorized("Invalid API key"));
        }

        let lookup_hash = hasher.lookup_hash(key)?;
        let result = self.introspect(&hasher, key, &lookup_hash).await?;

        Self::evaluate(result, scope)
    }

    async fn introspect(
        &self,
        hasher: &Arc<KeyHasher>,
        key: &str,
        lookup_hash: &str,
    ) -> Result<IntrospectionResult, DomainError> {
        if let Some((result, tier)) = self.cache.get(lookup_hash).await {
            debug!(key_prefix = %result.key.key_prefix, ?tier, "Introspection cache hit");
            return Ok(result);
        }

        let lookup = tokio::time::timeout(
            self.config.store_timeout,
            self.load_from_store(hasher, key, lookup_hash),
        )
        .await
        .unwrap_or_else(|_| Err(DomainError::unavailable("Credential store lookup timed out")));

        match lookup {
            Ok(Some(result)) => {
                self.cache.put(lookup_hash, &result).await;
                Ok(result)
            }
            Ok(None) => Err(DomainError::unauthorized("Invalid API key")),
            Err(e) if e.is_backend_failure() => self.fall_back(lookup_hash, key, e).await,
            Err(e) => Err(e),
        }
    }

    async fn fall_back(
        &self,
        lookup_hash: &str,
        key: &str,
        error: DomainError,
    ) -> Result<IntrospectionResult, DomainError> {
        if self.config.fail_safe {
            if let Some(result) = self.cache.last_known(lookup_hash).await {
                warn!(
                    key_prefix = %result.key.key_prefix,
                    error = %error,
                    "Credential store unreachable, serving last known authorization"
                );
                return Ok(result);
            }
        }

        warn!(
            key_prefix = %ApiKeyGenerator::prefix_of(key),
            error = %error,
            "Credential store unreachable, rejecting request"
        );
        Err(DomainError::unavailable("Authentication backend unavailable"))
    }

    async fn load_from_store(
        &self,
        hasher: &Arc<KeyHasher>,
        key: &str,
        lookup_hash: &str,
    ) -> Result<Option<IntrospectionResult>, DomainError> {
        let Some(api_key) = self.stores.keys.find_one("lookup_hash", lookup_hash).await? else {
            debug!(key_prefix = %ApiKeyGenerator::prefix_of(key), "No key for lookup hash");
            return Ok(None);
        };

        if self.config.verify_secret_on_store_read {
            let verified = hasher
                .verify_off_thread(key, api_key.verification_hash())
                .await?;

            if !verified {
                warn!(key_id = %api_key.id(), "Lookup hash matched but verification hash did not");
                return Ok(None);
            }
        }

        let project = self.stores.projects.get(api_key.project_id()).await?;
        let owner = match &project {
            Some(project) => self.stores.users.get(&project.owner_id).await?,
            None => None,
        };

        let plan_id = project
            .as_ref()
            .and_then(|p| p.plan_id.clone())
            .or_else(|| owner.as_ref().and_then(|u| u.plan_id.clone()));
        let plan = match plan_id {
            Some(plan_id) => self.stores.plans.get(&plan_id).await?,
            None => None,
        };

        Ok(Some(IntrospectionResult {
            key: KeySnapshot::from(&api_key),
            tenant: project
                .as_ref()
                .map(|p| TenantSnapshot::from_project(p, owner.as_ref())),
            plan: plan.as_ref().map(PlanSnapshot::from),
        }))
    }

    fn evaluate(result: IntrospectionResult, scope: AccessScope) -> Result<AuthContext, DomainError> {
        if result.key.status != ApiKeyStatus::Active {
            return Err(DomainError::unauthorized("API key has been revoked"));
        }

        match &result.tenant {
            Some(tenant) if tenant.status == ProjectStatus::Suspended => {
                return Err(DomainError::forbidden("Project is suspended"));
            }
            None if scope == AccessScope::TenantRequired => {
                return Err(DomainError::forbidden("API key has no project context"));
            }
            _ => {}
        }

        Ok(AuthContext {
            kind: CredentialKind::ApiKey,
            user_id: result.key.owner_id,
            project_id: result.tenant.as_ref().map(|t| t.id.clone()),
            key_id: Some(result.key.id),
            key_prefix: Some(result.key.key_prefix),
            billing_customer_id: result.tenant.and_then(|t| t.billing_customer_id),
            plan: result.plan,
        })
    }

    async fn authorize_session(
        &self,
        token: &str,
        scope: AccessScope,
    ) -> Result<AuthContext, DomainError> {
        let claims = self.sessions.validate(token)?;

        if scope == AccessScope::TenantRequired {
            return Err(DomainError::forbidden("This route requires a project API key"));
        }

        let (user, plan) = tokio::time::timeout(
            self.config.store_timeout,
            self.load_session_principal(claims.user_id()),
        )
        .await
        .map_err(|_| DomainError::unavailable("Credential store lookup timed out"))?
        .map_err(|e| {
            if e.is_backend_failure() {
                DomainError::unavailable("Authentication backend unavailable")
            } else {
                e
            }
        })?;

        Ok(AuthContext {
            kind: CredentialKind::Session,
            user_id: user.id,
            project_id: None,
            key_id: None,
            key_prefix: None,
            plan: plan.as_ref().map(PlanSnapshot::from),
            billing_customer_id: user.billing_customer_id,
        })
    }

    /// Active user behind a session and the user's plan, if any
    async fn load_session_principal(
        &self,
        user_id: &str,
    ) -> Result<(User, Option<Plan>), DomainError> {
        let user = self
            .stores
            .users
            .get(user_id)
            .await?
            .filter(|u| u.is_active())
            .ok_or_else(|| DomainError::unauthorized("Unknown or inactive user"))?;

        let plan = match &user.plan_id {
            Some(plan_id) => self.stores.plans.get(plan_id).await?,
            None => None,
        };

        Ok((user, plan))
    }
}
