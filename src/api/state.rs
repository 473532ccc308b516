//! Application state for shared services

use std::sync::Arc;

use crate::domain::api_key::ApiKey;
use crate::domain::auth::{AccessScope, AuthContext, Credential};
use crate::domain::cache::Cache;
use crate::domain::otp::OtpDispatcher;
use crate::domain::quota::{QuotaDecision, QuotaIdentity};
use crate::domain::storage::DocumentStore;
use crate::domain::tenant::Project;
use crate::domain::DomainError;
use crate::infrastructure::api_key::{ApiKeyService, IssuedKey};
use crate::infrastructure::auth::CredentialGate;
use crate::infrastructure::quota::QuotaEnforcer;
use crate::infrastructure::storage::CredentialStores;
use crate::infrastructure::usage::UsageMeter;

/// Billing policy applied to metered OTP sends
#[derive(Debug, Clone, Default)]
pub struct UsagePolicy {
    /// Free sends per project per month; unset disables billing
    pub free_allowance: Option<u64>,
}

/// Application state containing shared services using dynamic dispatch
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<dyn CredentialGateTrait>,
    pub api_key_service: Arc<dyn ApiKeyServiceTrait>,
    pub quota: Arc<dyn QuotaServiceTrait>,
    pub meter: Arc<UsageMeter>,
    pub otp: Arc<dyn OtpDispatcher>,
    pub projects: Arc<dyn DocumentStore<Project>>,
    pub usage_policy: UsagePolicy,
    pub probes: Arc<Probes>,
}

/// Backends checked by the readiness probe
#[derive(Debug, Clone)]
pub struct Probes {
    pub stores: CredentialStores,
    pub shared_cache: Arc<dyn Cache>,
}

/// Trait for credential verification
#[async_trait::async_trait]
pub trait CredentialGateTrait: Send + Sync {
    async fn authorize(
        &self,
        credential: &Credential,
        scope: AccessScope,
    ) -> Result<AuthContext, DomainError>;
}

/// Trait for API key service operations
#[async_trait::async_trait]
pub trait ApiKeyServiceTrait: Send + Sync {
    async fn issue(&self, owner_id: &str, project_id: &str, name: &str)
    -> Result<IssuedKey, DomainError>;
    async fn list(&self, owner_id: &str, project_id: &str) -> Result<Vec<ApiKey>, DomainError>;
    async fn revoke(&self, owner_id: &str, project_id: &str, key_id: &str)
    -> Result<ApiKey, DomainError>;
}

/// Trait for quota enforcement
#[async_trait::async_trait]
pub trait QuotaServiceTrait: Send + Sync {
    async fn check_and_increment(
        &self,
        identity: &QuotaIdentity,
        limit: Option<u32>,
    ) -> Result<QuotaDecision, DomainError>;
}

#[async_trait::async_trait]
impl CredentialGateTrait for CredentialGate {
    async fn authorize(
        &self,
        credential: &Credential,
        scope: AccessScope,
    ) -> Result<AuthContext, DomainError> {
        CredentialGate::authorize(self, credential, scope).await
    }
}

#[async_trait::async_trait]
impl ApiKeyServiceTrait for ApiKeyService {
    async fn issue(
        &self,
        owner_id: &str,
        project_id: &str,
        name: &str,
    ) -> Result<IssuedKey, DomainError> {
        ApiKeyService::issue(self, owner_id, project_id, name).await
    }

    async fn list(&self, owner_id: &str, project_id: &str) -> Result<Vec<ApiKey>, DomainError> {
        ApiKeyService::list(self, owner_id, project_id).await
    }

    async fn revoke(
        &self,
        owner_id: &str,
        project_id: &str,
        key_id: &str,
    ) -> Result<ApiKey, DomainError> {
        ApiKeyService::revoke(self, owner_id, project_id, key_id).await
    }
}

#[async_trait::async_trait]
impl QuotaServiceTrait for QuotaEnforcer {
    async fn check_and_increment(
        &self,
        identity: &QuotaIdentity,
        limit: Option<u32>,
    ) -> Result<QuotaDecision, DomainError> {
        QuotaEnforcer::check_and_increment(self, identity, limit).await
    }
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gate: Arc<dyn CredentialGateTrait>,
        api_key_service: Arc<dyn ApiKeyServiceTrait>,
        quota: Arc<dyn QuotaServiceTrait>,
        meter: Arc<UsageMeter>,
        otp: Arc<dyn OtpDispatcher>,
        projects: Arc<dyn DocumentStore<Project>>,
        usage_policy: UsagePolicy,
        probes: Probes,
    ) -> Self {
        Self {
            gate,
            api_key_service,
            quota,
            meter,
            otp,
            projects,
            usage_policy,
            probes: Arc::new(probes),
        }
    }
}
