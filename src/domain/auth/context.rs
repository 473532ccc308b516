//! Typed identity and authorization context attached to a request

use serde::Serialize;

use crate::domain::quota::QuotaIdentity;
use crate::domain::DomainError;

use super::introspection::PlanSnapshot;

/// How the caller authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    ApiKey,
    Session,
}

/// Whether a route needs a project (tenant) behind the credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessScope {
    #[default]
    Any,
    TenantRequired,
}

/// Credential presented on a request, before verification
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    Bearer(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(key) => write!(
                f,
                "ApiKey({}…)",
                key.chars().take(12).collect::<String>()
            ),
            Self::Bearer(_) => write!(f, "Bearer([hidden])"),
        }
    }
}

/// Verified caller context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthContext {
    pub kind: CredentialKind,
    pub user_id: String,
    pub project_id: Option<String>,
    pub key_id: Option<String>,
    pub key_prefix: Option<String>,
    pub plan: Option<PlanSnapshot>,
    pub billing_customer_id: Option<String>,
}

impl AuthContext {
    /// Identity the rate limiter counts against: the project for API keys,
    /// the user for session tokens
    pub fn quota_identity(&self) -> QuotaIdentity {
        match (&self.kind, &self.project_id) {
            (CredentialKind::ApiKey, Some(project_id)) => QuotaIdentity::Tenant(project_id.clone()),
            _ => QuotaIdentity::User(self.user_id.clone()),
        }
    }

    pub fn requests_per_minute(&self) -> Option<u32> {
        self.plan.as_ref().and_then(|p| p.requests_per_minute)
    }

    pub fn require_project(&self) -> Result<&str, DomainError> {
        self.project_id
            .as_deref()
            .ok_or_else(|| DomainError::forbidden("Credential is not scoped to a project"))
    }
}
