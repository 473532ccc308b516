//! Authorization decision cached per lookup hash

use serde::{Deserialize, Serialize};

use crate::domain::api_key::{ApiKey, ApiKeyStatus};
use crate::domain::tenant::{Plan, Project, ProjectStatus, User};

/// Key fields needed to authorize a request. Hash material is not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySnapshot {
    pub id: String,
    pub owner_id: String,
    pub project_id: String,
    pub key_prefix: String,
    pub status: ApiKeyStatus,
}

impl From<&ApiKey> for KeySnapshot {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().as_str().to_string(),
            owner_id: key.owner_id().to_string(),
            project_id: key.project_id().to_string(),
            key_prefix: key.key_prefix().to_string(),
            status: key.status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSnapshot {
    pub id: String,
    pub owner_id: String,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_customer_id: Option<String>,
}

impl TenantSnapshot {
    pub fn from_project(project: &Project, owner: Option<&User>) -> Self {
        Self {
            id: project.id.clone(),
            owner_id: project.owner_id.clone(),
            status: project.status,
            billing_customer_id: owner.and_then(|u| u.billing_customer_id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
}

impl From<&Plan> for PlanSnapshot {
    fn from(plan: &Plan) -> Self {
        Self {
            id: plan.id.clone(),
            requests_per_minute: plan.limits.requests_per_minute,
        }
    }
}

/// Cache payload stored under `apikey:introspect:<lookup_hash>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionResult {
    pub key: KeySnapshot,
    #[serde(default)]
    pub tenant: Option<TenantSnapshot>,
    #[serde(default)]
    pub plan: Option<PlanSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::{KeyAlgorithm, KeyHashes};

    #[test]
    fn test_key_snapshot_drops_hash_material() {
        let key = ApiKey::new(
            "u1",
            "p1",
            "ci",
            "ezk_ABCDEFGH",
            KeyHashes {
                lookup_hash: "lookup-secret".to_string(),
                verification_hash: "$argon2id$secret".to_string(),
                salt: "salt".to_string(),
                algorithm: KeyAlgorithm::Argon2id,
            },
        );

        let result = IntrospectionResult {
            key: KeySnapshot::from(&key),
            tenant: None,
            plan: None,
        };
        let json = serde_json::to_string(&result).unwrap();

        assert!(json.contains("ezk_ABCDEFGH"));
        assert!(!json.contains("lookup-secret"));
        assert!(!json.contains("argon2id$secret"));
    }

    #[test]
    fn test_tenant_snapshot_takes_owner_billing_id() {
        let project = Project::new("p1", "u1", "Demo");
        let owner = User::new("u1").with_billing_customer("cus_123");

        let snapshot = TenantSnapshot::from_project(&project, Some(&owner));
        assert_eq!(snapshot.billing_customer_id.as_deref(), Some("cus_123"));

        let snapshot = TenantSnapshot::from_project(&project, None);
        assert!(snapshot.billing_customer_id.is_none());
    }
}
