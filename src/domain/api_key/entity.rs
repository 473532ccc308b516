//! API Key entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::storage::Document;

/// API key identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyId(String);

impl ApiKeyId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(format!("key_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ApiKeyId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ApiKeyId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    #[default]
    Active,
    Revoked,
}

impl ApiKeyStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Scheme used for the verification hash of record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    #[default]
    Argon2id,
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Argon2id => write!(f, "argon2id"),
        }
    }
}

/// Hashed credential material derived from a plaintext key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHashes {
    /// Peppered HMAC of the plaintext, used as the index
    pub lookup_hash: String,
    /// Salted memory-hard hash of plaintext + pepper (PHC string)
    pub verification_hash: String,
    pub salt: String,
    pub algorithm: KeyAlgorithm,
}

/// Stored API key record. Never carries the plaintext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    id: ApiKeyId,
    owner_id: String,
    project_id: String,
    name: String,
    key_prefix: String,
    lookup_hash: String,
    verification_hash: String,
    salt: String,
    algorithm: KeyAlgorithm,
    status: ApiKeyStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revoked_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn new(
        owner_id: impl Into<String>,
        project_id: impl Into<String>,
        name: impl Into<String>,
        key_prefix: impl Into<String>,
        hashes: KeyHashes,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: ApiKeyId::generate(),
            owner_id: owner_id.into(),
            project_id: project_id.into(),
            name: name.into(),
            key_prefix: key_prefix.into(),
            lookup_hash: hashes.lookup_hash,
            verification_hash: hashes.verification_hash,
            salt: hashes.salt,
            algorithm: hashes.algorithm,
            status: ApiKeyStatus::Active,
            created_at: now,
            updated_at: now,
            revoked_at: None,
        }
    }

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn lookup_hash(&self) -> &str {
        &self.lookup_hash
    }

    pub fn verification_hash(&self) -> &str {
        &self.verification_hash
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn status(&self) -> ApiKeyStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Revoke the key. Revoking twice keeps the first timestamp.
    pub fn revoke(&mut self) {
        if self.status == ApiKeyStatus::Revoked {
            return;
        }

        let now = Utc::now();
        self.status = ApiKeyStatus::Revoked;
        self.revoked_at = Some(now);
        self.updated_at = now;
    }
}

impl Document for ApiKey {
    const COLLECTION: &'static str = "api_keys";
    const UNIQUE_FIELDS: &'static [&'static str] = &["lookup_hash"];

    fn id(&self) -> &str {
        self.id.as_str()
    }
}
