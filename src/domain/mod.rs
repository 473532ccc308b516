//! Domain layer - Core business logic and entities

pub mod api_key;
pub mod auth;
pub mod cache;
pub mod error;
pub mod otp;
pub mod quota;
pub mod storage;
pub mod tenant;
pub mod usage;

pub use api_key::{ApiKey, ApiKeyId, ApiKeyStatus, KeyAlgorithm, KeyHashes};
pub use auth::{
    AccessScope, AuthContext, Credential, CredentialKind, IntrospectionResult, KeySnapshot,
    PlanSnapshot, TenantSnapshot,
};
pub use cache::{Cache, CacheExt};
pub use error::DomainError;
pub use otp::{OtpChannel, OtpDispatcher, OtpReceipt, OtpRequest};
pub use quota::{QuotaDecision, QuotaIdentity, QUOTA_WINDOW};
pub use storage::{Document, DocumentStore};
pub use tenant::{Plan, PlanLimits, Project, ProjectStatus, User, UserStatus};
pub use usage::{
    BillingEvent, BillingProvider, LedgerKey, LedgerNamespace, LedgerTransaction, UsageCounter,
    UsageKind, UsageLedger,
};
