//! Authentication domain - request context and cached authorization decisions

mod context;
mod introspection;

pub use context::{AccessScope, AuthContext, Credential, CredentialKind};
pub use introspection::{IntrospectionResult, KeySnapshot, PlanSnapshot, TenantSnapshot};
