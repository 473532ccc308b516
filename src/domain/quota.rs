//! Fixed-window quota types

use std::fmt;
use std::time::Duration;

use crate::domain::cache::QUOTA_NAMESPACE;

/// Length of a quota window
pub const QUOTA_WINDOW: Duration = Duration::from_secs(60);

/// Identity a request counts against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuotaIdentity {
    Tenant(String),
    User(String),
}

impl QuotaIdentity {
    /// Shared-store counter key, e.g. `quota:tenant:<id>:rpm`
    pub fn counter_key(&self) -> String {
        match self {
            Self::Tenant(id) => format!("{}:tenant:{}:rpm", QUOTA_NAMESPACE, id),
            Self::User(id) => format!("{}:user:{}:rpm", QUOTA_NAMESPACE, id),
        }
    }
}

impl fmt::Display for QuotaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tenant(id) => write!(f, "tenant:{}", id),
            Self::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Outcome of a quota check that let the request through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// No limit configured for the identity
    Unlimited,
    /// Counted; `remaining` requests left in the current window
    Allowed { count: u64, remaining: u64 },
}
