//! Fixed-window request quotas

mod enforcer;

pub use enforcer::QuotaEnforcer;
