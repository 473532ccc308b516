//! Shared-tier key layout

/// Namespace for cached introspection results
pub const INTROSPECTION_NAMESPACE: &str = "apikey:introspect";

/// Namespace for fixed-window quota counters
pub const QUOTA_NAMESPACE: &str = "quota";

/// Key under which the introspection result for a lookup hash is stored
pub fn introspection_key(lookup_hash: &str) -> String {
    format!("{}:{}", INTROSPECTION_NAMESPACE, lookup_hash)
}
