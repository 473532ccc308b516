//! Two-tier introspection cache in front of the credential store

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache as MokaCache;
use moka::Expiry;
use tracing::{debug, warn};

use crate::domain::auth::IntrospectionResult;
use crate::domain::cache::{introspection_key, Cache, CacheExt};

#[derive(Debug, Clone)]
pub struct IntrospectionCacheConfig {
    /// Lifetime of an entry in the process-local tier
    pub local_ttl: Duration,
    /// Lifetime of an entry in the shared tier
    pub shared_ttl: Duration,
    /// Maximum entries held in the local tier
    pub local_capacity: u64,
    /// Maximum entries kept for fail-safe fallback
    pub last_known_capacity: u64,
}

impl Default for IntrospectionCacheConfig {
    fn default() -> Self {
        Self {
            local_ttl: Duration::from_secs(5),
            shared_ttl: Duration::from_secs(60),
            local_capacity: 10_000,
            last_known_capacity: 50_000,
        }
    }
}

/// Tier an introspection result was served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Local,
    Shared,
}

/// Local-tier value with the lifetime it was written with
#[derive(Debug, Clone)]
struct LocalEntry {
    result: IntrospectionResult,
    ttl: Duration,
}

/// Expires each local entry after its own `ttl`, including on overwrite
struct EntryLifetime;

impl Expiry<String, LocalEntry> for EntryLifetime {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &LocalEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &LocalEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Local moka tier plus shared key-value tier, keyed by lookup hash.
///
/// Entries are never invalidated on revoke. A promoted shared hit lives in
/// the local tier no longer than the shared entry has left, so a revoked key
/// stops verifying once the shared TTL of the last write has passed. The
/// last value written per hash is kept separately, without a TTL, for
/// fail-safe reuse.
#[derive(Debug)]
pub struct IntrospectionCache {
    local: MokaCache<String, LocalEntry>,
    shared: Arc<dyn Cache>,
    last_known: MokaCache<String, IntrospectionResult>,
    config: IntrospectionCacheConfig,
}

impl IntrospectionCache {
    pub fn new(shared: Arc<dyn Cache>, config: IntrospectionCacheConfig) -> Self {
        let local = MokaCache::builder()
            .max_capacity(config.local_capacity)
            .expire_after(EntryLifetime)
            .build();

        let last_known = MokaCache::builder()
            .max_capacity(config.last_known_capacity)
            .build();

        Self {
            local,
            shared,
            last_known,
            config,
        }
    }

    /// Local tier, then shared tier. Shared hits are promoted to the local
    /// tier for at most the shared entry's remaining lifetime. Shared-tier
    /// failures count as a miss.
    pub async fn get(&self, lookup_hash: &str) -> Option<(IntrospectionResult, CacheTier)> {
        if let Some(entry) = self.local.get(lookup_hash).await {
            return Some((entry.result, CacheTier::Local));
        }

        let key = introspection_key(lookup_hash);
        match self.shared.get::<IntrospectionResult>(&key).await {
            Ok(Some(result)) => {
                self.promote(lookup_hash, &key, &result).await;
                Some((result, CacheTier::Shared))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Shared introspection tier unavailable, treating as miss");
                None
            }
        }
    }

    async fn promote(&self, lookup_hash: &str, key: &str, result: &IntrospectionResult) {
        let remaining = match self.shared.ttl(key).await {
            Ok(Some(remaining)) => remaining,
            Ok(None) => {
                debug!("Shared introspection entry has no expiry left, not promoting");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Could not read shared introspection TTL, not promoting");
                return;
            }
        };

        let ttl = remaining.min(self.config.local_ttl);
        if ttl.is_zero() {
            return;
        }

        self.local
            .insert(
                lookup_hash.to_string(),
                LocalEntry {
                    result: result.clone(),
                    ttl,
                },
            )
            .await;
    }

    /// Writes both tiers and the fail-safe copy
    pub async fn put(&self, lookup_hash: &str, result: &IntrospectionResult) {
        self.local
            .insert(
                lookup_hash.to_string(),
                LocalEntry {
                    result: result.clone(),
                    ttl: self.config.local_ttl,
                },
            )
            .await;
        self.last_known
            .insert(lookup_hash.to_string(), result.clone())
            .await;

        if let Err(e) = self
            .shared
            .set(&introspection_key(lookup_hash), result, self.config.shared_ttl)
            .await
        {
            warn!(error = %e, "Failed to write shared introspection tier");
        } else {
            debug!(key_prefix = %result.key.key_prefix, "Cached introspection result");
        }
    }

    /// Most recent value written for this hash, regardless of TTL
    pub async fn last_known(&self, lookup_hash: &str) -> Option<IntrospectionResult> {
        self.last_known.get(lookup_hash).await
    }
}
