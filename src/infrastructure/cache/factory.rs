//! Picks the shared tier backend at startup

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::domain::cache::Cache;
use crate::domain::DomainError;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};

/// Nothing the gateway writes to the shared tier lives longer than this
const IN_MEMORY_ENTRY_CEILING: Duration = Duration::from_secs(86_400);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    /// Process-local; only correct with a single gateway instance
    #[default]
    #[serde(alias = "memory")]
    InMemory,
    Redis,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CacheType::InMemory => "in_memory",
            CacheType::Redis => "redis",
        })
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_type: CacheType,
    /// Required for [`CacheType::Redis`]
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    /// In-memory backend only
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            redis_url: None,
            key_prefix: None,
            max_capacity: 100_000,
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    pub async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Cache>, DomainError> {
        match config.cache_type {
            CacheType::InMemory => {
                info!(
                    max_capacity = config.max_capacity,
                    "Shared cache is in-memory; quotas and introspection are per instance"
                );

                Ok(Arc::new(InMemoryCache::with_config(
                    InMemoryCacheConfig::default()
                        .with_max_capacity(config.max_capacity)
                        .with_default_ttl(IN_MEMORY_ENTRY_CEILING),
                )))
            }
            CacheType::Redis => {
                let url = config.redis_url.as_deref().ok_or_else(|| {
                    DomainError::configuration("cache.redis_url is required for the redis backend")
                })?;

                let redis_config = match &config.key_prefix {
                    Some(prefix) => RedisCacheConfig::new(url).with_key_prefix(prefix.clone()),
                    None => RedisCacheConfig::new(url),
                };

                info!(prefix = ?config.key_prefix, "Connecting to Redis shared cache");
                Ok(Arc::new(RedisCache::new(redis_config).await?))
            }
        }
    }
}
