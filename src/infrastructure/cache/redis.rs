//! Redis shared tier
//!
//! Holds serialized introspection results and the quota counters. All
//! instances of the gateway see the same values.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};

use crate::domain::cache::Cache;
use crate::domain::DomainError;

/// INCRBY and PEXPIRE in one round trip. The expiry is only set when the
/// counter was just created (or somehow lost its TTL), so the window is
/// anchored at the first increment.
const INCREMENT_WITH_EXPIRY: &str = r#"
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if value == tonumber(ARGV[1]) or redis.call('PTTL', KEYS[1]) == -1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return value
"#;

#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// e.g. `redis://127.0.0.1:6379`
    pub url: String,
    /// Prepended verbatim to every key, e.g. `ezk:`
    pub key_prefix: Option<String>,
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: None,
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    fn namespaced(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        }
    }
}

fn millis(ttl: Duration) -> u64 {
    ttl.as_millis().clamp(1, u64::MAX as u128) as u64
}

fn cache_error(operation: &str, key: &str, error: RedisError) -> DomainError {
    DomainError::cache(format!("Redis {} on '{}' failed: {}", operation, key, error))
}

/// Shared tier backed by a multiplexed Redis connection
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
    increment_script: Script,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("url", &self.config.url)
            .field("key_prefix", &self.config.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    /// Opens the connection manager; reconnects are handled by it afterwards
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::configuration(format!("Invalid Redis URL: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            config,
            increment_script: Script::new(INCREMENT_WITH_EXPIRY),
        })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut conn = self.connection.clone();

        conn.get(self.config.namespaced(key))
            .await
            .map_err(|e| cache_error("GET", key, e))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        conn.pset_ex::<_, _, ()>(self.config.namespaced(key), value, millis(ttl))
            .await
            .map_err(|e| cache_error("PSETEX", key, e))
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        let removed: u32 = conn
            .del(self.config.namespaced(key))
            .await
            .map_err(|e| cache_error("DEL", key, e))?;

        Ok(removed > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        let mut conn = self.connection.clone();

        let remaining: i64 = conn
            .pttl(self.config.namespaced(key))
            .await
            .map_err(|e| cache_error("PTTL", key, e))?;

        // -2: no such key, -1: no expiry
        Ok(u64::try_from(remaining).ok().map(Duration::from_millis))
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, DomainError> {
        let mut conn = self.connection.clone();

        self.increment_script
            .key(self.config.namespaced(key))
            .arg(delta)
            .arg(millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| cache_error("INCRBY", key, e))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| cache_error("PING", "-", e))
    }
}
