//! Shared key-value tier used by the introspection cache and quota counters

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// TTL-aware key-value store.
///
/// Values cross the trait as JSON strings so it stays object safe; typed
/// access goes through [`CacheExt`].
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Stores `value`, replacing any previous value and expiry
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Returns whether a value was removed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Remaining lifetime; `None` for a missing key or one without expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError>;

    /// Atomically increments a counter, returning the new value.
    ///
    /// When the increment creates the counter (result equals `delta`) the
    /// expiry is set to `ttl` in the same atomic step. Later increments in
    /// the window leave the expiry untouched.
    async fn increment_with_expiry(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, DomainError>;

    /// Round-trips the backend
    async fn ping(&self) -> Result<(), DomainError>;
}

/// JSON-typed access on top of [`Cache`]
pub trait CacheExt: Cache {
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            self.get_raw(key)
                .await?
                .map(|json| serde_json::from_str(&json))
                .transpose()
                .map_err(|e| DomainError::cache(format!("Undecodable value at '{}': {}", key, e)))
        }
    }

    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let json = serde_json::to_string(value)
                .map_err(|e| DomainError::cache(format!("Unencodable value for '{}': {}", key, e)))?;
            self.set_raw(key, &json, ttl).await
        }
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}
