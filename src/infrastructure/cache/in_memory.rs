//! Single-process shared tier on moka, for development and tests

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::Cache;
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    pub max_capacity: u64,
    /// Hard ceiling on any entry's lifetime, whatever TTL it was written with
    pub default_ttl: Duration,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            default_ttl: Duration::from_secs(3600),
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

#[derive(Debug, Clone)]
struct Slot {
    json: String,
    deadline: Instant,
}

impl Slot {
    fn new(json: String, ttl: Duration) -> Self {
        Self {
            json,
            deadline: Instant::now() + ttl,
        }
    }

    fn remaining(&self) -> Option<Duration> {
        self.deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }
}

/// Shared-tier implementation for a single gateway instance.
///
/// Each slot carries its own deadline. Counter updates run under moka's
/// per-key entry lock, so an increment and the window it opens are applied
/// together.
#[derive(Debug)]
pub struct InMemoryCache {
    slots: MokaCache<String, Slot>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let slots = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.default_ttl)
            .build();

        Self { slots }
    }

    async fn live(&self, key: &str) -> Option<Slot> {
        let slot = self.slots.get(key).await?;
        if slot.remaining().is_some() {
            Some(slot)
        } else {
            self.slots.invalidate(key).await;
            None
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.live(key).await.map(|slot| slot.json))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        self.slots
            .insert(key.to_string(), Slot::new(value.to_string(), ttl))
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.slots.remove(key).await.is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, DomainError> {
        Ok(self.live(key).await.and_then(|slot| slot.remaining()))
    }

    async fn increment_with_expiry(
        &self,
        key: &str,
        delta: i64,
        ttl: Duration,
    ) -> Result<i64, DomainError> {
        let entry = self
            .slots
            .entry_by_ref(key)
            .and_upsert_with(|existing| {
                let open_window = existing
                    .map(|e| e.into_value())
                    .filter(|slot| slot.remaining().is_some());

                let next = match open_window {
                    Some(slot) => Slot {
                        json: (slot.json.parse::<i64>().unwrap_or(0) + delta).to_string(),
                        deadline: slot.deadline,
                    },
                    None => Slot::new(delta.to_string(), ttl),
                };

                std::future::ready(next)
            })
            .await;

        entry
            .into_value()
            .json
            .parse::<i64>()
            .map_err(|e| DomainError::cache(format!("Counter '{}' is not numeric: {}", key, e)))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
