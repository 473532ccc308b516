//! Cache infrastructure - shared tier backends and the introspection cache

mod factory;
mod in_memory;
mod introspection;
mod redis;

pub use factory::{CacheConfig, CacheFactory, CacheType};
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use introspection::{CacheTier, IntrospectionCache, IntrospectionCacheConfig};
pub use redis::{RedisCache, RedisCacheConfig};
