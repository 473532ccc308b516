//! Cache domain - key-value abstraction shared by the introspection and quota tiers

mod key;
mod repository;

pub use key::{introspection_key, INTROSPECTION_NAMESPACE, QUOTA_NAMESPACE};
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
