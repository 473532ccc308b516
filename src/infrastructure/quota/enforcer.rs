//! Per-identity requests-per-minute enforcement over the shared cache

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::cache::Cache;
use crate::domain::quota::{QuotaDecision, QuotaIdentity, QUOTA_WINDOW};
use crate::domain::DomainError;

/// Counts requests in fixed windows that start at the first request.
///
/// A burst straddling a window boundary can admit up to twice the limit.
#[derive(Debug, Clone)]
pub struct QuotaEnforcer {
    cache: Arc<dyn Cache>,
}

impl QuotaEnforcer {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Counts one request against `identity`. Without a limit nothing is
    /// counted. Fails closed when the counter store is unreachable.
    pub async fn check_and_increment(
        &self,
        identity: &QuotaIdentity,
        limit: Option<u32>,
    ) -> Result<QuotaDecision, DomainError> {
        let Some(limit) = limit else {
            return Ok(QuotaDecision::Unlimited);
        };

        let key = identity.counter_key();
        let count = self
            .cache
            .increment_with_expiry(&key, 1, QUOTA_WINDOW)
            .await
            .map_err(|e| {
                warn!(identity = %identity, error = %e, "Quota counter unavailable");
                DomainError::unavailable("Quota backend unavailable")
            })?;
        let count = count.max(0) as u64;
        let limit = u64::from(limit);

        if count > limit {
            let retry_after = match self.cache.ttl(&key).await {
                Ok(Some(ttl)) if !ttl.is_zero() => ttl,
                _ => QUOTA_WINDOW,
            };
            debug!(identity = %identity, count, limit, "Quota exceeded");
            return Err(DomainError::rate_limited(
                format!("Quota of {} requests per minute exceeded", limit),
                Some(retry_after),
            ));
        }

        Ok(QuotaDecision::Allowed {
            count,
            remaining: limit - count,
        })
    }
}
