//! EZK Gateway
//!
//! Credential gateway for an OTP service:
//! - Project-scoped API keys with checksums and peppered hashes
//! - Two-tier introspection cache in front of the credential store
//! - Per-plan request quotas over fixed one-minute windows
//! - Transactional usage metering with billing events past a free allowance

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use api::state::{AppState, Probes, UsagePolicy};
use config::{BillingSettings, CacheSettings, StorageSettings, PEPPER_ENV_VAR};
use domain::usage::BillingProvider;
use infrastructure::{
    api_key::{ApiKeyService, KeyHasher},
    auth::{CredentialGate, GateConfig, JwtConfig, JwtService},
    cache::{CacheConfig, CacheFactory, IntrospectionCache, IntrospectionCacheConfig},
    otp::LogOtpDispatcher,
    quota::QuotaEnforcer,
    storage::{CredentialStores, PostgresConfig, StorageConfig, StorageFactory, StorageType},
    usage::{
        AnalyticsDispatcher, HttpBillingConfig, HttpBillingProvider, MeterConfig,
        NoopBillingProvider, UsageMeter,
    },
};

/// Create the application state with every service wired from configuration
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage = StorageFactory::connect(&storage_config(&config.storage)?).await?;
    let stores = CredentialStores::from_factory(&storage).await?;
    let ledger = storage.usage_ledger().await?;

    let shared_cache = CacheFactory::new()
        .create(&cache_config(&config.cache))
        .await?;

    let auth = &config.auth;
    let hasher = match auth.pepper() {
        Some(pepper) => Some(Arc::new(KeyHasher::new(pepper, auth.argon2)?)),
        None => {
            warn!(
                env = PEPPER_ENV_VAR,
                "No API key pepper configured; API key authentication and issuance are disabled"
            );
            None
        }
    };

    let sessions = Arc::new(JwtService::new(JwtConfig {
        secret: auth.session_secret.clone(),
        issuer: auth.session_issuer.clone(),
        expiration_hours: auth.session_expiration_hours,
    }));

    let introspection = IntrospectionCache::new(
        shared_cache.clone(),
        IntrospectionCacheConfig {
            local_ttl: Duration::from_secs(auth.local_cache_ttl_secs),
            shared_ttl: Duration::from_secs(auth.shared_cache_ttl_secs),
            local_capacity: auth.local_cache_capacity,
            ..Default::default()
        },
    );

    let gate = CredentialGate::new(
        stores.clone(),
        Arc::new(introspection),
        hasher.clone(),
        sessions,
        GateConfig {
            min_key_length: auth.min_key_length,
            fail_safe: auth.fail_safe,
            store_timeout: auth.store_timeout(),
            verify_secret_on_store_read: auth.verify_secret_on_store_read,
        },
    );

    let api_key_service = ApiKeyService::new(stores.keys.clone(), stores.projects.clone(), hasher);

    let billing = billing_provider(&config.billing)?;
    let analytics = AnalyticsDispatcher::spawn(ledger.clone(), config.usage.analytics_queue_size);
    let meter = UsageMeter::new(
        ledger,
        billing,
        analytics,
        MeterConfig {
            event_name: config.billing.event_name.clone(),
            transaction_attempts: config.usage.transaction_attempts.max(1),
            billing_timeout: Duration::from_secs(
                config.billing.timeout_secs * (u64::from(config.billing.max_retries) + 1),
            ),
            ..Default::default()
        },
    );

    info!(
        fail_safe = auth.fail_safe,
        shared_cache = %config.cache.cache_type,
        free_allowance = ?config.usage.free_allowance,
        billing = config.billing.enabled,
        "Application state initialized"
    );

    Ok(AppState::new(
        Arc::new(gate),
        Arc::new(api_key_service),
        Arc::new(QuotaEnforcer::new(shared_cache.clone())),
        Arc::new(meter),
        Arc::new(LogOtpDispatcher::new()),
        stores.projects.clone(),
        UsagePolicy {
            free_allowance: config.usage.free_allowance,
        },
        Probes {
            stores,
            shared_cache,
        },
    ))
}

fn storage_config(settings: &StorageSettings) -> anyhow::Result<StorageConfig> {
    match settings.storage_type {
        StorageType::InMemory => Ok(StorageConfig::InMemory),
        StorageType::Postgres => {
            let url = settings
                .database_url
                .clone()
                .or_else(|| std::env::var("DATABASE_URL").ok())
                .context("storage.database_url or DATABASE_URL is required for postgres storage")?;

            Ok(StorageConfig::Postgres(
                PostgresConfig::new(url).with_max_connections(settings.max_connections),
            ))
        }
    }
}

fn cache_config(settings: &CacheSettings) -> CacheConfig {
    CacheConfig {
        cache_type: settings.cache_type.clone(),
        redis_url: settings.redis_url.clone(),
        key_prefix: Some(settings.key_prefix.clone()),
        max_capacity: settings.max_capacity,
    }
}

fn billing_provider(settings: &BillingSettings) -> anyhow::Result<Arc<dyn BillingProvider>> {
    if !settings.enabled {
        info!("Billing disabled; metered events are discarded");
        return Ok(Arc::new(NoopBillingProvider));
    }

    let endpoint = settings
        .endpoint
        .clone()
        .context("billing.endpoint is required when billing is enabled")?;
    let token = settings
        .api_token
        .clone()
        .context("billing.api_token is required when billing is enabled")?;

    let config = HttpBillingConfig::new(endpoint, token)
        .with_timeout(Duration::from_secs(settings.timeout_secs))
        .with_retries(settings.max_retries, Duration::from_millis(200));

    Ok(Arc::new(HttpBillingProvider::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_builds_in_memory_state() {
        let mut config = AppConfig::default();
        config.auth.api_key_pepper = Some("pepper".to_string());
        config.auth.argon2 = infrastructure::api_key::Argon2Settings::fast();

        let state = create_app_state(&config).await.unwrap();

        assert!(state.probes.stores.ping().await.is_ok());
        assert_eq!(state.usage_policy.free_allowance, None);
    }

    #[test]
    fn test_postgres_storage_requires_url() {
        let settings = StorageSettings {
            storage_type: StorageType::Postgres,
            database_url: Some("postgres://db/ezk".to_string()),
            max_connections: 4,
        };

        match storage_config(&settings).unwrap() {
            StorageConfig::Postgres(pg) => {
                assert_eq!(pg.url, "postgres://db/ezk");
                assert_eq!(pg.max_connections, 4);
            }
            StorageConfig::InMemory => panic!("expected postgres"),
        }
    }

    #[test]
    fn test_enabled_billing_requires_endpoint() {
        let settings = BillingSettings {
            enabled: true,
            ..Default::default()
        };

        assert!(billing_provider(&settings).is_err());
    }
}
