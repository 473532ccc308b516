use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::api_key::{Argon2Settings, KEY_LEN};
use crate::infrastructure::cache::CacheType;
use crate::infrastructure::storage::StorageType;

/// Environment variable consulted when `auth.api_key_pepper` is not set
pub const PEPPER_ENV_VAR: &str = "EZK_API_KEY_PEPPER";

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub cache: CacheSettings,
    pub storage: StorageSettings,
    pub billing: BillingSettings,
    pub usage: UsageSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Server-side secret mixed into every key hash
    pub api_key_pepper: Option<String>,
    pub min_key_length: usize,
    pub local_cache_ttl_secs: u64,
    pub shared_cache_ttl_secs: u64,
    pub local_cache_capacity: u64,
    pub fail_safe: bool,
    pub store_timeout_ms: u64,
    pub verify_secret_on_store_read: bool,
    pub session_secret: String,
    pub session_issuer: String,
    pub session_expiration_hours: u64,
    pub argon2: Argon2Settings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    #[serde(rename = "type")]
    pub cache_type: CacheType,
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub max_capacity: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_token: Option<String>,
    pub event_name: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsageSettings {
    /// Free completions per project per month; unset disables billing
    pub free_allowance: Option<u64>,
    pub transaction_attempts: u32,
    pub analytics_queue_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key_pepper: None,
            min_key_length: KEY_LEN,
            local_cache_ttl_secs: 5,
            shared_cache_ttl_secs: 60,
            local_cache_capacity: 10_000,
            fail_safe: false,
            store_timeout_ms: 2_000,
            verify_secret_on_store_read: true,
            session_secret: "change-me-in-production".to_string(),
            session_issuer: "ezk-gateway".to_string(),
            session_expiration_hours: 24,
            argon2: Argon2Settings::default(),
        }
    }
}

impl AuthConfig {
    /// Configured pepper, falling back to `EZK_API_KEY_PEPPER`
    pub fn pepper(&self) -> Option<String> {
        self.api_key_pepper
            .clone()
            .or_else(|| std::env::var(PEPPER_ENV_VAR).ok())
            .filter(|p| !p.is_empty())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            redis_url: None,
            key_prefix: "ezk:".to_string(),
            max_capacity: 100_000,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            storage_type: StorageType::InMemory,
            database_url: None,
            max_connections: 10,
        }
    }
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_token: None,
            event_name: "otp_send".to_string(),
            timeout_secs: 5,
            max_retries: 2,
        }
    }
}

impl Default for UsageSettings {
    fn default() -> Self {
        Self {
            free_allowance: None,
            transaction_attempts: 3,
            analytics_queue_size: 1024,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.min_key_length, KEY_LEN);
        assert!(!config.auth.fail_safe);
        assert!(config.auth.verify_secret_on_store_read);
        assert_eq!(config.auth.store_timeout(), Duration::from_secs(2));
        assert_eq!(config.cache.cache_type, CacheType::InMemory);
        assert!(!config.billing.enabled);
        assert_eq!(config.usage.transaction_attempts, 3);
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "auth": { "fail_safe": true, "api_key_pepper": "p" },
            "cache": { "type": "redis", "redis_url": "redis://cache:6379" },
            "storage": { "type": "postgres", "database_url": "postgres://db/ezk" },
            "usage": { "free_allowance": 100 }
        }))
        .unwrap();

        assert!(config.auth.fail_safe);
        assert_eq!(config.auth.pepper().as_deref(), Some("p"));
        assert_eq!(config.auth.local_cache_ttl_secs, 5);
        assert_eq!(config.cache.cache_type, CacheType::Redis);
        assert_eq!(config.storage.storage_type, StorageType::Postgres);
        assert_eq!(config.usage.free_allowance, Some(100));
        assert_eq!(config.logging.level, "info");
    }
}
