//! Layered application configuration

mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, BillingSettings, CacheSettings, LogFormat, LoggingConfig,
    ServerConfig, StorageSettings, UsageSettings, PEPPER_ENV_VAR,
};
