//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Values are read once at startup with
//! the `STORESIGHT_` prefix; nested values use double underscores.
//!
//! # Example
//!
//! ```no_run
//! use storesight::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr());
//! ```

mod billing;
mod database;
mod error;
mod redis;
mod server;

pub use billing::BillingPlatformConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

use crate::adapters::cache::CacheSettings;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment
/// variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Redis configuration (shared cache tier; optional)
    #[serde(default)]
    pub redis: RedisConfig,

    /// Billing platform configuration (webhook secret, policy path)
    pub billing: BillingPlatformConfig,

    /// Entitlement cache tuning (TTL overrides, local capacity)
    #[serde(default)]
    pub cache: CacheSettings,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `STORESIGHT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `STORESIGHT__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `STORESIGHT__DATABASE__URL=...` -> `database.url = ...`
    /// - `STORESIGHT__CACHE__VOLATILE_TTL_SECS=30` -> `cache.volatile_ttl_secs = 30`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or
    /// values cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("STORESIGHT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.billing.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn set_minimal_env() {
        env::set_var(
            "STORESIGHT__DATABASE__URL",
            "postgresql://test@localhost/storesight",
        );
        env::set_var(
            "STORESIGHT__BILLING__WEBHOOK_SECRET",
            "whsec_test_secret_value",
        );
    }

    fn clear_env() {
        env::remove_var("STORESIGHT__DATABASE__URL");
        env::remove_var("STORESIGHT__BILLING__WEBHOOK_SECRET");
        env::remove_var("STORESIGHT__SERVER__PORT");
        env::remove_var("STORESIGHT__REDIS__URL");
        env::remove_var("STORESIGHT__CACHE__VOLATILE_TTL_SECS");
    }

    #[test]
    fn loads_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(config.database.url, "postgresql://test@localhost/storesight");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn server_defaults_apply() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(!config.is_production());
    }

    #[test]
    fn redis_absent_means_fallback_only() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(!result.unwrap().redis.is_enabled());
    }

    #[test]
    fn cache_ttls_are_env_tunable() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("STORESIGHT__CACHE__VOLATILE_TTL_SECS", "15");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.cache.volatile_ttl_secs, 15);
        assert_eq!(config.cache.stable_ttl_secs, 300);
    }
}
