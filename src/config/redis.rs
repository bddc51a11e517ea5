//! Redis configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Redis configuration (shared cache tier and invalidation pub/sub).
///
/// The URL is optional: when absent, the shared cache tier is disabled
/// and the service runs with the in-process fallback only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL. Absence disables the shared tier.
    #[serde(default)]
    pub url: Option<String>,
}

impl RedisConfig {
    /// Whether the shared cache tier is configured.
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ValidationError::InvalidRedisUrl);
            }
        }
        Ok(())
    }
}
