//! Billing platform configuration

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Billing platform integration configuration.
#[derive(Debug, Deserialize)]
pub struct BillingPlatformConfig {
    /// Webhook signing secret shared with the platform.
    pub webhook_secret: SecretString,

    /// Override path for the policy document. Falls back to the
    /// standard search locations when absent.
    #[serde(default)]
    pub plans_path: Option<PathBuf>,
}

impl BillingPlatformConfig {
    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.webhook_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING_WEBHOOK_SECRET"));
        }
        if secret.len() < 16 {
            return Err(ValidationError::WeakWebhookSecret);
        }
        Ok(())
    }
}

impl Clone for BillingPlatformConfig {
    fn clone(&self) -> Self {
        Self {
            webhook_secret: SecretString::new(self.webhook_secret.expose_secret().clone()),
            plans_path: self.plans_path.clone(),
        }
    }
}
