//! Billing webhook event payloads.
//!
//! Wraps a verified delivery from the billing platform: the transport
//! metadata (event ID, topic, shop domain) plus the parsed subscription
//! payload. Signature verification happens before parsing; see
//! [`super::WebhookVerifier`].

use serde::Deserialize;

use super::errors::WebhookError;
use crate::domain::foundation::Timestamp;

/// Webhook topic for subscription lifecycle updates.
pub const TOPIC_SUBSCRIPTION_UPDATE: &str = "app_subscriptions/update";

/// A verified, parsed billing webhook delivery.
#[derive(Debug, Clone)]
pub struct BillingWebhookEvent {
    /// Platform-issued delivery identifier; the idempotency key.
    pub event_id: String,
    pub topic: String,
    pub shop_domain: String,
    pub subscription: AppSubscriptionPayload,
}

impl BillingWebhookEvent {
    /// Parses a webhook body into an event.
    ///
    /// The transport metadata comes from headers and is supplied by the
    /// HTTP layer after signature verification.
    pub fn parse(
        event_id: impl Into<String>,
        topic: impl Into<String>,
        shop_domain: impl Into<String>,
        body: &[u8],
    ) -> Result<Self, WebhookError> {
        let envelope: WebhookEnvelope = serde_json::from_slice(body)
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;
        Ok(Self {
            event_id: event_id.into(),
            topic: topic.into(),
            shop_domain: shop_domain.into(),
            subscription: envelope.app_subscription,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    app_subscription: AppSubscriptionPayload,
}

/// The subscription object carried by the webhook body.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSubscriptionPayload {
    #[serde(default)]
    pub admin_graphql_api_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Platform status vocabulary, typically uppercase.
    pub status: String,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

/// Maps the platform's status vocabulary to the internal lowercase
/// form. Unknown vocabulary passes through lowercased; the platform is
/// the source of truth and new statuses must not be dropped.
pub fn map_platform_status(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase();
    match normalized.as_str() {
        "active" | "pending" | "frozen" | "declined" | "expired" => normalized,
        "cancelled" | "canceled" => "cancelled".to_string(),
        other => {
            tracing::debug!(status = other, "unmapped platform subscription status");
            other.to_string()
        }
    }
}
