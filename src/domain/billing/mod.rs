//! Billing domain: subscriptions, webhook events, and transition audit.

mod errors;
mod events;
mod subscription;
mod webhook_event;
mod webhook_verifier;

pub use errors::WebhookError;
pub use events::{SubscriptionTransition, TransitionSource};
pub use subscription::{Subscription, SubscriptionStatus};
pub use webhook_event::{
    map_platform_status, AppSubscriptionPayload, BillingWebhookEvent, TOPIC_SUBSCRIPTION_UPDATE,
};
pub use webhook_verifier::WebhookVerifier;
