//! Application layer: use-case services coordinating domain and ports.

mod entitlement_service;
mod webhook_service;

pub use entitlement_service::EntitlementService;
pub use webhook_service::{BillingWebhookService, SkipReason, WebhookOutcome};
