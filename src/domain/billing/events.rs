//! Subscription transition audit records.
//!
//! Every status change is recorded, including transitions the advisory
//! table considers illegal (the platform is the source of truth, so
//! they are applied anyway). Invalid transitions are a first-class
//! queryable signal, not just a log line.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{TenantId, Timestamp};

/// Where a transition originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    /// Applied from a platform webhook.
    Webhook,
    /// Applied by internal billing logic.
    Internal,
}

impl TransitionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionSource::Webhook => "webhook",
            TransitionSource::Internal => "internal",
        }
    }
}

/// One applied subscription status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionTransition {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub old_status: String,
    pub new_status: String,
    /// Whether the advisory transition table permits this change.
    pub valid: bool,
    pub source: TransitionSource,
    /// Webhook event that caused the change, when applicable.
    pub event_id: Option<String>,
    pub occurred_at: Timestamp,
}

impl SubscriptionTransition {
    pub fn new(
        tenant_id: TenantId,
        old_status: impl Into<String>,
        new_status: impl Into<String>,
        valid: bool,
        source: TransitionSource,
        event_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            old_status: old_status.into(),
            new_status: new_status.into(),
            valid,
            source,
            event_id,
            occurred_at: Timestamp::now(),
        }
    }
}
