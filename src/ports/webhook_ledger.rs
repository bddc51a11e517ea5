//! Webhook idempotency ledger port.
//!
//! Every processed delivery is recorded by its platform-issued event
//! identifier; redeliveries short-circuit to a no-op. The ledger must
//! be durable so idempotency holds across process restarts.
//!
//! ## Race handling
//!
//! Two simultaneous deliveries of the same event both pass the initial
//! lookup; the first `save` wins (primary-key constraint) and the loser
//! sees `AlreadyExists`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, Timestamp};

/// How a recorded delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerOutcome {
    /// The subscription mutation was applied.
    Applied,
    /// Acknowledged without mutation (duplicate topic, unknown tenant).
    Skipped,
    /// Processing raised an error; recorded to prevent retry storms.
    Failed,
}

impl LedgerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOutcome::Applied => "applied",
            LedgerOutcome::Skipped => "skipped",
            LedgerOutcome::Failed => "failed",
        }
    }
}

/// One processed webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    /// Platform-issued event identifier; the dedup key.
    pub event_id: String,
    pub topic: String,
    pub tenant_domain: String,
    pub outcome: LedgerOutcome,
    /// Skip reason or error text, when applicable.
    pub detail: Option<String>,
    pub processed_at: Timestamp,
}

impl WebhookEventRecord {
    pub fn applied(event_id: &str, topic: &str, tenant_domain: &str) -> Self {
        Self::new(event_id, topic, tenant_domain, LedgerOutcome::Applied, None)
    }

    pub fn skipped(event_id: &str, topic: &str, tenant_domain: &str, reason: &str) -> Self {
        Self::new(
            event_id,
            topic,
            tenant_domain,
            LedgerOutcome::Skipped,
            Some(reason.to_string()),
        )
    }

    pub fn failed(event_id: &str, topic: &str, tenant_domain: &str, error: &str) -> Self {
        Self::new(
            event_id,
            topic,
            tenant_domain,
            LedgerOutcome::Failed,
            Some(error.to_string()),
        )
    }

    fn new(
        event_id: &str,
        topic: &str,
        tenant_domain: &str,
        outcome: LedgerOutcome,
        detail: Option<String>,
    ) -> Self {
        Self {
            event_id: event_id.to_string(),
            topic: topic.to_string(),
            tenant_domain: tenant_domain.to_string(),
            outcome,
            detail,
            processed_at: Timestamp::now(),
        }
    }
}

/// Result of recording a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// This process recorded the event first.
    Inserted,
    /// Another delivery already recorded it.
    AlreadyExists,
}

/// Durable dedup ledger for webhook deliveries.
#[async_trait]
pub trait WebhookLedger: Send + Sync {
    /// Looks up a delivery by its event identifier.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Records a delivery. First writer wins.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;

    /// Deletes records older than the timestamp (retention cleanup).
    /// Returns the number deleted.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}
