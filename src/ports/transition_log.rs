//! Transition audit log port.
//!
//! Records every applied subscription status change. Transitions the
//! advisory table considers illegal are applied anyway (the platform is
//! the source of truth), so this log is how operators find them.

use async_trait::async_trait;

use crate::domain::billing::SubscriptionTransition;
use crate::domain::foundation::{DomainError, TenantId, Timestamp};

/// Queryable audit trail of subscription transitions.
#[async_trait]
pub trait TransitionLog: Send + Sync {
    /// Appends a transition record.
    async fn record(&self, transition: &SubscriptionTransition) -> Result<(), DomainError>;

    /// Transitions for one tenant, newest first.
    async fn find_by_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<SubscriptionTransition>, DomainError>;

    /// Illegal-but-applied transitions since a timestamp, newest first.
    async fn find_invalid_since(
        &self,
        since: Timestamp,
    ) -> Result<Vec<SubscriptionTransition>, DomainError>;

    /// Deletes records older than the timestamp (retention cleanup).
    /// Returns the number deleted.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}
