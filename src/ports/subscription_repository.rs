//! Subscription persistence port.
//!
//! The core reads and writes subscription rows through this interface;
//! it does not own the schema. Mutations must be durably committed
//! before the caller issues cache invalidation.

use async_trait::async_trait;

use crate::domain::billing::Subscription;
use crate::domain::foundation::{DomainError, TenantId};

/// Port for subscription row access.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Fetches the subscription for a tenant, if any.
    async fn find_by_tenant(&self, tenant: &TenantId) -> Result<Option<Subscription>, DomainError>;

    /// Upserts the subscription row.
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError>;
}
