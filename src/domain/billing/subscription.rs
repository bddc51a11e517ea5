//! Subscription entity and internal status state machine.
//!
//! The billing platform is the source of truth for subscription status,
//! so the stored status stays a string: vocabulary we do not model must
//! survive a round trip unchanged. The [`SubscriptionStatus`] enum
//! covers the known vocabulary and drives the advisory transition
//! table; transitions outside it are logged and applied anyway.

use serde::{Deserialize, Serialize};

use crate::domain::entitlements::BillingState;
use crate::domain::foundation::{StateMachine, TenantId, Timestamp};

/// A tenant's subscription row, owned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub tenant_id: TenantId,
    /// Platform-issued subscription identifier.
    pub platform_subscription_id: Option<String>,
    pub plan_id: Option<String>,
    /// Raw platform status, lowercase.
    pub status: String,
    pub grace_period_ends_on: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates a new pending subscription for a tenant.
    pub fn new_pending(tenant_id: TenantId, plan_id: Option<String>) -> Self {
        let now = Timestamp::now();
        Self {
            tenant_id,
            platform_subscription_id: None,
            plan_id,
            status: SubscriptionStatus::Pending.as_str().to_string(),
            grace_period_ends_on: None,
            current_period_end: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derives the billing state against the current clock.
    pub fn billing_state(&self) -> BillingState {
        BillingState::from_subscription_status(
            &self.status,
            self.grace_period_ends_on,
            self.current_period_end,
        )
    }

    /// Derives the billing state against an explicit clock.
    pub fn billing_state_at(&self, now: Timestamp) -> BillingState {
        BillingState::classify_at(
            &self.status,
            self.grace_period_ends_on,
            self.current_period_end,
            now,
        )
    }
}

/// Internal subscription status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Awaiting first payment approval.
    Pending,
    /// Paid and in good standing.
    Active,
    /// Suspended after payment failure.
    Frozen,
    /// Cancellation requested; access winds down at period end.
    Cancelled,
    /// First payment declined.
    Declined,
    /// Subscription ended.
    Expired,
}

impl SubscriptionStatus {
    /// Parses a stored status string. Unknown vocabulary yields `None`
    /// and bypasses the advisory legality check.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Some(SubscriptionStatus::Pending),
            "active" => Some(SubscriptionStatus::Active),
            "frozen" => Some(SubscriptionStatus::Frozen),
            "cancelled" | "canceled" => Some(SubscriptionStatus::Cancelled),
            "declined" => Some(SubscriptionStatus::Declined),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Frozen => "frozen",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Declined => "declined",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory transition table. The platform can and does send
/// transitions outside it; those are audited, not rejected.
impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            // From PENDING
            (Pending, Active)
                | (Pending, Declined)
                | (Pending, Expired)
            // From ACTIVE (self-loop covers plan changes)
                | (Active, Frozen)
                | (Active, Cancelled)
                | (Active, Active)
            // From FROZEN
                | (Frozen, Active)
                | (Frozen, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, Declined, Expired],
            Active => vec![Frozen, Cancelled, Active],
            Frozen => vec![Active, Cancelled],
            Cancelled | Declined | Expired => vec![],
        }
    }
}
