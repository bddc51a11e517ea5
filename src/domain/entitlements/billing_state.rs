//! Billing state classification.
//!
//! Maps a raw subscription status plus grace-period and period-end
//! deadlines into the canonical lifecycle state the access rules key on.
//!
//! ## Design
//!
//! `frozen` and `cancelled` are time-window states, not direct mappings:
//! the stored status alone does not decide them. A subscription frozen
//! two minutes ago is still inside its grace window and classifies as
//! `GracePeriod`; the same status string ten days later classifies as
//! `Frozen`. Likewise a cancelled subscription keeps `Canceled` access
//! until its paid period lapses, then becomes `Expired`.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

/// Canonical billing lifecycle state, derived at read time.
///
/// Never stored directly; always recomputed from the raw subscription
/// status and its deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingState {
    /// Paid and in good standing.
    Active,
    /// Payment failed, platform retrying.
    PastDue,
    /// Frozen, but still inside the grace window.
    GracePeriod,
    /// Cancelled with residual access until the period end.
    Canceled,
    /// No residual access. Covers lapsed cancellations, declines,
    /// and expired trials.
    Expired,
    /// Frozen past the grace window.
    Frozen,
    /// Awaiting first payment approval.
    Pending,
    /// In a free trial.
    Trialing,
    /// No subscription, or a status we do not recognize.
    None,
}

impl BillingState {
    /// Classifies a raw subscription status against the current clock.
    ///
    /// See [`BillingState::classify_at`] for the pure variant.
    pub fn from_subscription_status(
        status: &str,
        grace_period_ends_on: Option<Timestamp>,
        current_period_end: Option<Timestamp>,
    ) -> Self {
        Self::classify_at(
            status,
            grace_period_ends_on,
            current_period_end,
            Timestamp::now(),
        )
    }

    /// Pure classification against an explicit clock.
    ///
    /// Deterministic: the same `(status, grace_period_ends_on,
    /// current_period_end, now)` always yields the same state.
    /// Boundary comparisons are inclusive: `now == deadline` still
    /// counts as inside the window.
    pub fn classify_at(
        status: &str,
        grace_period_ends_on: Option<Timestamp>,
        current_period_end: Option<Timestamp>,
        now: Timestamp,
    ) -> Self {
        match status.trim().to_lowercase().as_str() {
            "frozen" => match grace_period_ends_on {
                Some(ends) if now <= ends => BillingState::GracePeriod,
                _ => BillingState::Frozen,
            },
            "cancelled" | "canceled" => match current_period_end {
                Some(ends) if now <= ends => BillingState::Canceled,
                _ => BillingState::Expired,
            },
            "active" => BillingState::Active,
            "pending" => BillingState::Pending,
            "trialing" | "trial_active" => BillingState::Trialing,
            "expired" | "trial_expired" | "declined" => BillingState::Expired,
            "past_due" => BillingState::PastDue,
            _ => BillingState::None,
        }
    }

    /// Parses a canonical state name, as used by access-rule config keys.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "active" => Some(BillingState::Active),
            "past_due" => Some(BillingState::PastDue),
            "grace_period" => Some(BillingState::GracePeriod),
            "canceled" | "cancelled" => Some(BillingState::Canceled),
            "expired" => Some(BillingState::Expired),
            "frozen" => Some(BillingState::Frozen),
            "pending" => Some(BillingState::Pending),
            "trialing" => Some(BillingState::Trialing),
            "none" => Some(BillingState::None),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingState::Active => "active",
            BillingState::PastDue => "past_due",
            BillingState::GracePeriod => "grace_period",
            BillingState::Canceled => "canceled",
            BillingState::Expired => "expired",
            BillingState::Frozen => "frozen",
            BillingState::Pending => "pending",
            BillingState::Trialing => "trialing",
            BillingState::None => "none",
        }
    }

    /// States whose classification can flip within minutes, warranting a
    /// short cache TTL.
    pub fn is_volatile(&self) -> bool {
        matches!(
            self,
            BillingState::GracePeriod | BillingState::PastDue | BillingState::Frozen
        )
    }

    /// All states, for exhaustive iteration in config resolution.
    pub fn all() -> [BillingState; 9] {
        [
            BillingState::Active,
            BillingState::PastDue,
            BillingState::GracePeriod,
            BillingState::Canceled,
            BillingState::Expired,
            BillingState::Frozen,
            BillingState::Pending,
            BillingState::Trialing,
            BillingState::None,
        ]
    }
}

impl std::fmt::Display for BillingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
