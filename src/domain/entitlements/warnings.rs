//! Billing warning catalog.
//!
//! Access rules reference warnings by code; this module resolves codes
//! to user-facing messages from a static catalog. Unknown codes degrade
//! to a generic message instead of erroring, so a config typo surfaces
//! as an odd banner, not a failed request.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Severity of a billing warning, for UI emphasis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Info,
    Warning,
    Critical,
}

/// A resolved, user-facing billing warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingWarning {
    pub code: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub action_url: Option<String>,
}

type CatalogEntry = (&'static str, WarningSeverity, Option<&'static str>);

/// Static catalog: code -> (message, severity, action URL).
static WARNING_CATALOG: Lazy<HashMap<&'static str, CatalogEntry>> = Lazy::new(|| {
    HashMap::from([
        (
            "payment_failed",
            (
                "Your last payment failed. Please update your payment method.",
                WarningSeverity::Critical,
                Some("/settings/billing"),
            ),
        ),
        (
            "payment_pending",
            (
                "Your subscription is awaiting payment approval.",
                WarningSeverity::Info,
                None,
            ),
        ),
        (
            "grace_period_ending",
            (
                "Your grace period is ending soon. Update your payment method to keep access.",
                WarningSeverity::Critical,
                Some("/settings/billing"),
            ),
        ),
        (
            "account_frozen",
            (
                "Your account is frozen due to an unresolved payment issue.",
                WarningSeverity::Critical,
                Some("/settings/billing"),
            ),
        ),
        (
            "subscription_cancelled",
            (
                "Your subscription is cancelled. Access continues until the end of the billing period.",
                WarningSeverity::Warning,
                Some("/settings/billing/plans"),
            ),
        ),
        (
            "subscription_expired",
            (
                "Your subscription has expired. Resubscribe to regain access.",
                WarningSeverity::Critical,
                Some("/settings/billing/plans"),
            ),
        ),
        (
            "trial_ending",
            (
                "Your trial is ending soon. Choose a plan to keep your data flowing.",
                WarningSeverity::Warning,
                Some("/settings/billing/plans"),
            ),
        ),
        (
            "no_subscription",
            (
                "No active subscription found for this store.",
                WarningSeverity::Warning,
                Some("/settings/billing/plans"),
            ),
        ),
        (
            "plan_downgraded",
            (
                "Your plan was downgraded. Some features are no longer available.",
                WarningSeverity::Info,
                Some("/settings/billing/plans"),
            ),
        ),
    ])
});

/// Resolves a warning code against the catalog.
pub fn resolve_warning(code: &str) -> BillingWarning {
    match WARNING_CATALOG.get(code) {
        Some((message, severity, action_url)) => BillingWarning {
            code: code.to_string(),
            message: (*message).to_string(),
            severity: *severity,
            action_url: action_url.map(str::to_string),
        },
        None => {
            tracing::debug!(code, "unknown warning code, using generic message");
            BillingWarning {
                code: code.to_string(),
                message: format!("Warning: {}", code),
                severity: WarningSeverity::Warning,
                action_url: None,
            }
        }
    }
}

/// Resolves an ordered list of codes, preserving order.
pub fn resolve_warnings(codes: &[String]) -> Vec<BillingWarning> {
    codes.iter().map(|c| resolve_warning(c)).collect()
}
