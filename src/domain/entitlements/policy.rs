//! Policy document schema.
//!
//! The policy document (`config/plans.json`) carries plan definitions,
//! global billing configuration, payment retry rules, per-state access
//! rules, and feature descriptions. Structural problems (missing
//! required fields, malformed JSON) fail the load; unknown *values*
//! (state names, access levels, warning codes) degrade with a warning,
//! because a config typo must never take down the request path.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use super::{AccessLevel, BillingState, PlanEntitlements};
use crate::domain::foundation::Timestamp;

/// Top-level shape of the policy document.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDocument {
    pub plans: Vec<PlanEntitlements>,
    pub billing_config: BillingConfig,
    pub billing_rules: BillingRules,
    pub access_rules: HashMap<String, RawAccessRule>,
    #[serde(default)]
    pub feature_descriptions: HashMap<String, String>,
}

/// Global billing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u32,
    /// Days before a deadline at which warnings start surfacing.
    #[serde(default = "default_warning_lead_days")]
    pub warning_lead_days: u32,
    #[serde(default)]
    pub prorate_upgrades: bool,
    #[serde(default)]
    pub prorate_downgrades: bool,
    /// Base path the UI links to for plan upgrades.
    #[serde(default = "default_upgrade_url")]
    pub upgrade_url: String,
}

fn default_warning_lead_days() -> u32 {
    7
}

fn default_grace_period_days() -> u32 {
    3
}

fn default_upgrade_url() -> String {
    "/settings/billing/plans".to_string()
}

/// Payment retry policy.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingRules {
    pub retry_strategy: RetryStrategy,
    pub max_retries: u32,
    /// Hours between retry attempts, one entry per attempt.
    pub retry_interval_hours: Vec<u32>,
    /// Overrides `BillingConfig::grace_period_days` when present.
    #[serde(default)]
    pub grace_period_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    Exponential,
    Fixed,
}

/// Access rule exactly as written in the document, before state and
/// level names are resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAccessRule {
    pub access_level: String,
    #[serde(default)]
    pub restrictions: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub access_expires_at: Option<Timestamp>,
}

/// Resolved per-billing-state access policy.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRuleConfig {
    pub access_level: AccessLevel,
    /// Feature keys blocked while in this state.
    pub restrictions: HashSet<String>,
    /// Warning codes surfaced to the tenant, in order.
    pub warnings: Vec<String>,
    pub duration_days: Option<u32>,
    pub access_expires_at: Option<Timestamp>,
}

impl AccessRuleConfig {
    /// Resolves a raw rule, degrading unknown level names to `Limited`.
    pub fn from_raw(raw: &RawAccessRule) -> Self {
        Self {
            access_level: AccessLevel::parse_lenient(&raw.access_level),
            restrictions: raw.restrictions.iter().cloned().collect(),
            warnings: raw.warnings.clone(),
            duration_days: raw.duration_days,
            access_expires_at: raw.access_expires_at,
        }
    }

    /// Fallback rule for a state the document does not cover.
    ///
    /// Healthy states keep full access; anything else degrades to
    /// `Limited` so a missing rule fails closed-ish without locking
    /// paying tenants out entirely.
    pub fn default_for(state: BillingState) -> Self {
        let access_level = match state {
            BillingState::Active | BillingState::Trialing => AccessLevel::Full,
            _ => AccessLevel::Limited,
        };
        Self {
            access_level,
            restrictions: HashSet::new(),
            warnings: Vec::new(),
            duration_days: None,
            access_expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_rule_resolves_level_and_restrictions() {
        let raw: RawAccessRule = serde_json::from_str(
            r#"{
                "access_level": "read_only_analytics",
                "restrictions": ["airbyte_sync"],
                "warnings": ["payment_failed", "grace_period_ending"],
                "duration_days": 3
            }"#,
        )
        .unwrap();
        let rule = AccessRuleConfig::from_raw(&raw);

        assert_eq!(rule.access_level, AccessLevel::ReadOnlyAnalytics);
        assert!(rule.restrictions.contains("airbyte_sync"));
        assert_eq!(rule.warnings, vec!["payment_failed", "grace_period_ending"]);
        assert_eq!(rule.duration_days, Some(3));
    }

    #[test]
    fn unknown_level_degrades_to_limited() {
        let raw: RawAccessRule =
            serde_json::from_str(r#"{ "access_level": "mostly_fine" }"#).unwrap();
        assert_eq!(AccessRuleConfig::from_raw(&raw).access_level, AccessLevel::Limited);
    }

    #[test]
    fn default_rule_keeps_healthy_states_full() {
        assert_eq!(
            AccessRuleConfig::default_for(BillingState::Active).access_level,
            AccessLevel::Full
        );
        assert_eq!(
            AccessRuleConfig::default_for(BillingState::Trialing).access_level,
            AccessLevel::Full
        );
        assert_eq!(
            AccessRuleConfig::default_for(BillingState::Frozen).access_level,
            AccessLevel::Limited
        );
    }

    #[test]
    fn billing_rules_deserialize() {
        let rules: BillingRules = serde_json::from_str(
            r#"{
                "retry_strategy": "exponential",
                "max_retries": 3,
                "retry_interval_hours": [24, 48, 72]
            }"#,
        )
        .unwrap();
        assert_eq!(rules.retry_strategy, RetryStrategy::Exponential);
        assert_eq!(rules.retry_interval_hours.len(), 3);
        assert_eq!(rules.grace_period_days, None);
    }

    #[test]
    fn billing_config_defaults() {
        let config: BillingConfig =
            serde_json::from_str(r#"{ "grace_period_days": 3 }"#).unwrap();
        assert_eq!(config.warning_lead_days, 7);
        assert_eq!(config.upgrade_url, "/settings/billing/plans");
        assert!(!config.prorate_upgrades);
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let result: Result<BillingRules, _> =
            serde_json::from_str(r#"{ "retry_strategy": "fixed" }"#);
        assert!(result.is_err());
    }
}
