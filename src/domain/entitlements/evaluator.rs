//! Access rules evaluation.
//!
//! Answers "is feature X permitted for this tenant right now, and at
//! what access level". Evaluation short-circuits in a fixed precedence
//! order; earlier checks always win over later ones:
//!
//! 1. Admin feature-flag override (bypasses everything)
//! 2. Billing-state restriction set
//! 3. Access-level restriction table
//! 4. Write-operation gate
//! 5. Plan entitlement (with upsell computation)
//!
//! Denial is a normal outcome returned as an [`AccessDecision`], never
//! an error.

use std::collections::HashMap;
use std::sync::Arc;

use super::store::PolicyStore;
use super::{
    resolve_warnings, AccessDecision, AccessLevel, BillingState, BillingWarning,
    PlanEntitlements,
};
use crate::domain::foundation::{TenantId, Timestamp};

/// The kind of operation being attempted on a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    #[default]
    Read,
    Write,
}

impl Operation {
    /// Parses an operation name, defaulting to read.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("write") => Operation::Write,
            _ => Operation::Read,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Write => "write",
        }
    }
}

/// Everything the evaluator needs to know about a tenant for one check.
///
/// Assembled by the entitlement service from the cached snapshot or a
/// fresh subscription read.
#[derive(Debug, Clone)]
pub struct EntitlementContext {
    pub tenant_id: TenantId,
    pub billing_state: BillingState,
    pub plan: Option<Arc<PlanEntitlements>>,
    /// Admin-set per-feature overrides; the emergency escape hatch.
    pub overrides: HashMap<String, bool>,
    pub grace_period_ends_on: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
}

/// Evaluates feature and limit access against the live policy.
#[derive(Clone)]
pub struct AccessEvaluator {
    policy: Arc<PolicyStore>,
}

impl AccessEvaluator {
    pub fn new(policy: Arc<PolicyStore>) -> Self {
        Self { policy }
    }

    /// Checks whether a feature is permitted for the given context.
    pub fn check_feature_access(
        &self,
        ctx: &EntitlementContext,
        feature_key: &str,
        operation: Operation,
    ) -> AccessDecision {
        let snapshot = self.policy.current();
        let rule = snapshot.get_access_rule(ctx.billing_state);
        let level = rule.access_level;

        let mut restrictions: Vec<String> = rule.restrictions.iter().cloned().collect();
        restrictions.sort();
        let warnings = resolve_warnings(&rule.warnings);

        let base = DecisionParts {
            ctx,
            feature_key,
            level,
            restrictions,
            warnings,
        };

        // 1. Emergency override wins outright, in either direction.
        if let Some(&value) = ctx.overrides.get(feature_key) {
            let reason = if value {
                format!("Feature '{}' enabled by admin override.", feature_key)
            } else {
                format!("Feature '{}' disabled by admin override.", feature_key)
            };
            return if value {
                base.allow(reason, None)
            } else {
                base.deny(reason, None, None)
            };
        }

        // 2. Billing-state restriction set.
        if rule.restrictions.contains(feature_key) {
            return base.deny(
                format!(
                    "'{}' is not available while your subscription is {}.",
                    feature_key, ctx.billing_state
                ),
                None,
                None,
            );
        }

        // 3. Access-level restriction table.
        if level.restricts_feature(feature_key) {
            return base.deny(
                format!(
                    "'{}' is not available at the {} access level.",
                    feature_key, level
                ),
                None,
                None,
            );
        }

        // 4. Write gate, regardless of feature-specific rules.
        if operation == Operation::Write && !level.allows_writes() {
            return base.deny(
                format!(
                    "Write operations are not permitted at the {} access level.",
                    level
                ),
                None,
                None,
            );
        }

        // 5. Plan entitlement, with upsell target on denial.
        let plan_grants = ctx
            .plan
            .as_ref()
            .map(|p| p.has_feature(feature_key))
            .unwrap_or(false);
        if !plan_grants {
            let required = snapshot.cheapest_plan_with_feature(feature_key);
            let upgrade_url = Some(format!(
                "{}?feature={}",
                snapshot.billing_config().upgrade_url,
                feature_key
            ));
            let reason = match (&ctx.plan, &required) {
                (Some(plan), Some(required)) => format!(
                    "The {} plan does not include '{}'. Upgrade to {} to use it.",
                    plan.display_name, feature_key, required.display_name
                ),
                (Some(plan), None) => format!(
                    "The {} plan does not include '{}'.",
                    plan.display_name, feature_key
                ),
                (None, _) => format!("No plan on record includes '{}'.", feature_key),
            };
            return base.deny(reason, required, upgrade_url);
        }

        // Allowed. Cancelled subscriptions keep access until period end;
        // surface the lapse date so the UI can show it.
        let expires_at = if ctx.billing_state == BillingState::Canceled {
            ctx.current_period_end
        } else {
            None
        };
        base.allow(format!("'{}' is available on your plan.", feature_key), expires_at)
    }

    /// Checks a numeric usage limit.
    ///
    /// Missing plans and missing/`-1` limits allow: limits are a
    /// fallback enforced elsewhere, and an absent cap is not a failure.
    pub fn check_limit(
        &self,
        ctx: &EntitlementContext,
        limit_key: &str,
        current_usage: i64,
    ) -> AccessDecision {
        let snapshot = self.policy.current();
        let rule = snapshot.get_access_rule(ctx.billing_state);

        let mut restrictions: Vec<String> = rule.restrictions.iter().cloned().collect();
        restrictions.sort();
        let warnings = resolve_warnings(&rule.warnings);

        let base = DecisionParts {
            ctx,
            feature_key: limit_key,
            level: rule.access_level,
            restrictions,
            warnings,
        };

        let plan = match &ctx.plan {
            Some(plan) => plan,
            None => {
                return base.allow(
                    format!("No plan on record; '{}' is not limited here.", limit_key),
                    None,
                )
            }
        };

        match plan.limit(limit_key) {
            None | Some(-1) => base.allow(
                format!("'{}' is unlimited on the {} plan.", limit_key, plan.display_name),
                None,
            ),
            Some(limit) if current_usage >= limit => {
                let required =
                    snapshot.cheapest_plan_for_limit(limit_key, current_usage, plan.tier);
                let upgrade_url = Some(format!(
                    "{}?limit={}",
                    snapshot.billing_config().upgrade_url,
                    limit_key
                ));
                base.deny(
                    format!(
                        "You've reached the '{}' limit of {} on the {} plan (current usage: {}).",
                        limit_key, limit, plan.display_name, current_usage
                    ),
                    required,
                    upgrade_url,
                )
            }
            Some(_) => base.allow(
                format!("'{}' is within the {} plan limit.", limit_key, plan.display_name),
                None,
            ),
        }
    }

    /// Warnings configured for a billing state, resolved to messages.
    pub fn warnings_for(&self, state: BillingState) -> Vec<BillingWarning> {
        let rule = self.policy.current().get_access_rule(state);
        resolve_warnings(&rule.warnings)
    }

    /// Whether the state is the grace-period sub-state of frozen.
    pub fn is_in_grace_period(state: BillingState) -> bool {
        state == BillingState::GracePeriod
    }

    /// Whole days of grace remaining, clamped at zero.
    pub fn grace_period_days_remaining(grace_period_ends_on: Option<Timestamp>) -> i64 {
        grace_period_ends_on
            .map(|ends| Timestamp::now().days_until(&ends))
            .unwrap_or(0)
    }
}

/// Shared fields for building one check's decision.
struct DecisionParts<'a> {
    ctx: &'a EntitlementContext,
    feature_key: &'a str,
    level: AccessLevel,
    restrictions: Vec<String>,
    warnings: Vec<BillingWarning>,
}

impl DecisionParts<'_> {
    fn allow(self, reason: String, expires_at: Option<Timestamp>) -> AccessDecision {
        self.finish(true, reason, None, None, expires_at)
    }

    fn deny(
        self,
        reason: String,
        required_plan: Option<Arc<PlanEntitlements>>,
        upgrade_url: Option<String>,
    ) -> AccessDecision {
        self.finish(false, reason, required_plan, upgrade_url, None)
    }

    fn finish(
        self,
        allowed: bool,
        reason: String,
        required_plan: Option<Arc<PlanEntitlements>>,
        upgrade_url: Option<String>,
        expires_at: Option<Timestamp>,
    ) -> AccessDecision {
        AccessDecision {
            allowed,
            billing_state: self.ctx.billing_state,
            access_level: self.level,
            plan_id: self.ctx.plan.as_ref().map(|p| p.id.clone()),
            plan_name: self.ctx.plan.as_ref().map(|p| p.name.clone()),
            feature_key: self.feature_key.to_string(),
            restrictions: self.restrictions,
            warnings: self.warnings,
            reason,
            required_plan: required_plan.map(|p| p.display_name.clone()),
            upgrade_url,
            expires_at,
        }
    }
}
