//! Access decision value object.
//!
//! The computed outcome of an access check. Constructed once by the
//! evaluator and never mutated afterwards; denial is an expected
//! common-path outcome, not an error.

use serde::Serialize;
use serde_json::{json, Value};

use super::{AccessLevel, BillingState, BillingWarning};
use crate::domain::foundation::Timestamp;

/// Result of a feature or limit check.
///
/// Carries enough context (current plan, required plan, billing state)
/// for the frontend to render an actionable upgrade or retry prompt
/// without further API calls.
#[derive(Debug, Clone, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub billing_state: BillingState,
    pub access_level: AccessLevel,
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    /// The feature or limit key that was checked.
    pub feature_key: String,
    /// Feature keys blocked in the current billing state.
    pub restrictions: Vec<String>,
    pub warnings: Vec<BillingWarning>,
    /// Human-readable explanation of the outcome.
    pub reason: String,
    /// Display name of the cheapest plan that would grant access.
    pub required_plan: Option<String>,
    pub upgrade_url: Option<String>,
    /// When currently-granted access will lapse (cancelled state only).
    pub expires_at: Option<Timestamp>,
}

impl AccessDecision {
    /// Serializes the decision as an HTTP 402/403 error body.
    pub fn to_error_response(&self) -> Value {
        json!({
            "error": if self.allowed { Value::Null } else { json!("entitlement_required") },
            "message": self.reason,
            "feature": self.feature_key,
            "billing_state": self.billing_state,
            "current_plan": self.plan_name,
            "required_plan": self.required_plan,
            "access_level": self.access_level,
            "warnings": self.warnings,
            "action": if self.required_plan.is_some() { json!("upgrade") } else { Value::Null },
            "upgrade_url": self.upgrade_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied_decision() -> AccessDecision {
        AccessDecision {
            allowed: false,
            billing_state: BillingState::Active,
            access_level: AccessLevel::Full,
            plan_id: Some("plan_free".to_string()),
            plan_name: Some("free".to_string()),
            feature_key: "ai_actions".to_string(),
            restrictions: vec![],
            warnings: vec![],
            reason: "Your plan does not include AI actions.".to_string(),
            required_plan: Some("Growth".to_string()),
            upgrade_url: Some("/settings/billing/plans?feature=ai_actions".to_string()),
            expires_at: None,
        }
    }

    #[test]
    fn denied_response_carries_upgrade_action() {
        let body = denied_decision().to_error_response();
        assert_eq!(body["error"], "entitlement_required");
        assert_eq!(body["action"], "upgrade");
        assert_eq!(body["required_plan"], "Growth");
        assert_eq!(body["feature"], "ai_actions");
        assert_eq!(body["current_plan"], "free");
    }

    #[test]
    fn allowed_response_has_null_error_and_action() {
        let mut decision = denied_decision();
        decision.allowed = true;
        decision.required_plan = None;
        let body = decision.to_error_response();
        assert!(body["error"].is_null());
        assert!(body["action"].is_null());
    }

    #[test]
    fn billing_state_serializes_snake_case_in_body() {
        let mut decision = denied_decision();
        decision.billing_state = BillingState::GracePeriod;
        let body = decision.to_error_response();
        assert_eq!(body["billing_state"], "grace_period");
    }
}
