//! Pricing plan entitlement definitions.
//!
//! A plan describes what a tenant may do: per-feature grants (with a
//! tri-state enabled/limited/disabled flag) and numeric usage limits.
//! Plans are loaded once from the policy document and are immutable per
//! reload cycle.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Deserializer};

/// Tri-state grant for a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureGrant {
    /// Fully enabled.
    Enabled,
    /// Not available on this plan.
    Disabled,
    /// Enabled, subject to a usage cap.
    Limited,
}

/// One feature's entitlement on a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureEntitlement {
    pub grant: FeatureGrant,
    /// Usage cap for limited grants. `None` or `-1` means unlimited.
    pub limit_value: Option<i64>,
}

impl FeatureEntitlement {
    pub fn enabled() -> Self {
        Self {
            grant: FeatureGrant::Enabled,
            limit_value: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            grant: FeatureGrant::Disabled,
            limit_value: None,
        }
    }

    pub fn limited(limit_value: Option<i64>) -> Self {
        Self {
            grant: FeatureGrant::Limited,
            limit_value,
        }
    }

    /// True for both full and limited grants.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.grant, FeatureGrant::Disabled)
    }

    /// A missing or `-1` cap means no cap.
    pub fn is_unlimited(&self) -> bool {
        matches!(self.limit_value, None | Some(-1))
    }
}

/// Accepts the three document spellings of a feature grant:
/// a bare bool, the literal string `"limited"`, or an object form
/// carrying a `limit_value`.
impl<'de> Deserialize<'de> for FeatureEntitlement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawGrant {
            Flag(bool),
            Mode(String),
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawFeature {
            Simple(RawGrant),
            Detailed {
                enabled: RawGrant,
                #[serde(default)]
                limit_value: Option<i64>,
            },
        }

        fn resolve(grant: RawGrant, limit_value: Option<i64>) -> FeatureEntitlement {
            match grant {
                RawGrant::Flag(true) => FeatureEntitlement {
                    grant: FeatureGrant::Enabled,
                    limit_value,
                },
                RawGrant::Flag(false) => FeatureEntitlement::disabled(),
                RawGrant::Mode(mode) if mode.eq_ignore_ascii_case("limited") => {
                    FeatureEntitlement::limited(limit_value)
                }
                RawGrant::Mode(other) => {
                    tracing::warn!(value = %other, "unknown feature grant in config, treating as disabled");
                    FeatureEntitlement::disabled()
                }
            }
        }

        Ok(match RawFeature::deserialize(deserializer)? {
            RawFeature::Simple(grant) => resolve(grant, None),
            RawFeature::Detailed { enabled, limit_value } => resolve(enabled, limit_value),
        })
    }
}

/// Trial terms attached to a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrialConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub days: u32,
}

fn default_is_active() -> bool {
    true
}

/// One pricing plan's capabilities.
///
/// Immutable per reload cycle; looked up by ID or name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanEntitlements {
    pub id: String,
    pub name: String,
    pub display_name: String,
    /// Higher tier = more capable. Tier 0 is the free plan.
    pub tier: u32,
    #[serde(default)]
    pub features: HashMap<String, FeatureEntitlement>,
    /// Numeric usage caps. `-1` means unlimited.
    #[serde(default)]
    pub limits: HashMap<String, i64>,
    #[serde(default)]
    pub trial: TrialConfig,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

impl PlanEntitlements {
    /// Looks up one feature's entitlement.
    pub fn feature(&self, key: &str) -> Option<&FeatureEntitlement> {
        self.features.get(key)
    }

    /// Whether the plan grants the feature (fully or limited).
    pub fn has_feature(&self, key: &str) -> bool {
        self.feature(key).map(FeatureEntitlement::is_enabled).unwrap_or(false)
    }

    /// Sorted set of feature keys the plan grants.
    pub fn enabled_features(&self) -> BTreeSet<String> {
        self.features
            .iter()
            .filter(|(_, f)| f.is_enabled())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Usage cap for a limit key, if the plan defines one.
    pub fn limit(&self, key: &str) -> Option<i64> {
        self.limits.get(key).copied()
    }

    /// Whether the limit key is uncapped on this plan.
    ///
    /// Absent and `-1` both mean unlimited.
    pub fn limit_is_unlimited(&self, key: &str) -> bool {
        matches!(self.limit(key), None | Some(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_from_json(json: &str) -> PlanEntitlements {
        serde_json::from_str(json).unwrap()
    }

    fn sample_plan() -> PlanEntitlements {
        plan_from_json(
            r#"{
                "id": "plan_growth",
                "name": "growth",
                "display_name": "Growth",
                "tier": 1,
                "features": {
                    "data_export": true,
                    "ai_actions": "limited",
                    "api_access": false
                },
                "limits": { "ai_actions_per_month": 50, "data_rows": -1 }
            }"#,
        )
    }

    #[test]
    fn bool_feature_deserializes() {
        let plan = sample_plan();
        assert_eq!(plan.feature("data_export"), Some(&FeatureEntitlement::enabled()));
        assert_eq!(plan.feature("api_access"), Some(&FeatureEntitlement::disabled()));
    }

    #[test]
    fn limited_string_deserializes() {
        let plan = sample_plan();
        assert_eq!(plan.feature("ai_actions").unwrap().grant, FeatureGrant::Limited);
    }

    #[test]
    fn detailed_feature_form_carries_limit_value() {
        let plan = plan_from_json(
            r#"{
                "id": "p", "name": "p", "display_name": "P", "tier": 1,
                "features": { "ai_insights": { "enabled": "limited", "limit_value": 25 } }
            }"#,
        );
        let feature = plan.feature("ai_insights").unwrap();
        assert_eq!(feature.grant, FeatureGrant::Limited);
        assert_eq!(feature.limit_value, Some(25));
        assert!(!feature.is_unlimited());
    }

    #[test]
    fn unknown_grant_string_degrades_to_disabled() {
        let plan = plan_from_json(
            r#"{
                "id": "p", "name": "p", "display_name": "P", "tier": 0,
                "features": { "beta_thing": "sometimes" }
            }"#,
        );
        assert!(!plan.has_feature("beta_thing"));
    }

    #[test]
    fn limited_counts_as_enabled() {
        let plan = sample_plan();
        assert!(plan.has_feature("ai_actions"));
        assert!(plan.has_feature("data_export"));
        assert!(!plan.has_feature("api_access"));
    }

    #[test]
    fn missing_feature_is_not_enabled() {
        assert!(!sample_plan().has_feature("scheduled_reports"));
    }

    #[test]
    fn enabled_features_excludes_disabled() {
        let features = sample_plan().enabled_features();
        assert!(features.contains("data_export"));
        assert!(features.contains("ai_actions"));
        assert!(!features.contains("api_access"));
    }

    #[test]
    fn minus_one_limit_is_unlimited() {
        let plan = sample_plan();
        assert!(plan.limit_is_unlimited("data_rows"));
        assert!(plan.limit_is_unlimited("never_defined"));
        assert!(!plan.limit_is_unlimited("ai_actions_per_month"));
    }

    #[test]
    fn is_active_defaults_to_true() {
        assert!(sample_plan().is_active);
    }

    #[test]
    fn unlimited_feature_entitlement_forms() {
        assert!(FeatureEntitlement::enabled().is_unlimited());
        assert!(FeatureEntitlement::limited(Some(-1)).is_unlimited());
        assert!(!FeatureEntitlement::limited(Some(10)).is_unlimited());
    }
}
