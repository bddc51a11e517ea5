//! Policy store: parses the policy document and serves immutable reads
//! with atomic hot-reload.
//!
//! ## Reload invariant
//!
//! `reload()` parses into a fresh snapshot and only swaps the live
//! `Arc` on full success. A failed reload propagates its error and
//! leaves the previous snapshot untouched, so concurrent readers never
//! observe an empty or partially-built plan map. Readers take the read
//! lock only long enough to clone the `Arc`.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;

use super::policy::{AccessRuleConfig, BillingConfig, BillingRules, PolicyDocument};
use super::{BillingState, PlanEntitlements};

/// Errors raised while loading or reloading the policy document.
///
/// These are fatal at startup: the service must not serve entitlement
/// checks without a policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy document not found; searched {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read policy document: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse policy document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid policy document: {0}")]
    Invalid(String),
}

/// One fully-built, immutable view of the policy document.
#[derive(Debug)]
pub struct PolicySnapshot {
    /// Lookup map holding each plan under both its ID and its name.
    plans_by_key: HashMap<String, Arc<PlanEntitlements>>,
    /// Canonical plan list, deduplicated by ID, sorted ascending by tier.
    canonical: Vec<Arc<PlanEntitlements>>,
    billing_config: BillingConfig,
    billing_rules: BillingRules,
    access_rules: HashMap<BillingState, AccessRuleConfig>,
    feature_descriptions: HashMap<String, String>,
}

impl PolicySnapshot {
    /// Builds a snapshot from a parsed document, validating plan keys.
    pub fn build(doc: PolicyDocument) -> Result<Self, PolicyError> {
        if doc.plans.is_empty() {
            return Err(PolicyError::Invalid("no plans defined".to_string()));
        }

        let mut plans_by_key: HashMap<String, Arc<PlanEntitlements>> = HashMap::new();
        let mut canonical: Vec<Arc<PlanEntitlements>> = Vec::with_capacity(doc.plans.len());

        for plan in doc.plans {
            let plan = Arc::new(plan);
            if plans_by_key.contains_key(&plan.id) {
                return Err(PolicyError::Invalid(format!(
                    "duplicate plan key '{}'",
                    plan.id
                )));
            }
            plans_by_key.insert(plan.id.clone(), Arc::clone(&plan));
            if plan.name != plan.id {
                if plans_by_key.contains_key(&plan.name) {
                    return Err(PolicyError::Invalid(format!(
                        "duplicate plan key '{}'",
                        plan.name
                    )));
                }
                plans_by_key.insert(plan.name.clone(), Arc::clone(&plan));
            }
            canonical.push(plan);
        }
        canonical.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| a.id.cmp(&b.id)));

        let mut access_rules = HashMap::new();
        for (key, raw) in &doc.access_rules {
            match BillingState::parse(key) {
                Some(state) => {
                    access_rules.insert(state, AccessRuleConfig::from_raw(raw));
                }
                None => {
                    tracing::warn!(state = %key, "unknown billing state in access_rules, skipping");
                }
            }
        }

        Ok(Self {
            plans_by_key,
            canonical,
            billing_config: doc.billing_config,
            billing_rules: doc.billing_rules,
            access_rules,
            feature_descriptions: doc.feature_descriptions,
        })
    }

    pub fn get_plan(&self, id_or_name: &str) -> Option<Arc<PlanEntitlements>> {
        self.plans_by_key.get(id_or_name).cloned()
    }

    /// First active canonical plan with the given tier.
    pub fn get_plan_by_tier(&self, tier: u32) -> Option<Arc<PlanEntitlements>> {
        self.canonical
            .iter()
            .find(|p| p.is_active && p.tier == tier)
            .cloned()
    }

    /// All plans, deduplicated by ID, ascending by tier.
    pub fn get_all_plans(&self) -> Vec<Arc<PlanEntitlements>> {
        self.canonical.clone()
    }

    pub fn get_free_plan(&self) -> Option<Arc<PlanEntitlements>> {
        self.get_plan_by_tier(0)
    }

    /// Access rule for a billing state, falling back to a safe default
    /// when the document does not cover the state.
    pub fn get_access_rule(&self, state: BillingState) -> AccessRuleConfig {
        self.access_rules
            .get(&state)
            .cloned()
            .unwrap_or_else(|| AccessRuleConfig::default_for(state))
    }

    /// Grace window length. Billing rules win over billing config.
    pub fn get_grace_period_days(&self) -> u32 {
        self.billing_rules
            .grace_period_days
            .unwrap_or(self.billing_config.grace_period_days)
    }

    pub fn billing_config(&self) -> &BillingConfig {
        &self.billing_config
    }

    pub fn billing_rules(&self) -> &BillingRules {
        &self.billing_rules
    }

    pub fn feature_description(&self, key: &str) -> Option<&str> {
        self.feature_descriptions.get(key).map(String::as_str)
    }

    /// Compares two plans by tier. `None` if either is unknown.
    pub fn compare_plans(&self, a: &str, b: &str) -> Option<Ordering> {
        let a = self.get_plan(a)?;
        let b = self.get_plan(b)?;
        Some(a.tier.cmp(&b.tier))
    }

    pub fn is_upgrade(&self, from: &str, to: &str) -> bool {
        self.compare_plans(from, to) == Some(Ordering::Less)
    }

    pub fn is_downgrade(&self, from: &str, to: &str) -> bool {
        self.compare_plans(from, to) == Some(Ordering::Greater)
    }

    /// Feature keys enabled on `from` but not on `to`.
    pub fn get_features_lost_on_downgrade(&self, from: &str, to: &str) -> BTreeSet<String> {
        match (self.get_plan(from), self.get_plan(to)) {
            (Some(from), Some(to)) => from
                .enabled_features()
                .difference(&to.enabled_features())
                .cloned()
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    /// Cheapest active paid plan that enables the feature, for upsell.
    pub fn cheapest_plan_with_feature(&self, feature_key: &str) -> Option<Arc<PlanEntitlements>> {
        self.canonical
            .iter()
            .find(|p| p.is_active && p.tier > 0 && p.has_feature(feature_key))
            .cloned()
    }

    /// Cheapest active plan above `above_tier` whose limit for the key
    /// is unlimited or strictly greater than the current usage.
    pub fn cheapest_plan_for_limit(
        &self,
        limit_key: &str,
        current_usage: i64,
        above_tier: u32,
    ) -> Option<Arc<PlanEntitlements>> {
        self.canonical
            .iter()
            .find(|p| {
                p.is_active
                    && p.tier > above_tier
                    && (p.limit_is_unlimited(limit_key)
                        || p.limit(limit_key).is_some_and(|l| l > current_usage))
            })
            .cloned()
    }
}

/// Process-wide policy access with atomic hot-reload.
///
/// Constructed explicitly at startup and shared via `Arc`; there is no
/// global singleton. Config must load before any entitlement check can
/// be served, which the constructor ordering makes explicit.
pub struct PolicyStore {
    snapshot: RwLock<Arc<PolicySnapshot>>,
    source_path: PathBuf,
    /// Serializes reloaders so two concurrent reloads cannot interleave
    /// their parse-then-swap sequences.
    reload_lock: Mutex<()>,
}

impl PolicyStore {
    /// Loads the policy document, failing fast when it is missing or
    /// malformed.
    ///
    /// The path is resolved from the override, then `config/plans.json`,
    /// then `backend/config/plans.json`, relative to the working
    /// directory.
    pub fn load(path_override: Option<&Path>) -> Result<Self, PolicyError> {
        let source_path = Self::resolve_path(path_override)?;
        let snapshot = Self::parse_file(&source_path)?;
        tracing::info!(path = %source_path.display(), plans = snapshot.canonical.len(), "policy document loaded");
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            source_path,
            reload_lock: Mutex::new(()),
        })
    }

    fn resolve_path(path_override: Option<&Path>) -> Result<PathBuf, PolicyError> {
        let mut searched = Vec::new();
        let candidates: Vec<PathBuf> = path_override
            .map(Path::to_path_buf)
            .into_iter()
            .chain([
                PathBuf::from("config/plans.json"),
                PathBuf::from("backend/config/plans.json"),
            ])
            .collect();

        for candidate in candidates {
            if candidate.is_file() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }
        Err(PolicyError::NotFound { searched })
    }

    fn parse_file(path: &Path) -> Result<PolicySnapshot, PolicyError> {
        let raw = std::fs::read_to_string(path)?;
        let doc: PolicyDocument = serde_json::from_str(&raw)?;
        PolicySnapshot::build(doc)
    }

    /// Current snapshot. Cheap: clones an `Arc` under a read lock.
    pub fn current(&self) -> Arc<PolicySnapshot> {
        let guard = match self.snapshot.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(&guard)
    }

    /// Re-parses the document and swaps the live snapshot atomically.
    ///
    /// All-or-nothing: on any failure the previous snapshot stays live
    /// and the error propagates so operators see it.
    pub fn reload(&self) -> Result<(), PolicyError> {
        let _reloading = match self.reload_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let next = match Self::parse_file(&self.source_path) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(error = %err, "policy reload failed, previous policy retained");
                return Err(err);
            }
        };

        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(next);
        tracing::info!("policy document reloaded");
        Ok(())
    }

    // Convenience pass-throughs over the current snapshot.

    pub fn get_plan(&self, id_or_name: &str) -> Option<Arc<PlanEntitlements>> {
        self.current().get_plan(id_or_name)
    }

    pub fn get_plan_by_tier(&self, tier: u32) -> Option<Arc<PlanEntitlements>> {
        self.current().get_plan_by_tier(tier)
    }

    pub fn get_all_plans(&self) -> Vec<Arc<PlanEntitlements>> {
        self.current().get_all_plans()
    }

    pub fn get_free_plan(&self) -> Option<Arc<PlanEntitlements>> {
        self.current().get_free_plan()
    }

    pub fn get_access_rule(&self, state: BillingState) -> AccessRuleConfig {
        self.current().get_access_rule(state)
    }

    pub fn get_grace_period_days(&self) -> u32 {
        self.current().get_grace_period_days()
    }

    pub fn compare_plans(&self, a: &str, b: &str) -> Option<Ordering> {
        self.current().compare_plans(a, b)
    }

    pub fn is_upgrade(&self, from: &str, to: &str) -> bool {
        self.current().is_upgrade(from, to)
    }

    pub fn is_downgrade(&self, from: &str, to: &str) -> bool {
        self.current().is_downgrade(from, to)
    }

    pub fn get_features_lost_on_downgrade(&self, from: &str, to: &str) -> BTreeSet<String> {
        self.current().get_features_lost_on_downgrade(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_DOC: &str = r#"{
        "plans": [
            {
                "id": "plan_free", "name": "free", "display_name": "Free", "tier": 0,
                "features": { "dashboard_view": true, "ai_actions": false, "data_export": false }
            },
            {
                "id": "plan_growth", "name": "growth", "display_name": "Growth", "tier": 1,
                "features": { "dashboard_view": true, "ai_actions": "limited", "data_export": true }
            },
            {
                "id": "plan_pro", "name": "pro", "display_name": "Pro", "tier": 2,
                "features": { "dashboard_view": true, "ai_actions": true, "data_export": true }
            },
            {
                "id": "plan_legacy", "name": "legacy", "display_name": "Legacy", "tier": 1,
                "features": {}, "is_active": false
            }
        ],
        "billing_config": { "grace_period_days": 5 },
        "billing_rules": {
            "retry_strategy": "exponential",
            "max_retries": 3,
            "retry_interval_hours": [24, 48, 72],
            "grace_period_days": 3
        },
        "access_rules": {
            "active": { "access_level": "full" },
            "grace_period": { "access_level": "read_only_analytics", "warnings": ["payment_failed"] },
            "hibernating": { "access_level": "full" }
        },
        "feature_descriptions": { "ai_actions": "AI-driven analytics actions" }
    }"#;

    fn write_doc(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    fn load_sample() -> (tempfile::TempDir, PolicyStore) {
        let (dir, path) = write_doc(SAMPLE_DOC);
        let store = PolicyStore::load(Some(&path)).unwrap();
        (dir, store)
    }

    #[test]
    fn load_fails_when_document_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        let result = PolicyStore::load(Some(&missing));
        assert!(matches!(result, Err(PolicyError::NotFound { .. })));
    }

    #[test]
    fn load_fails_on_malformed_json() {
        let (_dir, path) = write_doc("{ not json");
        assert!(matches!(
            PolicyStore::load(Some(&path)),
            Err(PolicyError::Parse(_))
        ));
    }

    #[test]
    fn plans_are_indexed_by_id_and_name() {
        let (_dir, store) = load_sample();
        let by_id = store.get_plan("plan_growth").unwrap();
        let by_name = store.get_plan("growth").unwrap();
        assert!(Arc::ptr_eq(&by_id, &by_name));
    }

    #[test]
    fn get_plan_by_tier_skips_inactive_plans() {
        let (_dir, store) = load_sample();
        // plan_growth and plan_legacy share tier 1; legacy is inactive.
        let plan = store.get_plan_by_tier(1).unwrap();
        assert_eq!(plan.id, "plan_growth");
    }

    #[test]
    fn get_all_plans_is_deduped_and_tier_sorted() {
        let (_dir, store) = load_sample();
        let plans = store.get_all_plans();
        assert_eq!(plans.len(), 4);
        let tiers: Vec<u32> = plans.iter().map(|p| p.tier).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
    }

    #[test]
    fn get_free_plan_returns_tier_zero() {
        let (_dir, store) = load_sample();
        assert_eq!(store.get_free_plan().unwrap().id, "plan_free");
    }

    #[test]
    fn grace_period_prefers_billing_rules() {
        let (_dir, store) = load_sample();
        // billing_config says 5, billing_rules says 3.
        assert_eq!(store.get_grace_period_days(), 3);
    }

    #[test]
    fn access_rule_lookup_and_fallback() {
        let (_dir, store) = load_sample();
        let grace = store.get_access_rule(BillingState::GracePeriod);
        assert_eq!(
            grace.access_level,
            crate::domain::entitlements::AccessLevel::ReadOnlyAnalytics
        );
        // "frozen" has no rule in the sample; falls back to limited.
        let frozen = store.get_access_rule(BillingState::Frozen);
        assert_eq!(
            frozen.access_level,
            crate::domain::entitlements::AccessLevel::Limited
        );
    }

    #[test]
    fn unknown_access_rule_state_is_skipped() {
        // "hibernating" must not abort the load.
        let (_dir, store) = load_sample();
        assert!(store.get_plan("plan_free").is_some());
    }

    #[test]
    fn compare_plans_is_antisymmetric() {
        let (_dir, store) = load_sample();
        let ab = store.compare_plans("plan_free", "plan_growth").unwrap();
        let ba = store.compare_plans("plan_growth", "plan_free").unwrap();
        assert_eq!(ab, ba.reverse());
        assert_eq!(ab, Ordering::Less);
    }

    #[test]
    fn upgrade_and_downgrade_detection() {
        let (_dir, store) = load_sample();
        assert!(store.is_upgrade("plan_free", "plan_growth"));
        assert!(store.is_downgrade("plan_pro", "plan_free"));
        assert!(!store.is_upgrade("plan_pro", "plan_pro"));
        assert!(!store.is_upgrade("plan_pro", "missing"));
    }

    #[test]
    fn features_lost_on_downgrade() {
        let (_dir, store) = load_sample();
        let lost = store.get_features_lost_on_downgrade("plan_pro", "plan_free");
        assert!(lost.contains("ai_actions"));
        assert!(lost.contains("data_export"));
        assert!(!lost.contains("dashboard_view"));
    }

    #[test]
    fn cheapest_plan_with_feature_skips_free_tier() {
        let (_dir, store) = load_sample();
        let plan = store.current().cheapest_plan_with_feature("ai_actions").unwrap();
        // "limited" on growth still counts as enabled.
        assert_eq!(plan.id, "plan_growth");
    }

    #[test]
    fn duplicate_plan_id_is_rejected() {
        let doc = SAMPLE_DOC.replace("plan_legacy", "plan_pro");
        let (_dir, path) = write_doc(&doc);
        assert!(matches!(
            PolicyStore::load(Some(&path)),
            Err(PolicyError::Invalid(_))
        ));
    }

    #[test]
    fn reload_picks_up_changes() {
        let (_dir, path) = write_doc(SAMPLE_DOC);
        let store = PolicyStore::load(Some(&path)).unwrap();
        assert!(store.get_plan("plan_scale").is_none());

        let updated = SAMPLE_DOC.replace("plan_pro", "plan_scale");
        std::fs::write(&path, updated).unwrap();
        store.reload().unwrap();

        assert!(store.get_plan("plan_scale").is_some());
        assert!(store.get_plan("plan_pro").is_none());
    }

    #[test]
    fn failed_reload_retains_previous_snapshot() {
        let (_dir, path) = write_doc(SAMPLE_DOC);
        let store = PolicyStore::load(Some(&path)).unwrap();

        std::fs::write(&path, "{ definitely not json").unwrap();
        let result = store.reload();
        assert!(result.is_err());

        // Reads still serve the pre-reload data, fully intact.
        assert_eq!(store.get_all_plans().len(), 4);
        assert!(store.get_plan("plan_growth").is_some());
        assert!(store.get_plan("growth").is_some());
    }

    #[test]
    fn snapshot_taken_before_failed_reload_is_unaffected() {
        let (_dir, path) = write_doc(SAMPLE_DOC);
        let store = PolicyStore::load(Some(&path)).unwrap();
        let snapshot = store.current();

        std::fs::write(&path, "garbage").unwrap();
        let _ = store.reload();

        assert!(snapshot.get_plan("plan_free").is_some());
    }
}
