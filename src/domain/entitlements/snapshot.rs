//! Cached entitlement snapshot.
//!
//! A serialized view of a tenant's resolved entitlement state, created
//! on cache-miss computation and deleted whenever the underlying
//! subscription changes. TTL-bounded even without explicit
//! invalidation; see the cache layer for the TTL policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{AccessLevel, BillingState};
use crate::domain::foundation::Timestamp;

/// Bumped whenever the snapshot layout changes; mismatched versions are
/// treated as cache misses.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One tenant's entitlement state at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntitlement {
    pub tenant_id: String,
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub billing_state: BillingState,
    pub access_level: AccessLevel,
    /// Feature keys the plan grants.
    pub enabled_features: Vec<String>,
    /// Feature keys blocked by state or access level.
    pub restricted_features: Vec<String>,
    pub limits: HashMap<String, i64>,
    /// Warning codes for the current state.
    pub warnings: Vec<String>,
    pub grace_period_ends_on: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cached_at: Timestamp,
    pub version: u32,
}

impl CachedEntitlement {
    /// Whether this snapshot was written by the current code version.
    pub fn is_current_version(&self) -> bool {
        self.version == SNAPSHOT_VERSION
    }

    /// Seconds since the snapshot was cached, clamped at zero.
    pub fn age_secs(&self, now: Timestamp) -> i64 {
        now.duration_since(&self.cached_at).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CachedEntitlement {
        CachedEntitlement {
            tenant_id: "acme.myshopify.com".to_string(),
            plan_id: Some("plan_growth".to_string()),
            plan_name: Some("growth".to_string()),
            billing_state: BillingState::Active,
            access_level: AccessLevel::Full,
            enabled_features: vec!["dashboard_view".to_string()],
            restricted_features: vec![],
            limits: HashMap::from([("ai_actions_per_month".to_string(), 50)]),
            warnings: vec![],
            grace_period_ends_on: None,
            current_period_end: None,
            cached_at: Timestamp::now(),
            version: SNAPSHOT_VERSION,
        }
    }

    #[test]
    fn round_trips_through_json() {
        let snapshot = sample();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: CachedEntitlement = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, back);
    }

    #[test]
    fn version_check() {
        let mut snapshot = sample();
        assert!(snapshot.is_current_version());
        snapshot.version = SNAPSHOT_VERSION + 1;
        assert!(!snapshot.is_current_version());
    }

    #[test]
    fn age_clamps_at_zero_for_future_timestamps() {
        let mut snapshot = sample();
        snapshot.cached_at = Timestamp::now().plus_secs(60);
        assert_eq!(snapshot.age_secs(Timestamp::now()), 0);
    }
}
