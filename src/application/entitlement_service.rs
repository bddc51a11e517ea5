//! Entitlement check pipeline.
//!
//! The cache-aware entry point for "can this tenant use feature X".
//! On a cache hit the decision is evaluated from the cached snapshot;
//! on a miss the subscription row is read, classified, evaluated, and
//! the snapshot cached. Two requests racing on a miss may both compute;
//! that is tolerated (at-most-twice, idempotent and cheap) rather than
//! locked against.

use std::sync::Arc;

use crate::adapters::cache::EntitlementCache;
use crate::domain::billing::Subscription;
use crate::domain::entitlements::{
    AccessDecision, AccessEvaluator, BillingState, CachedEntitlement, EntitlementContext,
    Operation, PolicyError, PolicyStore, SNAPSHOT_VERSION,
};
use crate::domain::foundation::{DomainError, TenantId, Timestamp};
use crate::ports::SubscriptionRepository;

/// Resolves entitlement checks for tenants.
pub struct EntitlementService {
    policy: Arc<PolicyStore>,
    cache: Arc<EntitlementCache>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    evaluator: AccessEvaluator,
}

impl EntitlementService {
    pub fn new(
        policy: Arc<PolicyStore>,
        cache: Arc<EntitlementCache>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        let evaluator = AccessEvaluator::new(Arc::clone(&policy));
        Self {
            policy,
            cache,
            subscriptions,
            evaluator,
        }
    }

    /// Checks whether a feature is permitted for a tenant.
    pub async fn check_feature_access(
        &self,
        tenant: &TenantId,
        feature_key: &str,
        operation: Operation,
    ) -> Result<AccessDecision, DomainError> {
        let ctx = self.resolve_context(tenant).await?;
        Ok(self.evaluator.check_feature_access(&ctx, feature_key, operation))
    }

    /// Checks a numeric usage limit for a tenant.
    pub async fn check_limit(
        &self,
        tenant: &TenantId,
        limit_key: &str,
        current_usage: i64,
    ) -> Result<AccessDecision, DomainError> {
        let ctx = self.resolve_context(tenant).await?;
        Ok(self.evaluator.check_limit(&ctx, limit_key, current_usage))
    }

    /// The tenant's current entitlement snapshot, for summary displays.
    pub async fn entitlement_summary(
        &self,
        tenant: &TenantId,
    ) -> Result<CachedEntitlement, DomainError> {
        self.resolve_snapshot(tenant).await
    }

    /// Sets an admin feature-flag override for a tenant.
    pub async fn set_feature_flag_override(
        &self,
        tenant: &TenantId,
        feature: &str,
        value: bool,
    ) {
        self.cache.set_feature_flag_override(tenant, feature, value).await;
    }

    /// Clears one override, or all when `feature` is `None`.
    pub async fn clear_feature_flag_override(&self, tenant: &TenantId, feature: Option<&str>) {
        self.cache.clear_feature_flag_override(tenant, feature).await;
    }

    /// Reloads the policy document and flushes every cached snapshot,
    /// since plan and rule definitions may have changed.
    pub async fn reload_policy(&self) -> Result<(), PolicyError> {
        self.policy.reload()?;
        self.cache.invalidate_all("policy_reload").await;
        Ok(())
    }

    async fn resolve_context(&self, tenant: &TenantId) -> Result<EntitlementContext, DomainError> {
        let snapshot = self.resolve_snapshot(tenant).await?;
        // Overrides are read fresh each check; they bypass the snapshot
        // and have their own cache namespace and invalidation.
        let overrides = self.cache.get_feature_flags_override(tenant).await;

        let plan = snapshot
            .plan_id
            .as_deref()
            .and_then(|id| self.policy.get_plan(id));

        Ok(EntitlementContext {
            tenant_id: tenant.clone(),
            billing_state: snapshot.billing_state,
            plan,
            overrides,
            grace_period_ends_on: snapshot.grace_period_ends_on,
            current_period_end: snapshot.current_period_end,
        })
    }

    async fn resolve_snapshot(&self, tenant: &TenantId) -> Result<CachedEntitlement, DomainError> {
        if let Some(snapshot) = self.cache.get(tenant).await {
            return Ok(snapshot);
        }

        let subscription = self.subscriptions.find_by_tenant(tenant).await?;
        let snapshot = self.build_snapshot(tenant, subscription.as_ref());
        Ok(self.cache.set(tenant, snapshot).await)
    }

    /// Computes a fresh snapshot from the subscription row (or its
    /// absence) and the live policy.
    fn build_snapshot(
        &self,
        tenant: &TenantId,
        subscription: Option<&Subscription>,
    ) -> CachedEntitlement {
        let policy = self.policy.current();

        let billing_state = subscription
            .map(Subscription::billing_state)
            .unwrap_or(BillingState::None);
        let plan = subscription
            .and_then(|s| s.plan_id.as_deref())
            .and_then(|id| policy.get_plan(id));
        let rule = policy.get_access_rule(billing_state);

        let enabled_features: Vec<String> = plan
            .as_ref()
            .map(|p| p.enabled_features().into_iter().collect())
            .unwrap_or_default();

        let mut restricted_features: Vec<String> = rule
            .restrictions
            .iter()
            .cloned()
            .chain(
                rule.access_level
                    .restricted_features()
                    .iter()
                    .map(|s| s.to_string()),
            )
            .collect();
        restricted_features.sort();
        restricted_features.dedup();

        CachedEntitlement {
            tenant_id: tenant.as_str().to_string(),
            plan_id: plan.as_ref().map(|p| p.id.clone()),
            plan_name: plan.as_ref().map(|p| p.name.clone()),
            billing_state,
            access_level: rule.access_level,
            enabled_features,
            restricted_features,
            limits: plan.as_ref().map(|p| p.limits.clone()).unwrap_or_default(),
            warnings: rule.warnings.clone(),
            grace_period_ends_on: subscription.and_then(|s| s.grace_period_ends_on),
            current_period_end: subscription.and_then(|s| s.current_period_end),
            cached_at: Timestamp::now(),
            version: SNAPSHOT_VERSION,
        }
    }
}
