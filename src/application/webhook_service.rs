//! Billing webhook processing.
//!
//! Applies subscription status transitions from platform webhooks:
//! resolve tenant, dedup by event identifier, map the platform status,
//! apply the mutation, audit it, invalidate the entitlement cache, and
//! record the delivery in the ledger.
//!
//! ## Ordering
//!
//! Cache invalidation is issued strictly after the subscription save
//! completes, so a concurrent reader cannot repopulate the cache with
//! pre-mutation data. Audit logging is best-effort and never blocks
//! the invalidation.
//!
//! ## Legality
//!
//! The transition table is advisory. The platform is the source of
//! truth, so illegal transitions are recorded as invalid in the audit
//! log and applied anyway.

use std::sync::Arc;

use crate::adapters::cache::EntitlementCache;
use crate::domain::billing::{
    map_platform_status, BillingWebhookEvent, Subscription, SubscriptionStatus,
    SubscriptionTransition, TransitionSource, TOPIC_SUBSCRIPTION_UPDATE,
};
use crate::domain::entitlements::PolicyStore;
use crate::domain::foundation::{DomainError, StateMachine, TenantId, Timestamp};
use crate::ports::{
    SaveResult, SubscriptionRepository, TransitionLog, WebhookEventRecord, WebhookLedger,
};

/// Why a delivery was acknowledged without applying a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Event identifier already in the ledger.
    Duplicate,
    /// No subscription row for the shop domain.
    UnknownTenant,
    /// Topic this handler does not process.
    UnsupportedTopic,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Duplicate => "duplicate",
            SkipReason::UnknownTenant => "unknown_tenant",
            SkipReason::UnsupportedTopic => "unsupported_topic",
        }
    }
}

/// Outcome of processing one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The status transition was applied.
    Applied {
        old_status: String,
        new_status: String,
        /// Whether the advisory transition table permits the change.
        valid_transition: bool,
    },
    /// Acknowledged without mutation.
    Skipped { reason: SkipReason },
}

/// Processes billing platform webhooks idempotently.
pub struct BillingWebhookService {
    subscriptions: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn WebhookLedger>,
    transitions: Arc<dyn TransitionLog>,
    cache: Arc<EntitlementCache>,
    policy: Arc<PolicyStore>,
}

impl BillingWebhookService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn WebhookLedger>,
        transitions: Arc<dyn TransitionLog>,
        cache: Arc<EntitlementCache>,
        policy: Arc<PolicyStore>,
    ) -> Self {
        Self {
            subscriptions,
            ledger,
            transitions,
            cache,
            policy,
        }
    }

    /// Processes one verified delivery exactly once.
    pub async fn process(&self, event: &BillingWebhookEvent) -> Result<WebhookOutcome, DomainError> {
        // 1. Idempotency: redeliveries are no-ops and do not re-trigger
        //    invalidation.
        if self.ledger.find_by_event_id(&event.event_id).await?.is_some() {
            tracing::debug!(event_id = %event.event_id, "duplicate webhook delivery, skipping");
            return Ok(WebhookOutcome::Skipped {
                reason: SkipReason::Duplicate,
            });
        }

        // 2. Topic filter. Unsupported topics are still recorded so
        //    redeliveries short-circuit.
        if event.topic != TOPIC_SUBSCRIPTION_UPDATE {
            tracing::debug!(topic = %event.topic, "unsupported webhook topic");
            self.record(
                WebhookEventRecord::skipped(
                    &event.event_id,
                    &event.topic,
                    &event.shop_domain,
                    SkipReason::UnsupportedTopic.as_str(),
                ),
            )
            .await?;
            return Ok(WebhookOutcome::Skipped {
                reason: SkipReason::UnsupportedTopic,
            });
        }

        // 3. Resolve the tenant by shop domain.
        let tenant = TenantId::new(event.shop_domain.as_str())?;
        let mut subscription = match self.subscriptions.find_by_tenant(&tenant).await? {
            Some(subscription) => subscription,
            None => {
                tracing::warn!(tenant = %tenant, event_id = %event.event_id, "webhook for unknown tenant");
                self.record(
                    WebhookEventRecord::skipped(
                        &event.event_id,
                        &event.topic,
                        &event.shop_domain,
                        SkipReason::UnknownTenant.as_str(),
                    ),
                )
                .await?;
                return Ok(WebhookOutcome::Skipped {
                    reason: SkipReason::UnknownTenant,
                });
            }
        };

        // 4. Map the platform vocabulary and check the advisory table.
        let old_status = subscription.status.clone();
        let new_status = map_platform_status(&event.subscription.status);
        let valid = match (
            SubscriptionStatus::parse(&old_status),
            SubscriptionStatus::parse(&new_status),
        ) {
            (Some(from), Some(to)) => from.can_transition_to(&to),
            // Vocabulary outside the table bypasses the legality check.
            _ => true,
        };
        if !valid {
            tracing::warn!(
                tenant = %tenant,
                old_status = %old_status,
                new_status = %new_status,
                "illegal subscription transition applied (platform is source of truth)"
            );
        }

        // 5. Apply the mutation; this must be durably saved before the
        //    cache invalidation below.
        self.apply(&mut subscription, &new_status, &event.subscription.admin_graphql_api_id);
        self.subscriptions.save(&subscription).await?;

        // 6. Audit, best-effort: a failed audit write must not skip the
        //    invalidation.
        let transition = SubscriptionTransition::new(
            tenant.clone(),
            &old_status,
            &new_status,
            valid,
            TransitionSource::Webhook,
            Some(event.event_id.clone()),
        );
        if let Err(e) = self.transitions.record(&transition).await {
            tracing::error!(error = %e, tenant = %tenant, "transition audit write failed");
        }

        // 7. Invalidate, strictly after the committed save.
        self.cache.invalidate(&tenant, "billing_status_changed").await;

        // 8. Record the delivery as processed.
        match self
            .ledger
            .save(WebhookEventRecord::applied(
                &event.event_id,
                &event.topic,
                &event.shop_domain,
            ))
            .await?
        {
            SaveResult::Inserted => {}
            SaveResult::AlreadyExists => {
                // Lost a race with a concurrent delivery of the same
                // event; both applied the same terminal status.
                tracing::warn!(event_id = %event.event_id, "concurrent duplicate webhook delivery");
            }
        }

        tracing::info!(
            tenant = %tenant,
            old_status = %old_status,
            new_status = %new_status,
            valid,
            "subscription transition applied"
        );

        Ok(WebhookOutcome::Applied {
            old_status,
            new_status,
            valid_transition: valid,
        })
    }

    /// Applies status-specific side effects to the subscription row.
    fn apply(
        &self,
        subscription: &mut Subscription,
        new_status: &str,
        platform_subscription_id: &Option<String>,
    ) {
        let now = Timestamp::now();
        match new_status {
            "frozen" => {
                // The grace window opens when the freeze lands; a later
                // redelivery must not extend it.
                if subscription.grace_period_ends_on.is_none() {
                    let days = self.policy.get_grace_period_days() as i64;
                    subscription.grace_period_ends_on = Some(now.plus_days(days));
                }
            }
            "active" => {
                subscription.grace_period_ends_on = None;
                subscription.cancelled_at = None;
            }
            "cancelled" => {
                subscription.cancelled_at = Some(now);
            }
            _ => {}
        }
        if let Some(id) = platform_subscription_id {
            subscription.platform_subscription_id = Some(id.clone());
        }
        subscription.status = new_status.to_string();
        subscription.updated_at = now;
    }

    async fn record(&self, record: WebhookEventRecord) -> Result<(), DomainError> {
        if let SaveResult::AlreadyExists = self.ledger.save(record).await? {
            tracing::debug!("ledger record already present");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::{CacheSettings, InMemoryCacheStore};
    use crate::adapters::memory::{
        InMemorySubscriptionRepository, InMemoryTransitionLog, InMemoryWebhookLedger,
    };
    use crate::domain::entitlements::{AccessLevel, BillingState, CachedEntitlement, SNAPSHOT_VERSION};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Write;

    const POLICY: &str = r#"{
        "plans": [
            { "id": "plan_growth", "name": "growth", "display_name": "Growth", "tier": 1,
              "features": { "dashboard_view": true } }
        ],
        "billing_config": { "grace_period_days": 5 },
        "billing_rules": { "retry_strategy": "exponential", "max_retries": 3,
                           "retry_interval_hours": [24, 48, 72], "grace_period_days": 3 },
        "access_rules": { "active": { "access_level": "full" } }
    }"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        service: BillingWebhookService,
        repo: Arc<InMemorySubscriptionRepository>,
        ledger: Arc<InMemoryWebhookLedger>,
        transitions: Arc<InMemoryTransitionLog>,
        cache: Arc<EntitlementCache>,
    }

    fn fixture() -> Fixture {
        let transitions = Arc::new(InMemoryTransitionLog::new());
        fixture_inner(
            Arc::clone(&transitions) as Arc<dyn TransitionLog>,
            transitions,
        )
    }

    fn fixture_with_transitions(service_log: Arc<dyn TransitionLog>) -> Fixture {
        // The fixture's own log is unused by the service in this case.
        fixture_inner(service_log, Arc::new(InMemoryTransitionLog::new()))
    }

    fn fixture_inner(
        service_log: Arc<dyn TransitionLog>,
        transitions: Arc<InMemoryTransitionLog>,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plans.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(POLICY.as_bytes()).unwrap();

        let policy = Arc::new(PolicyStore::load(Some(&path)).unwrap());
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let ledger = Arc::new(InMemoryWebhookLedger::new());
        let cache = Arc::new(EntitlementCache::local_only(
            Arc::new(InMemoryCacheStore::with_default_capacity()),
            CacheSettings::default(),
        ));

        let service = BillingWebhookService::new(
            Arc::clone(&repo) as Arc<dyn SubscriptionRepository>,
            Arc::clone(&ledger) as Arc<dyn WebhookLedger>,
            service_log,
            Arc::clone(&cache),
            policy,
        );

        Fixture {
            _dir: dir,
            service,
            repo,
            ledger,
            transitions,
            cache,
        }
    }

    fn tenant() -> TenantId {
        TenantId::new("acme.myshopify.com").unwrap()
    }

    fn event(event_id: &str, status: &str) -> BillingWebhookEvent {
        let body = format!(
            r#"{{ "app_subscription": {{ "admin_graphql_api_id": "gid://platform/AppSubscription/42", "status": "{}" }} }}"#,
            status
        );
        BillingWebhookEvent::parse(
            event_id,
            TOPIC_SUBSCRIPTION_UPDATE,
            "acme.myshopify.com",
            body.as_bytes(),
        )
        .unwrap()
    }

    async fn seed(repo: &InMemorySubscriptionRepository, status: &str) {
        let mut subscription =
            Subscription::new_pending(tenant(), Some("plan_growth".to_string()));
        subscription.status = status.to_string();
        repo.insert(subscription).await;
    }

    fn cached_snapshot() -> CachedEntitlement {
        CachedEntitlement {
            tenant_id: "acme.myshopify.com".to_string(),
            plan_id: Some("plan_growth".to_string()),
            plan_name: Some("growth".to_string()),
            billing_state: BillingState::Active,
            access_level: AccessLevel::Full,
            enabled_features: vec![],
            restricted_features: vec![],
            limits: HashMap::new(),
            warnings: vec![],
            grace_period_ends_on: None,
            current_period_end: None,
            cached_at: Timestamp::now(),
            version: SNAPSHOT_VERSION,
        }
    }

    #[tokio::test]
    async fn applies_activation_and_invalidates_cache() {
        let f = fixture();
        seed(&f.repo, "pending").await;
        f.cache.set(&tenant(), cached_snapshot()).await;

        let outcome = f.service.process(&event("evt_1", "ACTIVE")).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                old_status: "pending".to_string(),
                new_status: "active".to_string(),
                valid_transition: true,
            }
        );
        let subscription = f.repo.find_by_tenant(&tenant()).await.unwrap().unwrap();
        assert_eq!(subscription.status, "active");
        assert_eq!(
            subscription.platform_subscription_id.as_deref(),
            Some("gid://platform/AppSubscription/42")
        );
        // Invalidation fired strictly after the save.
        assert!(f.cache.get(&tenant()).await.is_none());
        // Delivery recorded in the ledger.
        assert!(f.ledger.find_by_event_id("evt_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_delivery_is_a_no_op() {
        let f = fixture();
        seed(&f.repo, "pending").await;

        f.service.process(&event("evt_dup", "ACTIVE")).await.unwrap();

        // Re-populate the cache, then redeliver the same event.
        f.cache.set(&tenant(), cached_snapshot()).await;
        let second = f.service.process(&event("evt_dup", "CANCELLED")).await.unwrap();

        assert_eq!(
            second,
            WebhookOutcome::Skipped {
                reason: SkipReason::Duplicate
            }
        );
        // Status unchanged by the duplicate.
        let subscription = f.repo.find_by_tenant(&tenant()).await.unwrap().unwrap();
        assert_eq!(subscription.status, "active");
        // Invalidation was NOT re-triggered.
        assert!(f.cache.get(&tenant()).await.is_some());
    }

    #[tokio::test]
    async fn illegal_transition_is_applied_and_audited_as_invalid() {
        let f = fixture();
        seed(&f.repo, "expired").await;

        let outcome = f.service.process(&event("evt_2", "ACTIVE")).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Applied {
                old_status: "expired".to_string(),
                new_status: "active".to_string(),
                valid_transition: false,
            }
        );
        // Applied anyway.
        let subscription = f.repo.find_by_tenant(&tenant()).await.unwrap().unwrap();
        assert_eq!(subscription.status, "active");
        // Queryable in the audit log.
        let invalid = f
            .transitions
            .find_invalid_since(Timestamp::now().minus_days(1))
            .await
            .unwrap();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].event_id.as_deref(), Some("evt_2"));
    }

    #[tokio::test]
    async fn freeze_opens_grace_window_from_policy() {
        let f = fixture();
        seed(&f.repo, "active").await;

        f.service.process(&event("evt_3", "FROZEN")).await.unwrap();

        let subscription = f.repo.find_by_tenant(&tenant()).await.unwrap().unwrap();
        let ends = subscription.grace_period_ends_on.unwrap();
        // billing_rules wins: 3 days, not billing_config's 5.
        let days = Timestamp::now().days_until(&ends);
        assert!((2..=3).contains(&days), "grace window was {} days", days);
        assert_eq!(subscription.billing_state(), BillingState::GracePeriod);
    }

    #[tokio::test]
    async fn redelivered_freeze_does_not_extend_grace_window() {
        let f = fixture();
        let mut subscription =
            Subscription::new_pending(tenant(), Some("plan_growth".to_string()));
        subscription.status = "frozen".to_string();
        let original_deadline = Timestamp::now().plus_days(1);
        subscription.grace_period_ends_on = Some(original_deadline);
        f.repo.insert(subscription).await;

        f.service.process(&event("evt_4", "FROZEN")).await.unwrap();

        let subscription = f.repo.find_by_tenant(&tenant()).await.unwrap().unwrap();
        assert_eq!(subscription.grace_period_ends_on, Some(original_deadline));
    }

    #[tokio::test]
    async fn reactivation_clears_grace_and_cancellation() {
        let f = fixture();
        let mut subscription =
            Subscription::new_pending(tenant(), Some("plan_growth".to_string()));
        subscription.status = "frozen".to_string();
        subscription.grace_period_ends_on = Some(Timestamp::now().plus_days(1));
        subscription.cancelled_at = Some(Timestamp::now().minus_days(1));
        f.repo.insert(subscription).await;

        f.service.process(&event("evt_5", "ACTIVE")).await.unwrap();

        let subscription = f.repo.find_by_tenant(&tenant()).await.unwrap().unwrap();
        assert!(subscription.grace_period_ends_on.is_none());
        assert!(subscription.cancelled_at.is_none());
        assert_eq!(subscription.status, "active");
    }

    #[tokio::test]
    async fn cancellation_stamps_cancelled_at() {
        let f = fixture();
        seed(&f.repo, "active").await;

        f.service.process(&event("evt_6", "CANCELLED")).await.unwrap();

        let subscription = f.repo.find_by_tenant(&tenant()).await.unwrap().unwrap();
        assert_eq!(subscription.status, "cancelled");
        assert!(subscription.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn unknown_tenant_is_skipped_and_recorded() {
        let f = fixture();
        // No subscription seeded.

        let outcome = f.service.process(&event("evt_7", "ACTIVE")).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Skipped {
                reason: SkipReason::UnknownTenant
            }
        );
        // Recorded, so a redelivery short-circuits as duplicate.
        let second = f.service.process(&event("evt_7", "ACTIVE")).await.unwrap();
        assert_eq!(
            second,
            WebhookOutcome::Skipped {
                reason: SkipReason::Duplicate
            }
        );
    }

    #[tokio::test]
    async fn unsupported_topic_is_skipped_and_recorded() {
        let f = fixture();
        seed(&f.repo, "active").await;
        let mut unsupported = event("evt_8", "ACTIVE");
        unsupported.topic = "app/uninstalled".to_string();

        let outcome = f.service.process(&unsupported).await.unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Skipped {
                reason: SkipReason::UnsupportedTopic
            }
        );
        assert!(f.ledger.find_by_event_id("evt_8").await.unwrap().is_some());
    }

    /// Audit log whose writes always fail.
    struct FailingTransitionLog;

    #[async_trait]
    impl TransitionLog for FailingTransitionLog {
        async fn record(&self, _t: &SubscriptionTransition) -> Result<(), DomainError> {
            Err(DomainError::database("audit table unavailable"))
        }
        async fn find_by_tenant(
            &self,
            _tenant: &TenantId,
        ) -> Result<Vec<SubscriptionTransition>, DomainError> {
            Ok(vec![])
        }
        async fn find_invalid_since(
            &self,
            _since: Timestamp,
        ) -> Result<Vec<SubscriptionTransition>, DomainError> {
            Ok(vec![])
        }
        async fn delete_before(&self, _timestamp: Timestamp) -> Result<u64, DomainError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn failed_audit_does_not_skip_invalidation() {
        let f = fixture_with_transitions(Arc::new(FailingTransitionLog));
        seed(&f.repo, "active").await;
        f.cache.set(&tenant(), cached_snapshot()).await;

        let outcome = f.service.process(&event("evt_9", "FROZEN")).await.unwrap();

        assert!(matches!(outcome, WebhookOutcome::Applied { .. }));
        // Invalidation still happened despite the audit failure.
        assert!(f.cache.get(&tenant()).await.is_none());
    }
}
