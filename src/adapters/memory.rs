//! In-memory adapters for the persistence ports.
//!
//! Used by tests and single-process development setups. Not durable:
//! the webhook ledger in particular loses its dedup history on restart,
//! so production deployments must use the PostgreSQL adapters.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::billing::{Subscription, SubscriptionTransition};
use crate::domain::foundation::{DomainError, TenantId, Timestamp};
use crate::ports::{
    SaveResult, SubscriptionRepository, TransitionLog, WebhookEventRecord, WebhookLedger,
};

/// In-memory subscription repository.
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: Arc<RwLock<HashMap<TenantId, Subscription>>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a subscription row, for test setup.
    pub async fn insert(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.tenant_id.clone(), subscription);
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn find_by_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.subscriptions.read().await.get(tenant).cloned())
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        self.subscriptions
            .write()
            .await
            .insert(subscription.tenant_id.clone(), subscription.clone());
        Ok(())
    }
}

/// In-memory webhook dedup ledger.
#[derive(Default)]
pub struct InMemoryWebhookLedger {
    records: Arc<RwLock<HashMap<String, WebhookEventRecord>>>,
}

impl InMemoryWebhookLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl WebhookLedger for InMemoryWebhookLedger {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.event_id) {
            Ok(SaveResult::AlreadyExists)
        } else {
            records.insert(record.event_id.clone(), record);
            Ok(SaveResult::Inserted)
        }
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.processed_at >= timestamp);
        Ok((before - records.len()) as u64)
    }
}

/// In-memory transition audit log.
#[derive(Default)]
pub struct InMemoryTransitionLog {
    transitions: Arc<RwLock<Vec<SubscriptionTransition>>>,
}

impl InMemoryTransitionLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransitionLog for InMemoryTransitionLog {
    async fn record(&self, transition: &SubscriptionTransition) -> Result<(), DomainError> {
        self.transitions.write().await.push(transition.clone());
        Ok(())
    }

    async fn find_by_tenant(
        &self,
        tenant: &TenantId,
    ) -> Result<Vec<SubscriptionTransition>, DomainError> {
        let mut matching: Vec<SubscriptionTransition> = self
            .transitions
            .read()
            .await
            .iter()
            .filter(|t| &t.tenant_id == tenant)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(matching)
    }

    async fn find_invalid_since(
        &self,
        since: Timestamp,
    ) -> Result<Vec<SubscriptionTransition>, DomainError> {
        let mut matching: Vec<SubscriptionTransition> = self
            .transitions
            .read()
            .await
            .iter()
            .filter(|t| !t.valid && t.occurred_at >= since)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(matching)
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut transitions = self.transitions.write().await;
        let before = transitions.len();
        transitions.retain(|t| t.occurred_at >= timestamp);
        Ok((before - transitions.len()) as u64)
    }
}
