//! Two-tier entitlement cache coordinator.
//!
//! Reads check the shared primary first, then the in-process fallback;
//! writes go to both when the primary is available, the fallback
//! always. A degraded primary therefore never disables caching
//! outright, at the cost of other processes seeing fallback-only data
//! until it recovers.
//!
//! ## Correctness contract
//!
//! Callers MUST invalidate synchronously, after the subscription
//! mutation is durably committed, whenever a subscription's status,
//! plan, or grace period changes. A skipped invalidation lets a tenant
//! keep stale access for up to the remaining TTL.
//!
//! Backend failures never reach request handlers; they are logged and
//! the cache degrades to whichever tier still works.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entitlements::{CachedEntitlement, SNAPSHOT_VERSION};
use crate::domain::foundation::{TenantId, Timestamp};
use crate::ports::{CacheStore, InvalidationNotice, InvalidationPublisher};

use super::config::CacheSettings;

const ENTITLEMENT_PREFIX: &str = "entitlements:";

/// Cache key for a tenant's entitlement snapshot.
pub(crate) fn entitlement_key(tenant_id: &str) -> String {
    format!("entitlements:tenant:{}", tenant_id)
}

/// Cache key for a tenant's feature-flag overrides.
fn flags_key(tenant_id: &str) -> String {
    format!("entitlements:flags:{}", tenant_id)
}

/// Coordinates the shared and in-process cache tiers.
pub struct EntitlementCache {
    primary: Option<Arc<dyn CacheStore>>,
    local: Arc<dyn CacheStore>,
    publisher: Option<Arc<dyn InvalidationPublisher>>,
    settings: CacheSettings,
}

impl EntitlementCache {
    pub fn new(
        primary: Option<Arc<dyn CacheStore>>,
        local: Arc<dyn CacheStore>,
        publisher: Option<Arc<dyn InvalidationPublisher>>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            primary,
            local,
            publisher,
            settings,
        }
    }

    /// Fallback-only coordinator, used when no shared cache is
    /// configured and in tests.
    pub fn local_only(local: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        Self::new(None, local, None, settings)
    }

    /// TTL for a snapshot, by billing-state volatility.
    pub fn ttl_for(&self, snapshot: &CachedEntitlement) -> Duration {
        if snapshot.billing_state.is_volatile() {
            Duration::from_secs(self.settings.volatile_ttl_secs)
        } else {
            Duration::from_secs(self.settings.stable_ttl_secs)
        }
    }

    /// Fetches a tenant's cached snapshot, if fresh.
    pub async fn get(&self, tenant: &TenantId) -> Option<CachedEntitlement> {
        let key = entitlement_key(tenant.as_str());

        if let Some(primary) = &self.primary {
            match primary.get(&key).await {
                Ok(Some(raw)) => {
                    if let Some(snapshot) = Self::decode(&raw) {
                        return Some(snapshot);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "primary cache read failed, trying fallback");
                }
            }
        }

        match self.local.get(&key).await {
            Ok(Some(raw)) => Self::decode(&raw),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "fallback cache read failed");
                None
            }
        }
    }

    /// Stores a tenant's snapshot, stamping `cached_at` and the current
    /// version. Returns the stamped snapshot.
    ///
    /// The two writes are not atomic across tiers; a crash between them
    /// leaves a transient inconsistency that the next TTL expiry or
    /// invalidation resolves.
    pub async fn set(&self, tenant: &TenantId, mut snapshot: CachedEntitlement) -> CachedEntitlement {
        snapshot.cached_at = Timestamp::now();
        snapshot.version = SNAPSHOT_VERSION;

        let key = entitlement_key(tenant.as_str());
        let ttl = self.ttl_for(&snapshot);
        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "entitlement snapshot serialization failed");
                return snapshot;
            }
        };

        if let Some(primary) = &self.primary {
            if let Err(e) = primary.set(&key, &raw, ttl).await {
                tracing::warn!(error = %e, "primary cache write failed, fallback only");
            }
        }
        if let Err(e) = self.local.set(&key, &raw, ttl).await {
            tracing::warn!(error = %e, "fallback cache write failed");
        }

        snapshot
    }

    /// Deletes a tenant's snapshot from both tiers and broadcasts the
    /// invalidation so other processes evict their fallback copies.
    pub async fn invalidate(&self, tenant: &TenantId, reason: &str) {
        let key = entitlement_key(tenant.as_str());

        if let Some(primary) = &self.primary {
            if let Err(e) = primary.delete(&key).await {
                tracing::warn!(error = %e, tenant = %tenant, "primary cache invalidation failed");
            }
        }
        if let Err(e) = self.local.delete(&key).await {
            tracing::warn!(error = %e, tenant = %tenant, "fallback cache invalidation failed");
        }

        if let Some(publisher) = &self.publisher {
            let notice = InvalidationNotice {
                tenant_id: tenant.as_str().to_string(),
                reason: reason.to_string(),
            };
            if let Err(e) = publisher.publish(&notice).await {
                tracing::warn!(error = %e, tenant = %tenant, "invalidation broadcast failed");
            }
        }

        tracing::info!(tenant = %tenant, reason, "entitlement cache invalidated");
    }

    /// Deletes every entitlement key in both tiers. Reserved for config
    /// reloads and emergencies.
    pub async fn invalidate_all(&self, reason: &str) -> u64 {
        let mut deleted = 0;

        if let Some(primary) = &self.primary {
            match primary.delete_prefix(ENTITLEMENT_PREFIX).await {
                Ok(count) => deleted += count,
                Err(e) => {
                    tracing::warn!(error = %e, "primary cache flush failed");
                }
            }
        }
        match self.local.delete_prefix(ENTITLEMENT_PREFIX).await {
            Ok(count) => deleted += count,
            Err(e) => {
                tracing::warn!(error = %e, "fallback cache flush failed");
            }
        }

        tracing::warn!(reason, deleted, "ALL entitlement cache entries invalidated");
        deleted
    }

    /// Admin feature-flag overrides for a tenant. Missing or unreadable
    /// entries read as no overrides.
    pub async fn get_feature_flags_override(&self, tenant: &TenantId) -> HashMap<String, bool> {
        let key = flags_key(tenant.as_str());

        let mut raw: Option<String> = None;
        if let Some(primary) = &self.primary {
            match primary.get(&key).await {
                Ok(value) => raw = value,
                Err(e) => {
                    tracing::warn!(error = %e, "primary cache read failed for flag overrides");
                }
            }
        }
        if raw.is_none() {
            raw = self.local.get(&key).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "fallback cache read failed for flag overrides");
                None
            });
        }

        raw.and_then(|raw| {
            serde_json::from_str(&raw)
                .map_err(|e| {
                    tracing::warn!(error = %e, "malformed flag override entry");
                    e
                })
                .ok()
        })
        .unwrap_or_default()
    }

    /// Sets one feature-flag override. Also invalidates the tenant's
    /// entitlement snapshot, because overrides change evaluation.
    pub async fn set_feature_flag_override(&self, tenant: &TenantId, feature: &str, value: bool) {
        let mut overrides = self.get_feature_flags_override(tenant).await;
        overrides.insert(feature.to_string(), value);
        self.write_overrides(tenant, &overrides).await;
        self.invalidate(tenant, "feature_flag_override_set").await;
    }

    /// Clears one override, or all of them when `feature` is `None`.
    /// Also invalidates the tenant's entitlement snapshot.
    pub async fn clear_feature_flag_override(&self, tenant: &TenantId, feature: Option<&str>) {
        match feature {
            Some(feature) => {
                let mut overrides = self.get_feature_flags_override(tenant).await;
                overrides.remove(feature);
                if overrides.is_empty() {
                    self.delete_overrides(tenant).await;
                } else {
                    self.write_overrides(tenant, &overrides).await;
                }
            }
            None => self.delete_overrides(tenant).await,
        }
        self.invalidate(tenant, "feature_flag_override_cleared").await;
    }

    async fn write_overrides(&self, tenant: &TenantId, overrides: &HashMap<String, bool>) {
        let key = flags_key(tenant.as_str());
        let ttl = Duration::from_secs(self.settings.override_ttl_secs);
        let raw = match serde_json::to_string(overrides) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "flag override serialization failed");
                return;
            }
        };

        if let Some(primary) = &self.primary {
            if let Err(e) = primary.set(&key, &raw, ttl).await {
                tracing::warn!(error = %e, "primary cache write failed for flag overrides");
            }
        }
        if let Err(e) = self.local.set(&key, &raw, ttl).await {
            tracing::warn!(error = %e, "fallback cache write failed for flag overrides");
        }
    }

    async fn delete_overrides(&self, tenant: &TenantId) {
        let key = flags_key(tenant.as_str());
        if let Some(primary) = &self.primary {
            if let Err(e) = primary.delete(&key).await {
                tracing::warn!(error = %e, "primary cache delete failed for flag overrides");
            }
        }
        if let Err(e) = self.local.delete(&key).await {
            tracing::warn!(error = %e, "fallback cache delete failed for flag overrides");
        }
    }

    /// Parses a cached snapshot, treating stale versions as misses.
    fn decode(raw: &str) -> Option<CachedEntitlement> {
        match serde_json::from_str::<CachedEntitlement>(raw) {
            Ok(snapshot) if snapshot.is_current_version() => Some(snapshot),
            Ok(snapshot) => {
                tracing::debug!(version = snapshot.version, "stale snapshot version, miss");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed cached entitlement, miss");
                None
            }
        }
    }
}
