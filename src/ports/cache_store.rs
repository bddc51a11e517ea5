//! Cache storage port.
//!
//! Both cache tiers (the shared Redis store and the in-process
//! fallback) implement the same `CacheStore` capability; a coordinator
//! composes them. Invalidation fan-out to other processes goes through
//! a separate publisher port.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a cache backend.
///
/// These never surface to request handlers; the cache layer swallows
/// them and degrades.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization failed: {0}")]
    Serialization(String),
}

/// String key/value store with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetches a value. Expired entries read as misses.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores a value with a TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Deletes a single key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Deletes every key starting with the prefix, returning the count.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}

/// Broadcast notice that a tenant's cached entitlement was invalidated,
/// so other processes can evict their local fallback copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidationNotice {
    pub tenant_id: String,
    pub reason: String,
}

/// Publishes invalidation notices to subscribing processes.
#[async_trait]
pub trait InvalidationPublisher: Send + Sync {
    async fn publish(&self, notice: &InvalidationNotice) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_round_trips_through_json() {
        let notice = InvalidationNotice {
            tenant_id: "acme.myshopify.com".to_string(),
            reason: "billing_status_changed".to_string(),
        };
        let json = serde_json::to_string(&notice).unwrap();
        let back: InvalidationNotice = serde_json::from_str(&json).unwrap();
        assert_eq!(notice, back);
    }

    #[test]
    fn cache_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn CacheStore) {}
    }
}
