//! Redis-backed cache store and invalidation fan-out.
//!
//! The shared tier: visible to every process. Also carries the pub/sub
//! channel that tells other processes to drop their local fallback
//! copies when a tenant is invalidated.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;

use crate::ports::{CacheError, CacheStore, InvalidationNotice, InvalidationPublisher};

/// Pub/sub channel for entitlement invalidation notices.
pub const INVALIDATION_CHANNEL: &str = "storesight:entitlements:invalidation";

/// Redis-backed cache store for multi-process deployments.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: MultiplexedConnection,
}

impl RedisCacheStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }
}

fn unavailable(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;

            if !keys.is_empty() {
                let removed: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(unavailable)?;
                deleted += removed;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(deleted)
    }
}

#[async_trait]
impl InvalidationPublisher for RedisCacheStore {
    async fn publish(&self, notice: &InvalidationNotice) -> Result<(), CacheError> {
        let payload = serde_json::to_string(notice)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        redis::cmd("PUBLISH")
            .arg(INVALIDATION_CHANNEL)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)
    }
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore").finish_non_exhaustive()
    }
}

/// Subscribes to the invalidation channel and evicts local fallback
/// entries published by other processes. Runs until the connection
/// drops; the caller decides whether to respawn.
pub async fn run_invalidation_listener(
    client: redis::Client,
    local: Arc<dyn CacheStore>,
) -> Result<(), CacheError> {
    let conn = client
        .get_async_connection()
        .await
        .map_err(unavailable)?;
    let mut pubsub = conn.into_pubsub();
    pubsub
        .subscribe(INVALIDATION_CHANNEL)
        .await
        .map_err(unavailable)?;

    tracing::info!(channel = INVALIDATION_CHANNEL, "invalidation listener subscribed");

    let mut stream = pubsub.on_message();
    while let Some(message) = stream.next().await {
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable invalidation message");
                continue;
            }
        };
        match serde_json::from_str::<InvalidationNotice>(&payload) {
            Ok(notice) => {
                let key = super::tiered::entitlement_key(&notice.tenant_id);
                if let Err(e) = local.delete(&key).await {
                    tracing::warn!(error = %e, tenant = %notice.tenant_id, "local eviction failed");
                } else {
                    tracing::debug!(
                        tenant = %notice.tenant_id,
                        reason = %notice.reason,
                        "evicted local entitlement copy"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed invalidation notice");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    // Redis integration tests require a running Redis instance and are
    // run separately from unit tests.
    //
    // Example setup:
    //
    // #[tokio::test]
    // #[ignore] // Run with: cargo test -- --ignored
    // async fn test_redis_cache_store() {
    //     let client = redis::Client::open("redis://127.0.0.1/").unwrap();
    //     let conn = client.get_multiplexed_tokio_connection().await.unwrap();
    //     let store = RedisCacheStore::new(conn);
    //     // ... test code
    // }
}
