//! In-process cache store.
//!
//! The fallback tier: always available, single-process only. A single
//! mutex guards read/expiry-check/write/evict; entries are small and
//! operations are O(1) amortized, so contention is acceptable.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::ports::{CacheError, CacheStore};

/// Default maximum number of entries before eviction.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    stored_at: Instant,
    expires_at: Instant,
}

/// In-memory key/value store with TTL and capacity-bounded eviction.
///
/// When full, the entry with the oldest `stored_at` is evicted.
#[derive(Debug)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, Entry>>,
    capacity: usize,
}

impl InMemoryCacheStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Current number of live entries (expired entries may linger until
    /// touched).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.lock();

        if entries.len() >= self.capacity && !entries.contains_key(key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                stored_at: now,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let store = InMemoryCacheStore::with_default_capacity();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let store = InMemoryCacheStore::with_default_capacity();
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entry_reads_as_miss() {
        let store = InMemoryCacheStore::with_default_capacity();
        store.set("k", "v", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        // The expired entry was also removed.
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = InMemoryCacheStore::with_default_capacity();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_missing_key_is_not_an_error() {
        let store = InMemoryCacheStore::with_default_capacity();
        assert!(store.delete("missing").await.is_ok());
    }

    #[tokio::test]
    async fn delete_prefix_removes_matching_keys_only() {
        let store = InMemoryCacheStore::with_default_capacity();
        store.set("ent:a", "1", Duration::from_secs(60)).await.unwrap();
        store.set("ent:b", "2", Duration::from_secs(60)).await.unwrap();
        store.set("other", "3", Duration::from_secs(60)).await.unwrap();

        let deleted = store.delete_prefix("ent:").await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(store.get("other").await.unwrap().as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn eviction_removes_oldest_entry_at_capacity() {
        let store = InMemoryCacheStore::new(2);
        store.set("first", "1", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.set("second", "2", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.set("third", "3", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("first").await.unwrap(), None);
        assert!(store.get("second").await.unwrap().is_some());
        assert!(store.get("third").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn overwriting_existing_key_does_not_evict() {
        let store = InMemoryCacheStore::new(2);
        store.set("a", "1", Duration::from_secs(60)).await.unwrap();
        store.set("b", "2", Duration::from_secs(60)).await.unwrap();
        store.set("a", "updated", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("updated"));
        assert!(store.get("b").await.unwrap().is_some());
    }
}
