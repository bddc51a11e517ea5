//! Entitlement cache tuning.

use serde::Deserialize;

/// TTL and capacity settings for the entitlement cache.
///
/// Volatile billing states (grace period, past due, frozen) get a short
/// TTL because their classification can flip within minutes; everything
/// else keeps the longer default. Explicit invalidation on billing
/// events is the primary freshness mechanism; TTLs only bound staleness
/// when an invalidation is missed.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// TTL for snapshots in volatile billing states.
    #[serde(default = "default_volatile_ttl_secs")]
    pub volatile_ttl_secs: u64,

    /// TTL for snapshots in stable billing states.
    #[serde(default = "default_stable_ttl_secs")]
    pub stable_ttl_secs: u64,

    /// TTL for feature-flag override entries.
    #[serde(default = "default_override_ttl_secs")]
    pub override_ttl_secs: u64,

    /// Maximum entries in the in-process fallback store.
    #[serde(default = "default_local_capacity")]
    pub local_capacity: usize,
}

fn default_volatile_ttl_secs() -> u64 {
    60
}

fn default_stable_ttl_secs() -> u64 {
    300
}

fn default_override_ttl_secs() -> u64 {
    86_400
}

fn default_local_capacity() -> usize {
    10_000
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            volatile_ttl_secs: default_volatile_ttl_secs(),
            stable_ttl_secs: default_stable_ttl_secs(),
            override_ttl_secs: default_override_ttl_secs(),
            local_capacity: default_local_capacity(),
        }
    }
}
