//! Cache adapters: in-process fallback, Redis shared tier, and the
//! coordinator composing them.

mod config;
mod memory;
mod redis;
mod tiered;

pub use config::CacheSettings;
pub use memory::{InMemoryCacheStore, DEFAULT_CAPACITY};
pub use redis::{run_invalidation_listener, RedisCacheStore, INVALIDATION_CHANNEL};
pub use tiered::EntitlementCache;
