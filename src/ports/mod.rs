//! Ports: async trait interfaces between the domain and infrastructure.

mod cache_store;
mod subscription_repository;
mod transition_log;
mod webhook_ledger;

pub use cache_store::{CacheError, CacheStore, InvalidationNotice, InvalidationPublisher};
pub use subscription_repository::SubscriptionRepository;
pub use transition_log::TransitionLog;
pub use webhook_ledger::{LedgerOutcome, SaveResult, WebhookEventRecord, WebhookLedger};
