//! PostgreSQL adapters for the persistence ports.

mod subscription_repository;
mod transition_log;
mod webhook_ledger;

pub use subscription_repository::PostgresSubscriptionRepository;
pub use transition_log::PostgresTransitionLog;
pub use webhook_ledger::PostgresWebhookLedger;
