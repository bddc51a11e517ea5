//! Storesight service binary.
//!
//! Initialization order is deliberate: configuration, then the policy
//! document (entitlement checks must never run without it), then
//! infrastructure connections, then the HTTP surface.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use storesight::adapters::cache::{
    run_invalidation_listener, EntitlementCache, InMemoryCacheStore, RedisCacheStore,
};
use storesight::adapters::http::{router, AppState};
use storesight::adapters::postgres::{
    PostgresSubscriptionRepository, PostgresTransitionLog, PostgresWebhookLedger,
};
use storesight::application::{BillingWebhookService, EntitlementService};
use storesight::config::AppConfig;
use storesight::domain::billing::WebhookVerifier;
use storesight::domain::entitlements::PolicyStore;
use storesight::ports::{CacheStore, InvalidationPublisher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    // Policy must load before anything can serve entitlement checks.
    let policy = Arc::new(PolicyStore::load(config.billing.plans_path.as_deref())?);

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    // Cache tiers: local always; Redis when configured.
    let local: Arc<dyn CacheStore> =
        Arc::new(InMemoryCacheStore::new(config.cache.local_capacity));
    let (primary, publisher): (
        Option<Arc<dyn CacheStore>>,
        Option<Arc<dyn InvalidationPublisher>>,
    ) = match &config.redis.url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let conn = client.get_multiplexed_tokio_connection().await?;
            let store = Arc::new(RedisCacheStore::new(conn));

            // Evict local copies when other processes invalidate.
            let listener_local = Arc::clone(&local);
            tokio::spawn(async move {
                if let Err(e) = run_invalidation_listener(client, listener_local).await {
                    tracing::warn!(error = %e, "invalidation listener stopped");
                }
            });

            (
                Some(Arc::clone(&store) as Arc<dyn CacheStore>),
                Some(store as Arc<dyn InvalidationPublisher>),
            )
        }
        None => {
            tracing::info!("no Redis configured, running with in-process cache only");
            (None, None)
        }
    };
    let cache = Arc::new(EntitlementCache::new(
        primary,
        local,
        publisher,
        config.cache.clone(),
    ));

    let subscriptions = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let ledger = Arc::new(PostgresWebhookLedger::new(pool.clone()));
    let transitions = Arc::new(PostgresTransitionLog::new(pool));

    let entitlements = Arc::new(EntitlementService::new(
        Arc::clone(&policy),
        Arc::clone(&cache),
        subscriptions.clone(),
    ));
    let webhooks = Arc::new(BillingWebhookService::new(
        subscriptions,
        ledger,
        transitions,
        cache,
        policy,
    ));
    let verifier = Arc::new(WebhookVerifier::new(
        config.billing.webhook_secret.clone(),
    ));

    let app = router(AppState {
        entitlements,
        webhooks,
        verifier,
    });

    let addr = config.server.socket_addr();
    tracing::info!(addr = %addr, "storesight listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
