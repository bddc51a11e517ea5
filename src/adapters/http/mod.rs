//! HTTP surface for the entitlement engine.
//!
//! Only the routes this core owns: entitlement checks for the API layer
//! and the billing webhook receiver. The broader application API lives
//! in a separate service.

mod entitlements;
mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::application::{BillingWebhookService, EntitlementService};
use crate::domain::billing::WebhookVerifier;

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub entitlements: Arc<EntitlementService>,
    pub webhooks: Arc<BillingWebhookService>,
    pub verifier: Arc<WebhookVerifier>,
}

/// Builds the service router.
///
/// # Routes
///
/// - `GET /healthz` - liveness probe
/// - `GET /api/entitlements/:tenant` - entitlement summary
/// - `GET /api/entitlements/:tenant/features/:feature` - feature check
/// - `POST /api/webhooks/billing` - billing platform webhook receiver
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/api/entitlements/:tenant",
            get(entitlements::get_summary),
        )
        .route(
            "/api/entitlements/:tenant/features/:feature",
            get(entitlements::check_feature),
        )
        .route("/api/webhooks/billing", post(webhooks::receive_billing_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
