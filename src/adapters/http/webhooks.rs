//! Billing webhook receiver.
//!
//! Signature failures are the only rejection; everything else is
//! acknowledged with 200 so the platform does not retry deliveries that
//! fail on our side. Internal failures are logged and recorded in the
//! ledger instead.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::application::WebhookOutcome;
use crate::domain::billing::BillingWebhookEvent;

use super::AppState;

const HEADER_SIGNATURE: &str = "x-webhook-hmac-sha256";
const HEADER_EVENT_ID: &str = "x-webhook-event-id";
const HEADER_TOPIC: &str = "x-webhook-topic";
const HEADER_SHOP_DOMAIN: &str = "x-shop-domain";

/// `POST /api/webhooks/billing` - billing platform webhook receiver.
pub async fn receive_billing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Transport-level signature check: the only path to a rejection.
    let signature = match header(&headers, HEADER_SIGNATURE) {
        Some(signature) => signature,
        None => return unauthorized("missing signature header"),
    };
    if state.verifier.verify(&body, &signature).is_err() {
        tracing::warn!("billing webhook signature verification failed");
        return unauthorized("signature verification failed");
    }

    let (event_id, topic, shop_domain) = match (
        header(&headers, HEADER_EVENT_ID),
        header(&headers, HEADER_TOPIC),
        header(&headers, HEADER_SHOP_DOMAIN),
    ) {
        (Some(event_id), Some(topic), Some(shop_domain)) => (event_id, topic, shop_domain),
        _ => {
            // Metadata headers missing: nothing to process, but ack so
            // the platform does not retry a delivery we cannot use.
            tracing::warn!("billing webhook missing metadata headers");
            return acknowledged("ignored");
        }
    };

    let event = match BillingWebhookEvent::parse(event_id, topic, shop_domain, &body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable billing webhook body");
            return acknowledged("ignored");
        }
    };

    match state.webhooks.process(&event).await {
        Ok(WebhookOutcome::Applied { .. }) => acknowledged("processed"),
        Ok(WebhookOutcome::Skipped { reason }) => {
            tracing::debug!(reason = reason.as_str(), "billing webhook skipped");
            acknowledged(reason.as_str())
        }
        Err(e) => {
            // Our bug, not the platform's: ack anyway to avoid a retry
            // storm. The mutation was rolled back by the repository.
            tracing::error!(error = %e, "billing webhook processing failed");
            acknowledged("error")
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "received": false, "error": message })),
    )
        .into_response()
}

fn acknowledged(status: &str) -> Response {
    (StatusCode::OK, Json(json!({ "received": true, "status": status }))).into_response()
}
