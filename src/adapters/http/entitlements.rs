//! HTTP handlers for entitlement checks.
//!
//! Denials serialize as HTTP 402 with the decision's error body, which
//! the frontend renders as an upgrade prompt.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use crate::domain::entitlements::Operation;
use crate::domain::foundation::{DomainError, TenantId};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckParams {
    /// `read` (default) or `write`.
    pub operation: Option<String>,
}

/// `GET /api/entitlements/:tenant` - the tenant's entitlement snapshot.
pub async fn get_summary(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> Response {
    let tenant = match TenantId::new(tenant) {
        Ok(tenant) => tenant,
        Err(e) => return bad_request(&e),
    };

    match state.entitlements.entitlement_summary(&tenant).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => internal_error(&e),
    }
}

/// `GET /api/entitlements/:tenant/features/:feature` - feature check.
pub async fn check_feature(
    State(state): State<AppState>,
    Path((tenant, feature)): Path<(String, String)>,
    Query(params): Query<CheckParams>,
) -> Response {
    let tenant = match TenantId::new(tenant) {
        Ok(tenant) => tenant,
        Err(e) => return bad_request(&e),
    };
    let operation = Operation::parse(params.operation.as_deref());

    match state
        .entitlements
        .check_feature_access(&tenant, &feature, operation)
        .await
    {
        Ok(decision) if decision.allowed => (StatusCode::OK, Json(decision)).into_response(),
        Ok(decision) => {
            (StatusCode::PAYMENT_REQUIRED, Json(decision.to_error_response())).into_response()
        }
        Err(e) => internal_error(&e),
    }
}

fn bad_request(error: &DomainError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "invalid_request", "message": error.to_string() })),
    )
        .into_response()
}

fn internal_error(error: &DomainError) -> Response {
    tracing::error!(error = %error, "entitlement check failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal_error", "message": "entitlement check failed" })),
    )
        .into_response()
}
