//! Billing webhook error types.

use thiserror::Error;

/// Errors raised while verifying or processing a billing webhook.
///
/// Only `InvalidSignature` and `MissingHeader` reject the delivery at
/// transport level; everything else is acknowledged to the platform and
/// handled internally.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook signature verification failed")]
    InvalidSignature,

    #[error("missing required webhook header: {0}")]
    MissingHeader(&'static str),

    #[error("failed to parse webhook payload: {0}")]
    ParseError(String),

    #[error("webhook processing failed: {0}")]
    Processing(String),
}

impl From<crate::domain::foundation::DomainError> for WebhookError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        WebhookError::Processing(err.to_string())
    }
}
