//! Billing webhook signature verification.
//!
//! The platform signs each delivery with HMAC-SHA256 over the raw body,
//! base64-encoded in a header. Comparison is constant-time.

use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Verifier for billing platform webhook signatures.
pub struct WebhookVerifier {
    secret: SecretString,
}

impl WebhookVerifier {
    /// Creates a new verifier with the shared signing secret.
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifies the base64-encoded HMAC-SHA256 signature of a payload.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::InvalidSignature` when the header does not
    /// decode or the digest does not match.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<(), WebhookError> {
        let provided = base64::engine::general_purpose::STANDARD
            .decode(signature_header.trim())
            .map_err(|_| WebhookError::InvalidSignature)?;

        let expected = self.compute(payload);

        if constant_time_eq(&expected, &provided) {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature)
        }
    }

    /// Computes the expected digest for a payload.
    fn compute(&self, payload: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length; new_from_slice cannot fail.
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Constant-time byte comparison. Length mismatch short-circuits, which
/// leaks only the digest length (public anyway).
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
