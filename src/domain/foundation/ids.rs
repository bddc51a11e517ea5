//! Typed identifiers shared across the domain.

use serde::{Deserialize, Serialize};

use super::{DomainError, ErrorCode};

/// Identifier for a tenant (a merchant store account).
///
/// The tenant ID is the store's domain (e.g. `acme.myshopify.com`),
/// normalized to lowercase. It is the isolation unit for all billing
/// and entitlement state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant ID from a store domain.
    ///
    /// The value is trimmed and lowercased. Empty input is rejected.
    pub fn new(domain: impl Into<String>) -> Result<Self, DomainError> {
        let domain = domain.into().trim().to_lowercase();
        if domain.is_empty() {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                "tenant id cannot be empty",
            ));
        }
        Ok(Self(domain))
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
