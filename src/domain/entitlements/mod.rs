//! Entitlement resolution domain.
//!
//! The core of the access-control engine: billing state classification,
//! plan entitlements, config-driven access rules, and the evaluator
//! that combines them into access decisions.

mod access_level;
mod billing_state;
mod decision;
mod evaluator;
mod plan;
mod policy;
mod snapshot;
mod store;
mod warnings;

pub use access_level::AccessLevel;
pub use billing_state::BillingState;
pub use decision::AccessDecision;
pub use evaluator::{AccessEvaluator, EntitlementContext, Operation};
pub use plan::{FeatureEntitlement, FeatureGrant, PlanEntitlements, TrialConfig};
pub use policy::{
    AccessRuleConfig, BillingConfig, BillingRules, PolicyDocument, RawAccessRule, RetryStrategy,
};
pub use snapshot::{CachedEntitlement, SNAPSHOT_VERSION};
pub use store::{PolicyError, PolicySnapshot, PolicyStore};
pub use warnings::{resolve_warning, resolve_warnings, BillingWarning, WarningSeverity};
