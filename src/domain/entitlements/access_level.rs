//! Coarse-grained access capability tiers.
//!
//! The access level is derived from the billing state (via the per-state
//! access rules), independent of any specific feature flag. Each level
//! carries a fixed set of globally-restricted feature keys.

use serde::{Deserialize, Serialize};

/// Read/write capability tier for a tenant's current billing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Unrestricted access.
    Full,
    /// Reads only; mutation and export paths blocked.
    ReadOnly,
    /// Reads only, and AI insight surfaces additionally blocked.
    ReadOnlyAnalytics,
    /// Reduced feature set, writes blocked.
    Limited,
    /// Full access that lapses at the period end (cancelled, not yet expired).
    FullUntilPeriodEnd,
    /// No access at all.
    None,
}

impl AccessLevel {
    /// Write operations are only permitted on the two full tiers.
    pub fn allows_writes(&self) -> bool {
        matches!(self, AccessLevel::Full | AccessLevel::FullUntilPeriodEnd)
    }

    /// Every level except `None` can still read.
    pub fn allows_reads(&self) -> bool {
        !matches!(self, AccessLevel::None)
    }

    /// Analytics dashboards follow the read rule.
    pub fn allows_analytics(&self) -> bool {
        self.allows_reads()
    }

    /// Feature keys globally blocked at this level, regardless of plan.
    ///
    /// `None` blocks everything and is handled in
    /// [`AccessLevel::restricts_feature`] rather than enumerated here.
    pub fn restricted_features(&self) -> &'static [&'static str] {
        match self {
            AccessLevel::ReadOnly => &[
                "data_export",
                "ai_actions",
                "api_access",
                "custom_reports",
                "scheduled_reports",
            ],
            AccessLevel::ReadOnlyAnalytics => &[
                "data_export",
                "ai_actions",
                "api_access",
                "custom_reports",
                "scheduled_reports",
                "ai_insights",
            ],
            AccessLevel::Limited => &["data_export_api", "ai_actions"],
            AccessLevel::Full | AccessLevel::FullUntilPeriodEnd | AccessLevel::None => &[],
        }
    }

    /// Whether this level blocks the given feature outright.
    ///
    /// `None` has empty-allow-set semantics: every feature is restricted.
    pub fn restricts_feature(&self, feature_key: &str) -> bool {
        match self {
            AccessLevel::None => true,
            _ => self
                .restricted_features()
                .iter()
                .any(|f| *f == feature_key),
        }
    }

    /// Parses a config-supplied level name.
    ///
    /// Unknown names degrade to `Limited` rather than failing the request
    /// path; config typos must never crash an access check.
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "full" => AccessLevel::Full,
            "read_only" => AccessLevel::ReadOnly,
            "read_only_analytics" => AccessLevel::ReadOnlyAnalytics,
            "limited" => AccessLevel::Limited,
            "full_until_period_end" => AccessLevel::FullUntilPeriodEnd,
            "none" => AccessLevel::None,
            other => {
                tracing::warn!(access_level = other, "unknown access level in config, defaulting to limited");
                AccessLevel::Limited
            }
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Full => "full",
            AccessLevel::ReadOnly => "read_only",
            AccessLevel::ReadOnlyAnalytics => "read_only_analytics",
            AccessLevel::Limited => "limited",
            AccessLevel::FullUntilPeriodEnd => "full_until_period_end",
            AccessLevel::None => "none",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
