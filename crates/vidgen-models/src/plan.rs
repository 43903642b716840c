//! Plan configuration and monthly generation limits.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Monthly video quota for each plan tier.
pub const FREE_VIDEOS_PER_MONTH: u32 = 3;
pub const PRO_VIDEOS_PER_MONTH: u32 = 50;

/// Pro plan price in cents ($29.99/month).
pub const PRO_PRICE_CENTS: u32 = 2999;

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
}

impl PlanTier {
    /// Maximum videos per calendar month for this plan.
    pub fn videos_per_month(&self) -> u32 {
        match self {
            PlanTier::Free => FREE_VIDEOS_PER_MONTH,
            PlanTier::Pro => PRO_VIDEOS_PER_MONTH,
        }
    }

    /// Get the plan name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanLimits {
    /// Plan identifier.
    pub plan_id: String,
    /// Display name.
    pub name: String,
    /// Monthly price in cents.
    pub price_cents: u32,
    /// Maximum videos per month.
    pub videos_per_month: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            plan_id: "free".to_string(),
            name: "Free".to_string(),
            price_cents: 0,
            videos_per_month: FREE_VIDEOS_PER_MONTH,
        }
    }
}

impl PlanLimits {
    /// Create limits for a specific plan tier.
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Self::default(),
            PlanTier::Pro => Self {
                plan_id: "pro".to_string(),
                name: "Pro".to_string(),
                price_cents: PRO_PRICE_CENTS,
                videos_per_month: PRO_VIDEOS_PER_MONTH,
            },
        }
    }
}
