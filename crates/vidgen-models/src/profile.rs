//! User profile and subscription state.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::plan::PlanTier;

/// Subscription state stored on a profile.
///
/// Only `active` unlocks the Pro quota. Every other value, including
/// provider states like `past_due` or `trialing`, is treated as the free
/// tier. Unrecognized strings round-trip unchanged through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    #[default]
    Free,
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Other(String),
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::Free => "free",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Other(s) => s,
        }
    }

    /// True only for a paid subscription in good standing.
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

impl From<String> for SubscriptionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "free" => SubscriptionStatus::Free,
            "active" => SubscriptionStatus::Active,
            "trialing" => SubscriptionStatus::Trialing,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            _ => SubscriptionStatus::Other(s),
        }
    }
}

impl From<&str> for SubscriptionStatus {
    fn from(s: &str) -> Self {
        SubscriptionStatus::from(s.to_string())
    }
}

impl From<SubscriptionStatus> for String {
    fn from(status: SubscriptionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl JsonSchema for SubscriptionStatus {
    fn schema_name() -> String {
        "SubscriptionStatus".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// A row in the `profiles` table.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub videos_generated: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Effective plan tier derived from subscription state.
    pub fn plan(&self) -> PlanTier {
        if self.subscription_status.is_active() {
            PlanTier::Pro
        } else {
            PlanTier::Free
        }
    }

    /// Monthly video quota for the effective plan.
    pub fn videos_per_month(&self) -> u32 {
        self.plan().videos_per_month()
    }

    /// Videos left this month (never negative).
    pub fn videos_remaining(&self) -> u32 {
        self.videos_per_month().saturating_sub(self.videos_generated)
    }
}

/// Fields sent when creating a profile row.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub full_name: String,
    pub subscription_status: SubscriptionStatus,
    pub videos_generated: u32,
}

fn null_as_default<'de, D>(deserializer: D) -> Result<SubscriptionStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<SubscriptionStatus>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(status: &str, generated: u32) -> Profile {
        Profile {
            id: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
            full_name: Some("User".to_string()),
            avatar_url: None,
            subscription_status: SubscriptionStatus::from(status),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            videos_generated: generated,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_active_status_unlocks_pro_quota() {
        assert_eq!(profile_with("active", 0).videos_per_month(), 50);
    }

    #[test]
    fn test_non_active_statuses_get_free_quota() {
        assert_eq!(profile_with("free", 0).videos_per_month(), 3);
        assert_eq!(profile_with("canceled", 0).videos_per_month(), 3);
        assert_eq!(profile_with("past_due", 0).videos_per_month(), 3);
        // "pro" is a plan name, not a subscription state; it does not
        // unlock the larger quota
        assert_eq!(profile_with("pro", 0).videos_per_month(), 3);
    }

    #[test]
    fn test_videos_remaining() {
        assert_eq!(profile_with("free", 0).videos_remaining(), 3);
        assert_eq!(profile_with("free", 2).videos_remaining(), 1);
        assert_eq!(profile_with("free", 3).videos_remaining(), 0);
        // Over-limit counters clamp to zero instead of underflowing
        assert_eq!(profile_with("free", 10).videos_remaining(), 0);
        assert_eq!(profile_with("active", 49).videos_remaining(), 1);
        assert_eq!(profile_with("active", 50).videos_remaining(), 0);
    }

    #[test]
    fn test_status_round_trips_unknown_strings() {
        let status = SubscriptionStatus::from("incomplete_expired");
        assert_eq!(status, SubscriptionStatus::Other("incomplete_expired".to_string()));
        assert_eq!(String::from(status), "incomplete_expired");
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
        assert_eq!(json, "\"past_due\"");
        let status: SubscriptionStatus = serde_json::from_str("\"active\"").unwrap();
        assert!(status.is_active());
    }

    #[test]
    fn test_profile_deserializes_null_counters() {
        let profile: Profile = serde_json::from_str(
            r#"{"id":"user-1","subscription_status":null,"videos_generated":null}"#,
        )
        .unwrap();
        assert_eq!(profile.subscription_status, SubscriptionStatus::Free);
        assert_eq!(profile.videos_generated, 0);
    }

    #[test]
    fn test_new_profile_omits_missing_email() {
        let new = NewProfile {
            id: "user-1".to_string(),
            email: None,
            full_name: "User".to_string(),
            subscription_status: SubscriptionStatus::Free,
            videos_generated: 0,
        };
        let value = serde_json::to_value(&new).unwrap();
        assert!(value.get("email").is_none());
        assert_eq!(value["subscription_status"], "free");
    }
}
