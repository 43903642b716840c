//! Shared data models for the VidGen backend.
//!
//! This crate provides Serde-serializable types for:
//! - Subscription plans and monthly quota limits
//! - User profiles and subscription state
//! - Generated video records

pub mod plan;
pub mod profile;
pub mod video;

// Re-export common types
pub use plan::{PlanLimits, PlanTier, FREE_VIDEOS_PER_MONTH, PRO_PRICE_CENTS, PRO_VIDEOS_PER_MONTH};
pub use profile::{NewProfile, Profile, SubscriptionStatus};
pub use video::{NewVideo, Video, VideoStatus};
