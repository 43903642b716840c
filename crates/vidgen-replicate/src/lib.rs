//! Replicate predictions client.
//!
//! Creates a prediction against a hosted model and polls it to a terminal
//! state. Generation can take minutes; the poll loop has no overall deadline,
//! only per-request timeouts.

pub mod client;
pub mod error;

pub use client::{Prediction, ReplicateClient, ReplicateConfig};
pub use error::{GenerationError, GenerationResult};
