//! Request handlers.

pub mod auth;
pub mod billing;
pub mod generate;
pub mod health;
pub mod profile;
pub mod subscription;
pub mod videos;
pub mod webhook;

pub use auth::*;
pub use billing::*;
pub use generate::*;
pub use health::*;
pub use profile::*;
pub use subscription::*;
pub use videos::*;
pub use webhook::*;
