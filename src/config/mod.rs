//! Configuration module
//!
//! Loads and validates the alarm configuration file: recipients and their
//! activation tiers, timing, outbound transport, acknowledgment store and
//! HTTP server settings.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
