//! Shared types and models for the Retail POS platform
//!
//! This crate contains the framework-free domain types used by the backend
//! services, the repositories and the HTTP layer.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
