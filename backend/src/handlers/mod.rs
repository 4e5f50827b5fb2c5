//! HTTP handlers
//!
//! Handlers check the caller's role and branch, build the service for the
//! request and wrap the result in the `{ok, message, payload}` envelope.

pub mod auth;
pub mod branch;
pub mod catalog;
pub mod customer;
pub mod delivery;
pub mod health;
pub mod order;
pub mod stock;
pub mod user;

pub use auth::*;
pub use branch::*;
pub use catalog::*;
pub use customer::*;
pub use delivery::*;
pub use health::*;
pub use order::*;
pub use stock::*;
pub use user::*;
