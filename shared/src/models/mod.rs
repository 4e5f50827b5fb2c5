//! Domain models for the Retail POS platform

mod branch;
mod catalog;
mod customer;
mod delivery;
mod order;
mod stock;
mod user;

pub use branch::*;
pub use catalog::*;
pub use customer::*;
pub use delivery::*;
pub use order::*;
pub use stock::*;
pub use user::*;
