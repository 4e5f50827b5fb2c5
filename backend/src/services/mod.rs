//! Business logic services for the Retail POS platform

pub mod auth;
pub mod branch;
pub mod customer;
pub mod customer_group;
pub mod delivery;
pub mod guards;
pub mod order;
pub mod payment_method;
pub mod product;
pub mod stock;
pub mod user;

pub use auth::AuthService;
pub use branch::BranchService;
pub use customer::CustomerService;
pub use customer_group::CustomerGroupService;
pub use delivery::DeliveryService;
pub use order::OrderService;
pub use payment_method::PaymentMethodService;
pub use product::ProductService;
pub use stock::StockService;
pub use user::UserService;
