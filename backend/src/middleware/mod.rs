//! Request middleware

pub mod auth;

pub use auth::{auth_middleware, require_branch_access, require_role, AuthUser, CurrentUser};
