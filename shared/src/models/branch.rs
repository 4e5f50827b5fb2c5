//! Branch models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A retail branch. Orders, stock and customers are scoped to one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub id: Uuid,
    /// Short unique code (e.g., "BKK01")
    pub code: String,
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBranchInput {
    #[validate(length(min = 2, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 9, max = 20))]
    pub phone: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

/// The branch code is immutable once created.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateBranchInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 9, max = 20))]
    pub phone: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}
