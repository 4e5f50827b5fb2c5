//! Catalog models: categories, products, per-branch prices and payment methods

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// A product category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 2, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Replaces both the code and the name
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 2, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

/// Selling unit of a product
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductUnit {
    Piece,
    Box,
    Pack,
    Bottle,
    Bag,
    Kilogram,
    Litre,
}

impl ProductUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductUnit::Piece => "PIECE",
            ProductUnit::Box => "BOX",
            ProductUnit::Pack => "PACK",
            ProductUnit::Bottle => "BOTTLE",
            ProductUnit::Bag => "BAG",
            ProductUnit::Kilogram => "KILOGRAM",
            ProductUnit::Litre => "LITRE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PIECE" => Some(ProductUnit::Piece),
            "BOX" => Some(ProductUnit::Box),
            "PACK" => Some(ProductUnit::Pack),
            "BOTTLE" => Some(ProductUnit::Bottle),
            "BAG" => Some(ProductUnit::Bag),
            "KILOGRAM" => Some(ProductUnit::Kilogram),
            "LITRE" => Some(ProductUnit::Litre),
            _ => None,
        }
    }
}

/// Lifecycle of a product. Products referenced by stock or orders are never
/// removed, only retired.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProductState {
    Active,
    Retired { retired_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("product is already retired")]
    AlreadyRetired,
    #[error("product is already active")]
    AlreadyActive,
}

impl LifecycleError {
    pub fn message_th(&self) -> &'static str {
        match self {
            LifecycleError::AlreadyRetired => "สินค้านี้ถูกลบไปแล้ว",
            LifecycleError::AlreadyActive => "สินค้านี้ยังใช้งานอยู่",
        }
    }
}

impl ProductState {
    /// Rebuild the state from the persisted `deleted_at` column
    pub fn from_retired_at(retired_at: Option<DateTime<Utc>>) -> Self {
        match retired_at {
            Some(retired_at) => ProductState::Retired { retired_at },
            None => ProductState::Active,
        }
    }

    pub fn retired_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ProductState::Active => None,
            ProductState::Retired { retired_at } => Some(*retired_at),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ProductState::Active)
    }

    pub fn retire(self, at: DateTime<Utc>) -> Result<Self, LifecycleError> {
        match self {
            ProductState::Active => Ok(ProductState::Retired { retired_at: at }),
            ProductState::Retired { .. } => Err(LifecycleError::AlreadyRetired),
        }
    }

    pub fn restore(self) -> Result<Self, LifecycleError> {
        match self {
            ProductState::Retired { .. } => Ok(ProductState::Active),
            ProductState::Active => Err(LifecycleError::AlreadyActive),
        }
    }
}

/// A sellable product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub barcode: String,
    pub name: String,
    pub unit: ProductUnit,
    pub category_id: Uuid,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub state: ProductState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 2, max = 20))]
    pub code: String,
    #[validate(length(min = 8, max = 14))]
    pub barcode: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub unit: ProductUnit,
    pub category_id: Uuid,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// Full replacement of a product's descriptive fields. The lifecycle moves
/// only through retire and restore.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 2, max = 20))]
    pub code: String,
    #[validate(length(min = 8, max = 14))]
    pub barcode: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub unit: ProductUnit,
    pub category_id: Uuid,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// Per-branch sell price of a product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSaleBranch {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub sell_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetSellPriceInput {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub sell_price: Decimal,
}

/// Active product as seen from one branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchProduct {
    #[serde(flatten)]
    pub product: Product,
    pub sell_price: Option<Decimal>,
    pub quantity: Option<i32>,
}

/// Accepted payment method (cash, transfer, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePaymentMethodInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdatePaymentMethodInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}
