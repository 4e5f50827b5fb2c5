//! Stock and stock-in ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::DateRange;

/// On-hand quantity of a product at a branch. Quantity never drops below 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stock {
    pub id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

/// Stock row joined with product identity for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockWithProduct {
    #[serde(flatten)]
    pub stock: Stock,
    pub product_code: String,
    pub product_name: String,
}

/// Who reversed a stock-in and why
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockInCancellation {
    pub canceled_by: Uuid,
    pub canceled_at: DateTime<Utc>,
    pub cancel_note: String,
}

/// Inbound receipt header. Never deleted; a cancellation reverses the stock
/// increments and is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockInHistory {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub user_id: Uuid,
    pub ref_code: String,
    pub distributor: String,
    /// Sum of cost price times quantity; informational only
    pub total_price: Decimal,
    pub note: Option<String>,
    pub cancellation: Option<StockInCancellation>,
    pub items: Vec<StockInItem>,
    pub created_at: DateTime<Utc>,
}

impl StockInHistory {
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_some()
    }
}

/// One received line of a stock-in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockInItem {
    pub id: Uuid,
    pub stock_in_history_id: Uuid,
    pub stock_id: Uuid,
    pub product_id: Uuid,
    pub cost_price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct StockInItemInput {
    pub product_id: Uuid,
    pub cost_price: Decimal,
    #[validate(range(min = 1, max = 1_000_000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordStockInInput {
    pub branch_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub ref_code: String,
    #[validate(length(min = 1, max = 200))]
    pub distributor: String,
    #[validate]
    pub items: Vec<StockInItemInput>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CancelStockInInput {
    #[validate(length(min = 1, max = 1000))]
    pub cancel_note: String,
}

/// Filters for stock-in listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockInFilter {
    pub ref_code: Option<String>,
    pub distributor: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_canceled: Option<bool>,
}

impl StockInFilter {
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    pub fn matches(&self, history: &StockInHistory) -> bool {
        self.ref_code
            .as_deref()
            .map_or(true, |code| history.ref_code.contains(code))
            && self
                .distributor
                .as_deref()
                .map_or(true, |name| history.distributor.contains(name))
            && self
                .is_canceled
                .map_or(true, |canceled| history.is_canceled() == canceled)
            && self.date_range().contains(history.created_at)
    }
}
