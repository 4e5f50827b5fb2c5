//! Stock ledger
//!
//! Stock rows only move through stock-in receipts (up), their cancellation
//! (down) and order confirmation (down, see the order service).

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    line_total, validate_non_negative_amount, CancelStockInInput, RecordStockInInput,
    StockInCancellation, StockInFilter, StockInHistory, StockInItemInput, StockOutHistory,
    StockWithProduct,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::repository::{NewStockIn, Store};
use crate::services::guards;

/// Informational value of a receipt: cost price times quantity. `None` when
/// it does not fit a `Decimal`.
pub fn stock_in_total(items: &[StockInItemInput]) -> Option<Decimal> {
    line_total(items.iter().map(|i| (&i.cost_price, i.quantity)))
}

/// Stock service
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn Store>,
}

impl StockService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record an inbound receipt and raise each product's stock
    pub async fn record_stock_in(
        &self,
        user_id: Uuid,
        input: RecordStockInInput,
    ) -> AppResult<StockInHistory> {
        input.validate()?;
        if input.items.is_empty() {
            return Err(AppError::validation(
                "items",
                "At least one item is required",
                "ไม่มีรายละเอียดสินค้า",
            ));
        }
        for (index, item) in input.items.iter().enumerate() {
            validate_non_negative_amount(item.cost_price).map_err(|msg| {
                AppError::validation(
                    format!("items[{}].cost_price", index),
                    msg,
                    "ราคาทุนต้องไม่ติดลบ",
                )
            })?;
        }

        let store = self.store.as_ref();
        guards::require_branch(store, input.branch_id).await?;

        let product_ids: BTreeSet<Uuid> = input.items.iter().map(|i| i.product_id).collect();
        for product_id in product_ids {
            guards::require_active_product(store, product_id).await?;
        }

        if store.ref_code_exists(input.branch_id, &input.ref_code).await? {
            return Err(AppError::conflict(
                "stock_in_histories_branch_ref_code_key",
                "Reference code already used",
                "เลขที่บิลนำเข้านี้ถูกใช้แล้ว",
            ));
        }

        let total_price = stock_in_total(&input.items)
            .ok_or_else(|| AppError::amount_out_of_range("items"))?;
        let stock_in = NewStockIn {
            id: Uuid::new_v4(),
            branch_id: input.branch_id,
            user_id,
            ref_code: input.ref_code,
            distributor: input.distributor,
            total_price,
            note: input.note,
            items: input.items,
            created_at: Utc::now(),
        };
        let history = store.record_stock_in(&stock_in).await?;

        tracing::info!(
            stock_in_id = %history.id,
            branch_id = %history.branch_id,
            ref_code = %history.ref_code,
            items = history.items.len(),
            "Stock-in recorded"
        );
        Ok(history)
    }

    /// Reverse a receipt. The header is kept and marked canceled.
    pub async fn cancel_stock_in(
        &self,
        branch_id: Uuid,
        stock_in_id: Uuid,
        user_id: Uuid,
        input: CancelStockInInput,
    ) -> AppResult<StockInHistory> {
        input.validate()?;

        let store = self.store.as_ref();
        guards::require_branch(store, branch_id).await?;

        let existing = store
            .find_stock_in(stock_in_id)
            .await?
            .filter(|h| h.branch_id == branch_id && !h.is_canceled())
            .ok_or_else(|| AppError::not_found("StockInHistory", "ไม่พบบิลนำเข้า"))?;

        let cancellation = StockInCancellation {
            canceled_by: user_id,
            canceled_at: Utc::now(),
            cancel_note: input.cancel_note,
        };
        let history = store.cancel_stock_in(existing.id, &cancellation).await?;

        tracing::info!(stock_in_id = %history.id, branch_id = %branch_id, canceled_by = %user_id, "Stock-in canceled");
        Ok(history)
    }

    pub async fn list_stocks_by_branch(&self, branch_id: Uuid) -> AppResult<Vec<StockWithProduct>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;
        self.store.list_stocks(branch_id).await
    }

    pub async fn list_stock_in_histories(
        &self,
        branch_id: Uuid,
        filter: StockInFilter,
    ) -> AppResult<Vec<StockInHistory>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;
        self.store.list_stock_ins(branch_id, &filter).await
    }

    pub async fn list_stock_out_histories(&self, branch_id: Uuid) -> AppResult<Vec<StockOutHistory>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;
        self.store.list_branch_stock_outs(branch_id).await
    }
}
