//! Order lifecycle engine
//!
//! Orders are opened PENDING, confirmed exactly once (payment, stock-out and
//! status written together) or deleted while still PENDING.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    line_total, validate_non_negative_amount, ConfirmOrderInput, CreateOrderInput, Order,
    OrderDetail, OrderFilter, OrderItemInput, OrderStatus, PaymentOrder, PaymentOrderSlip,
    SlipUpload,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::storage::{decode_slip, SLIP_FOLDER};
use crate::external::FileStorage;
use crate::repository::{OrderConfirmation, OrderScope, StockOutLine, Store};
use crate::services::guards;

/// Price of a confirmed order: lines, plus the delivery fee, minus the
/// discount. `None` when the amount leaves the `Decimal` range.
pub fn order_total(
    items: &[OrderItemInput],
    delivery_fee: Decimal,
    discount: Option<Decimal>,
) -> Option<Decimal> {
    line_total(items.iter().map(|i| (&i.sell_price, i.quantity)))?
        .checked_add(delivery_fee)?
        .checked_sub(discount.unwrap_or(Decimal::ZERO))
}

/// Requested quantity per product, duplicate lines summed. `None` when a
/// product's sum overflows.
pub fn required_quantities(items: &[OrderItemInput]) -> Option<BTreeMap<Uuid, i32>> {
    let mut required: BTreeMap<Uuid, i32> = BTreeMap::new();
    for item in items {
        let entry = required.entry(item.product_id).or_insert(0);
        *entry = entry.checked_add(item.quantity)?;
    }
    Some(required)
}

/// Order service
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    storage: Arc<dyn FileStorage>,
    max_slip_bytes: usize,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn FileStorage>, max_slip_bytes: usize) -> Self {
        Self {
            store,
            storage,
            max_slip_bytes,
        }
    }

    /// Open a PENDING order for a customer of the branch
    pub async fn create_order(&self, user_id: Uuid, input: CreateOrderInput) -> AppResult<Order> {
        input.validate()?;

        guards::require_branch(self.store.as_ref(), input.branch_id).await?;
        guards::require_customer_in_branch(self.store.as_ref(), input.customer_id, input.branch_id)
            .await?;

        if self
            .store
            .order_exists(input.customer_id, user_id, input.branch_id, &input.order_code)
            .await?
        {
            return Err(AppError::conflict(
                "order",
                "Order already exists for this customer, user, branch and code",
                "รายการนี้ถูกสร้างแล้ว",
            ));
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_id: input.customer_id,
            user_id,
            branch_id: input.branch_id,
            order_code: input.order_code,
            status: OrderStatus::Pending,
            order_type: None,
            total_price: None,
            note: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_order(&order).await?;

        tracing::info!(order_id = %order.id, branch_id = %order.branch_id, user_id = %user_id, "Order created");
        Ok(order)
    }

    /// Settle a PENDING order: record the payment, take the items out of
    /// stock and move the order to COMPLETED or UNPAID
    pub async fn confirm_order(&self, input: ConfirmOrderInput) -> AppResult<OrderDetail> {
        input.validate()?;
        if input.order_items.is_empty() {
            return Err(AppError::validation(
                "order_items",
                "At least one order item is required",
                "ไม่มีรายละเอียดสินค้า",
            ));
        }
        for (index, item) in input.order_items.iter().enumerate() {
            validate_non_negative_amount(item.sell_price).map_err(|msg| {
                AppError::validation(
                    format!("order_items[{}].sell_price", index),
                    msg,
                    "ราคาขายต้องไม่ติดลบ",
                )
            })?;
        }
        let plan = input.payment_plan()?;
        if let Some(discount) = input.discount {
            validate_non_negative_amount(discount)
                .map_err(|msg| AppError::validation("discount", msg, "ส่วนลดต้องไม่ติดลบ"))?;
        }

        let store = self.store.as_ref();
        let order = guards::require_pending_order(store, input.order_id).await?;
        guards::require_payment_method(store, input.payment_method_id).await?;

        // Pre-pass over every distinct product; the repository repeats the
        // quantity check atomically while decrementing
        let required = required_quantities(&input.order_items)
            .ok_or_else(|| AppError::quantity_out_of_range("order_items"))?;
        for (product_id, quantity) in required {
            let product = guards::require_active_product(store, product_id).await?;

            if store.find_sell_price(product_id, order.branch_id).await?.is_none() {
                return Err(AppError::not_found(
                    "ProductSaleBranch",
                    format!("สินค้า {} ยังไม่ได้กำหนดราคา", product.name),
                ));
            }

            let stock = store
                .find_stock(product_id, order.branch_id)
                .await?
                .ok_or_else(|| {
                    AppError::not_found("Stock", format!("ไม่พบสินค้า {} ใน Stock", product.name))
                })?;
            if stock.quantity < quantity {
                return Err(AppError::insufficient_stock());
            }
        }

        let delivery_fee = store
            .find_delivery(order.id)
            .await?
            .map(|d| d.delivery.fee)
            .unwrap_or(Decimal::ZERO);
        let total_price = order_total(&input.order_items, delivery_fee, input.discount)
            .ok_or_else(|| AppError::amount_out_of_range("order_items"))?;
        if total_price < Decimal::ZERO {
            return Err(AppError::validation(
                "discount",
                "Discount exceeds the order total",
                "ส่วนลดมากกว่ายอดรวม",
            ));
        }

        let now = Utc::now();
        let slip = match &input.slip_image {
            Some(upload) => Some(self.save_slip(order.id, upload).await?),
            None => None,
        };

        let confirmation = OrderConfirmation {
            order_id: order.id,
            branch_id: order.branch_id,
            status: plan.confirmed_status(),
            order_type: plan.order_type(),
            total_price,
            payment: PaymentOrder::from_plan(
                order.id,
                input.payment_method_id,
                &plan,
                input.discount,
                input.note.clone(),
                now,
            ),
            slip: slip.clone(),
            lines: input
                .order_items
                .iter()
                .map(|item| StockOutLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    sell_price: item.sell_price,
                })
                .collect(),
            note: input.note,
            confirmed_at: now,
        };

        if let Err(err) = store.apply_confirmation(&confirmation).await {
            if let Some(slip) = &slip {
                self.discard_slip(&slip.image_url).await;
            }
            return Err(err);
        }

        tracing::info!(
            order_id = %order.id,
            branch_id = %order.branch_id,
            order_type = confirmation.order_type.as_str(),
            status = confirmation.status.as_str(),
            total_price = %total_price,
            "Order confirmed"
        );

        self.get_order(order.id).await
    }

    /// Delete an order that never left PENDING
    pub async fn cancel_order(&self, order_id: Uuid) -> AppResult<()> {
        guards::require_pending_order(self.store.as_ref(), order_id).await?;

        if !self.store.delete_pending_order(order_id).await? {
            return Err(AppError::not_found("Order", "ไม่พบรายการนี้"));
        }

        tracing::info!(order_id = %order_id, "Order canceled");
        Ok(())
    }

    pub async fn get_order(&self, order_id: Uuid) -> AppResult<OrderDetail> {
        let order = guards::require_order(self.store.as_ref(), order_id).await?;
        self.detail(order).await
    }

    pub async fn list_orders_by_branch(
        &self,
        branch_id: Uuid,
        filter: OrderFilter,
    ) -> AppResult<Vec<OrderDetail>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;
        self.list(OrderScope::Branch(branch_id), &filter).await
    }

    pub async fn list_orders_by_user(
        &self,
        user_id: Uuid,
        filter: OrderFilter,
    ) -> AppResult<Vec<OrderDetail>> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(AppError::not_found("User", "ไม่พบผู้ใช้"));
        }
        self.list(OrderScope::User(user_id), &filter).await
    }

    async fn list(&self, scope: OrderScope, filter: &OrderFilter) -> AppResult<Vec<OrderDetail>> {
        let orders = self.store.list_orders(scope, filter).await?;
        let mut details = Vec::with_capacity(orders.len());
        for order in orders {
            details.push(self.detail(order).await?);
        }
        Ok(details)
    }

    async fn detail(&self, order: Order) -> AppResult<OrderDetail> {
        let customer = self.store.find_customer(order.customer_id).await?;
        let payment = self.store.find_payment(order.id).await?;
        let slips = self.store.list_slips(order.id).await?;
        let stock_outs = self.store.list_order_stock_outs(order.id).await?;
        let delivery = self.store.find_delivery(order.id).await?;

        Ok(OrderDetail {
            order,
            customer,
            payment,
            slips,
            stock_outs,
            delivery,
        })
    }

    async fn save_slip(&self, order_id: Uuid, upload: &SlipUpload) -> AppResult<PaymentOrderSlip> {
        let bytes = decode_slip(upload, self.max_slip_bytes)?;
        let image_url = self
            .storage
            .save(SLIP_FOLDER, &upload.file_name, bytes)
            .await?;

        Ok(PaymentOrderSlip {
            id: Uuid::new_v4(),
            order_id,
            image_url,
            created_at: Utc::now(),
        })
    }

    async fn discard_slip(&self, path: &str) {
        if let Err(err) = self.storage.remove(path).await {
            tracing::warn!(path = %path, error = %err, "Failed to remove orphaned slip");
        }
    }
}
