//! Existence and state checks run before every mutation
//!
//! Each guard either returns the loaded entity or the localized error the
//! boundary shows to the user.

use shared::{Branch, Customer, CustomerGroup, Order, OrderStatus, PaymentMethod, Product};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::repository::Store;

pub async fn require_branch(store: &dyn Store, branch_id: Uuid) -> AppResult<Branch> {
    store
        .find_branch(branch_id)
        .await?
        .ok_or_else(|| AppError::not_found("Branch", "ไม่พบสาขาที่ระบุ"))
}

/// Customer must exist and be registered at `branch_id`
pub async fn require_customer_in_branch(
    store: &dyn Store,
    customer_id: Uuid,
    branch_id: Uuid,
) -> AppResult<Customer> {
    let customer = store
        .find_customer(customer_id)
        .await?
        .ok_or_else(|| AppError::not_found("Customer", "ไม่พบลูกค้าที่ระบุ"))?;

    if customer.branch_id != branch_id {
        return Err(AppError::not_found("Customer", "ลูกค้าไม่ได้อยู่ในสาขานี้"));
    }
    Ok(customer)
}

pub async fn require_customer_group(store: &dyn Store, group_id: Uuid) -> AppResult<CustomerGroup> {
    store
        .find_customer_group(group_id)
        .await?
        .ok_or_else(|| AppError::not_found("CustomerGroup", "ไม่พบกลุ่มลูกค้า"))
}

pub async fn require_product(store: &dyn Store, product_id: Uuid) -> AppResult<Product> {
    store
        .find_product(product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product", "ไม่พบสินค้าในระบบ"))
}

/// Retired products are treated as missing
pub async fn require_active_product(store: &dyn Store, product_id: Uuid) -> AppResult<Product> {
    let product = require_product(store, product_id).await?;
    if !product.state.is_active() {
        return Err(AppError::not_found("Product", "ไม่พบสินค้าในระบบ"));
    }
    Ok(product)
}

pub async fn require_payment_method(
    store: &dyn Store,
    payment_method_id: Uuid,
) -> AppResult<PaymentMethod> {
    store
        .find_payment_method(payment_method_id)
        .await?
        .ok_or_else(|| AppError::not_found("PaymentMethod", "ไม่พบประเภทการชำระเงินนี้"))
}

pub async fn require_order(store: &dyn Store, order_id: Uuid) -> AppResult<Order> {
    store
        .find_order(order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order", "ไม่พบรายการนี้"))
}

/// Orders past PENDING are reported as missing
pub async fn require_pending_order(store: &dyn Store, order_id: Uuid) -> AppResult<Order> {
    let order = require_order(store, order_id).await?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::not_found("Order", "ไม่พบรายการนี้"));
    }
    Ok(order)
}
