//! Delivery service: shipments of orders, driver assignment and settlement
//! of deposited orders on hand-over

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    validate_non_negative_amount, AddDriversInput, CompleteDeliveryInput, CreateDeliveryInput,
    Delivery, DeliveryDriver, DeliveryFilter, DeliveryStatus, DeliveryWithDrivers, OrderStatus,
    OrderType, PaymentOrderSlip, User, UserRole, UserStatus,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::storage::{decode_slip, SLIP_FOLDER};
use crate::external::FileStorage;
use crate::repository::{DeliveryPayment, DeliverySettlement, Store};
use crate::services::guards;

/// Delivery service
#[derive(Clone)]
pub struct DeliveryService {
    store: Arc<dyn Store>,
    storage: Arc<dyn FileStorage>,
    max_slip_bytes: usize,
}

impl DeliveryService {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn FileStorage>, max_slip_bytes: usize) -> Self {
        Self {
            store,
            storage,
            max_slip_bytes,
        }
    }

    /// Record the shipment of an order that is not yet completed
    pub async fn create_delivery(
        &self,
        order_id: Uuid,
        input: CreateDeliveryInput,
    ) -> AppResult<DeliveryWithDrivers> {
        input.validate()?;
        validate_non_negative_amount(input.fee)
            .map_err(|msg| AppError::validation("fee", msg, "ค่าขนส่งต้องไม่ติดลบ"))?;
        validate_non_negative_amount(input.distance)
            .map_err(|msg| AppError::validation("distance", msg, "ระยะทางต้องไม่ติดลบ"))?;

        let order = self
            .store
            .find_order(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Order", "ไม่พบบิลนี้"))?;
        if order.status == OrderStatus::Completed {
            return Err(AppError::InvalidStateTransition {
                message: "Order is already completed".to_string(),
                message_th: "บิลนี้จบการขายแล้ว".to_string(),
            });
        }
        if self.store.find_delivery(order_id).await?.is_some() {
            return Err(AppError::conflict(
                "deliveries_pkey",
                "Delivery already recorded for this order",
                "บิลนี้ได้มีการบันทึกจัดทำขนส่งแล้ว",
            ));
        }

        let address = match input.address {
            Some(address) => address,
            None => self
                .store
                .find_customer(order.customer_id)
                .await?
                .and_then(|c| c.address)
                .ok_or_else(|| AppError::not_found("Address", "ไม่พบที่อยู่เดิมของลูกค้า"))?,
        };

        let delivery = Delivery {
            order_id,
            track_number: input.track_number,
            distance: input.distance,
            address,
            kind: input.kind,
            location: input.location,
            note: input.note,
            send_date: input.send_date,
            fee: input.fee,
            status: DeliveryStatus::Pending,
            delivered_at: None,
            created_at: Utc::now(),
        };
        self.store.insert_delivery(&delivery).await?;

        tracing::info!(order_id = %order_id, kind = delivery.kind.as_str(), fee = %delivery.fee, "Delivery created");
        Ok(DeliveryWithDrivers {
            delivery,
            drivers: Vec::new(),
        })
    }

    /// Assign transporters of the order's branch to a pending delivery
    pub async fn add_drivers(
        &self,
        order_id: Uuid,
        input: AddDriversInput,
    ) -> AppResult<DeliveryWithDrivers> {
        let mut user_ids = input.user_ids;
        user_ids.sort();
        user_ids.dedup();
        if user_ids.is_empty() {
            return Err(AppError::validation(
                "user_ids",
                "At least one driver is required",
                "ต้องมีคนขนส่งอย่างน้อย 1 คน",
            ));
        }

        let existing = self
            .store
            .find_delivery(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Delivery", "ไม่พบข้อมูลการขนส่ง"))?;
        if existing.delivery.status == DeliveryStatus::Delivered {
            return Err(AppError::InvalidStateTransition {
                message: "Delivery is already delivered".to_string(),
                message_th: "บิลนี้ถูกจัดส่งแล้ว".to_string(),
            });
        }
        let order = guards::require_order(self.store.as_ref(), order_id).await?;

        let users = self.store.find_users(&user_ids).await?;
        let missing: Vec<String> = user_ids
            .iter()
            .filter(|id| {
                !users
                    .iter()
                    .any(|u| u.id == **id && is_available_transporter(u, order.branch_id))
            })
            .map(|id| id.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::not_found(
                "User",
                format!("ไม่พบผู้ใช้: {}", missing.join(", ")),
            ));
        }

        let now = Utc::now();
        let drivers: Vec<DeliveryDriver> = user_ids
            .iter()
            .map(|user_id| DeliveryDriver {
                order_id,
                user_id: *user_id,
                assigned_at: now,
            })
            .collect();
        self.store.insert_drivers(&drivers).await?;

        tracing::info!(order_id = %order_id, drivers = drivers.len(), "Drivers assigned");
        self.store
            .find_delivery(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Delivery", "ไม่พบข้อมูลการขนส่ง"))
    }

    /// Mark a delivery as handed over. For deposited orders the balance is
    /// collected here and the order completes.
    pub async fn complete_delivery(
        &self,
        order_id: Uuid,
        input: CompleteDeliveryInput,
    ) -> AppResult<DeliveryWithDrivers> {
        input.validate()?;

        let existing = self
            .store
            .find_delivery(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Delivery", "ไม่พบข้อมูลการขนส่ง"))?;
        if existing.delivery.status == DeliveryStatus::Delivered {
            return Err(AppError::InvalidStateTransition {
                message: "Delivery is already finished".to_string(),
                message_th: "ขนส่งนี้เสร็จสิ้นแล้ว ไม่สามารถเปลี่ยนสถานะได้".to_string(),
            });
        }
        let order = guards::require_order(self.store.as_ref(), order_id).await?;

        let now = Utc::now();
        let collects_balance = order.order_type == Some(OrderType::Deposited)
            && order.status != OrderStatus::Completed;

        let payment = if collects_balance {
            let upload = input.slip_image.as_ref().ok_or_else(|| {
                AppError::validation(
                    "slip_image",
                    "Payment evidence is required",
                    "ไม่มีหลักฐานการชำระเงิน",
                )
            })?;
            let paid = self
                .store
                .find_payment(order_id)
                .await?
                .ok_or_else(|| AppError::not_found("PaymentOrder", "ไม่พบการชำระเงินบิลนี้"))?;

            let total = order.total_price.unwrap_or(Decimal::ZERO);
            let deposit = paid.deposit.unwrap_or(Decimal::ZERO);

            let bytes = decode_slip(upload, self.max_slip_bytes)?;
            let image_url = self
                .storage
                .save(SLIP_FOLDER, &upload.file_name, bytes)
                .await?;

            Some(DeliveryPayment {
                amount_received: total - deposit,
                paid_at: now,
                slip: PaymentOrderSlip {
                    id: Uuid::new_v4(),
                    order_id,
                    image_url,
                    created_at: now,
                },
            })
        } else {
            None
        };

        let settlement = DeliverySettlement {
            order_id,
            delivered_at: now,
            payment,
        };
        if let Err(err) = self.store.settle_delivery(&settlement).await {
            if let Some(collected) = &settlement.payment {
                if let Err(remove_err) = self.storage.remove(&collected.slip.image_url).await {
                    tracing::warn!(path = %collected.slip.image_url, error = %remove_err, "Failed to remove orphaned slip");
                }
            }
            return Err(err);
        }

        tracing::info!(
            order_id = %order_id,
            balance_collected = settlement.payment.is_some(),
            "Delivery completed"
        );
        self.store
            .find_delivery(order_id)
            .await?
            .ok_or_else(|| AppError::not_found("Delivery", "ไม่พบข้อมูลการขนส่ง"))
    }

    pub async fn list_deliveries_by_branch(
        &self,
        branch_id: Uuid,
        filter: DeliveryFilter,
        caller: Uuid,
    ) -> AppResult<Vec<DeliveryWithDrivers>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;
        self.store.list_deliveries(branch_id, &filter, caller).await
    }

    /// Active transporters of the branch without an undelivered assignment
    pub async fn list_available_drivers(&self, branch_id: Uuid) -> AppResult<Vec<User>> {
        guards::require_branch(self.store.as_ref(), branch_id).await?;

        let busy = self.store.busy_driver_ids(branch_id).await?;
        let drivers = self
            .store
            .list_users_by_role(branch_id, UserRole::Transporter)
            .await?;
        Ok(drivers
            .into_iter()
            .filter(|u| !busy.contains(&u.id))
            .collect())
    }
}

fn is_available_transporter(user: &User, branch_id: Uuid) -> bool {
    user.role == UserRole::Transporter
        && user.status == UserStatus::Active
        && user.branch_id == Some(branch_id)
}
