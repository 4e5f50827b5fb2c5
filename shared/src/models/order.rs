//! Order, payment and stock-out models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use super::{Customer, DeliveryWithDrivers};
use crate::types::DateRange;
use crate::validation::{validate_non_negative_amount, validate_positive_amount};

/// Order status. PENDING orders never touched stock; confirmation moves
/// them forward exactly once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Unpaid,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Unpaid => "UNPAID",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "UNPAID" => Some(OrderStatus::Unpaid),
            "COMPLETED" => Some(OrderStatus::Completed),
            _ => None,
        }
    }
}

/// How an order is settled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    FullPayment,
    CreditUsed,
    Deposited,
    DepositedCreditUsed,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::FullPayment => "FULL_PAYMENT",
            OrderType::CreditUsed => "CREDIT_USED",
            OrderType::Deposited => "DEPOSITED",
            OrderType::DepositedCreditUsed => "DEPOSITED_CREDIT_USED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FULL_PAYMENT" => Some(OrderType::FullPayment),
            "CREDIT_USED" => Some(OrderType::CreditUsed),
            "DEPOSITED" => Some(OrderType::Deposited),
            "DEPOSITED_CREDIT_USED" => Some(OrderType::DepositedCreditUsed),
            _ => None,
        }
    }
}

/// A sales order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub user_id: Uuid,
    pub branch_id: Uuid,
    pub order_code: String,
    pub status: OrderStatus,
    /// Set on confirmation
    pub order_type: Option<OrderType>,
    /// Set on confirmation
    pub total_price: Option<Decimal>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub customer_id: Uuid,
    pub branch_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub order_code: String,
}

/// One requested line of a confirmation
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub sell_price: Decimal,
    #[validate(range(min = 1, max = 1_000_000))]
    pub quantity: i32,
}

/// Base64 encoded image sent as payment evidence
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SlipUpload {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1))]
    pub data: String,
}

/// Confirmation request as received on the wire. The payment fields are
/// folded into a [`PaymentPlan`] before the order engine sees them.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConfirmOrderInput {
    pub order_id: Uuid,
    #[validate]
    pub order_items: Vec<OrderItemInput>,
    pub order_type: Option<String>,
    pub payment_method_id: Uuid,
    pub amount_received: Option<Decimal>,
    pub change: Option<Decimal>,
    /// Credit term in days
    pub credit: Option<i32>,
    pub deposit: Option<Decimal>,
    pub discount: Option<Decimal>,
    #[validate]
    pub slip_image: Option<SlipUpload>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

impl ConfirmOrderInput {
    pub fn payment_plan(&self) -> Result<PaymentPlan, PaymentPlanError> {
        PaymentPlan::from_wire(
            self.order_type.as_deref(),
            self.amount_received,
            self.change,
            self.credit,
            self.deposit,
        )
    }
}

/// Settlement terms chosen at confirmation. Each variant carries exactly the
/// fields its order type needs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "order_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentPlan {
    FullPayment {
        amount_received: Decimal,
        change: Decimal,
    },
    CreditUsed {
        credit_days: i32,
    },
    Deposited {
        deposit: Decimal,
    },
    DepositedCreditUsed {
        credit_days: i32,
        deposit: Decimal,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaymentPlanError {
    #[error("credit days must be greater than 0")]
    NonPositiveCredit,
    #[error("deposit must be greater than 0")]
    NonPositiveDeposit,
    #[error("amount received must be greater than 0")]
    NonPositiveAmountReceived,
    #[error("change cannot be negative")]
    NegativeChange,
    #[error("payment processing error: unknown order type {0}")]
    UnknownOrderType(String),
    #[error("payment processing error: order type is required")]
    MissingOrderType,
}

impl PaymentPlanError {
    pub fn field(&self) -> &'static str {
        match self {
            PaymentPlanError::NonPositiveCredit => "credit",
            PaymentPlanError::NonPositiveDeposit => "deposit",
            PaymentPlanError::NonPositiveAmountReceived => "amount_received",
            PaymentPlanError::NegativeChange => "change",
            PaymentPlanError::UnknownOrderType(_) | PaymentPlanError::MissingOrderType => {
                "order_type"
            }
        }
    }

    pub fn message_th(&self) -> &'static str {
        match self {
            PaymentPlanError::NonPositiveCredit => "จำนวนวัน Credit ต้องมากกว่า 0",
            PaymentPlanError::NonPositiveDeposit => "จำนวนเงินมัดจำ ต้องมากกว่า 0",
            PaymentPlanError::NonPositiveAmountReceived => "จำนวนเงินที่จ่าย ต้องมากกว่า 0",
            PaymentPlanError::NegativeChange => "เงินทอนต้องไม่ติดลบ",
            PaymentPlanError::UnknownOrderType(_) | PaymentPlanError::MissingOrderType => {
                "การชำระเงินผิดพลาด"
            }
        }
    }
}

impl PaymentPlan {
    /// Fold the loose wire fields into a plan. Fields that do not belong to
    /// the selected order type are ignored.
    pub fn from_wire(
        order_type: Option<&str>,
        amount_received: Option<Decimal>,
        change: Option<Decimal>,
        credit: Option<i32>,
        deposit: Option<Decimal>,
    ) -> Result<Self, PaymentPlanError> {
        let credit_days = || match credit {
            Some(days) if days > 0 => Ok(days),
            _ => Err(PaymentPlanError::NonPositiveCredit),
        };
        let deposit_amount = || {
            deposit
                .filter(|amount| validate_positive_amount(*amount).is_ok())
                .ok_or(PaymentPlanError::NonPositiveDeposit)
        };

        let order_type = order_type.ok_or(PaymentPlanError::MissingOrderType)?;
        match OrderType::parse(order_type) {
            Some(OrderType::FullPayment) => {
                let amount_received = amount_received
                    .filter(|amount| validate_positive_amount(*amount).is_ok())
                    .ok_or(PaymentPlanError::NonPositiveAmountReceived)?;
                let change = change.unwrap_or(Decimal::ZERO);
                validate_non_negative_amount(change)
                    .map_err(|_| PaymentPlanError::NegativeChange)?;
                Ok(PaymentPlan::FullPayment {
                    amount_received,
                    change,
                })
            }
            Some(OrderType::CreditUsed) => Ok(PaymentPlan::CreditUsed {
                credit_days: credit_days()?,
            }),
            Some(OrderType::Deposited) => Ok(PaymentPlan::Deposited {
                deposit: deposit_amount()?,
            }),
            Some(OrderType::DepositedCreditUsed) => Ok(PaymentPlan::DepositedCreditUsed {
                credit_days: credit_days()?,
                deposit: deposit_amount()?,
            }),
            None => Err(PaymentPlanError::UnknownOrderType(order_type.to_string())),
        }
    }

    pub fn order_type(&self) -> OrderType {
        match self {
            PaymentPlan::FullPayment { .. } => OrderType::FullPayment,
            PaymentPlan::CreditUsed { .. } => OrderType::CreditUsed,
            PaymentPlan::Deposited { .. } => OrderType::Deposited,
            PaymentPlan::DepositedCreditUsed { .. } => OrderType::DepositedCreditUsed,
        }
    }

    /// Status the order takes once confirmed under this plan
    pub fn confirmed_status(&self) -> OrderStatus {
        match self {
            PaymentPlan::FullPayment { .. } => OrderStatus::Completed,
            _ => OrderStatus::Unpaid,
        }
    }
}

/// Financial settlement record, one per confirmed order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrder {
    pub order_id: Uuid,
    pub payment_method_id: Uuid,
    pub amount_received: Option<Decimal>,
    pub change: Option<Decimal>,
    pub credit_days: Option<i32>,
    pub deposit: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentOrder {
    /// Build the payment row for a plan. Only the fields of the plan are set;
    /// `paid_at` is stamped for full payments.
    pub fn from_plan(
        order_id: Uuid,
        payment_method_id: Uuid,
        plan: &PaymentPlan,
        discount: Option<Decimal>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut payment = PaymentOrder {
            order_id,
            payment_method_id,
            amount_received: None,
            change: None,
            credit_days: None,
            deposit: None,
            discount,
            paid_at: None,
            note,
            created_at: now,
        };

        match *plan {
            PaymentPlan::FullPayment {
                amount_received,
                change,
            } => {
                payment.amount_received = Some(amount_received);
                payment.change = Some(change);
                payment.paid_at = Some(now);
            }
            PaymentPlan::CreditUsed { credit_days } => payment.credit_days = Some(credit_days),
            PaymentPlan::Deposited { deposit } => payment.deposit = Some(deposit),
            PaymentPlan::DepositedCreditUsed {
                credit_days,
                deposit,
            } => {
                payment.credit_days = Some(credit_days);
                payment.deposit = Some(deposit);
            }
        }

        payment
    }
}

/// Evidence image attached to a payment; append-only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentOrderSlip {
    pub id: Uuid,
    pub order_id: Uuid,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockOutType {
    Sale,
}

impl StockOutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockOutType::Sale => "SALE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SALE" => Some(StockOutType::Sale),
            _ => None,
        }
    }
}

/// Outbound ledger row, one per confirmed order line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockOutHistory {
    pub id: Uuid,
    pub order_id: Uuid,
    pub stock_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub sell_price: Decimal,
    pub kind: StockOutType,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filters for order listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    /// Substring of the order code
    pub order_code: Option<String>,
    pub order_type: Option<OrderType>,
    pub status: Option<OrderStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl OrderFilter {
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.order_code
            .as_deref()
            .map_or(true, |code| order.order_code.contains(code))
            && self
                .order_type
                .map_or(true, |kind| order.order_type == Some(kind))
            && self.status.map_or(true, |status| order.status == status)
            && self.date_range().contains(order.created_at)
    }
}

/// Order joined with everything recorded against it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<Customer>,
    pub payment: Option<PaymentOrder>,
    pub slips: Vec<PaymentOrderSlip>,
    pub stock_outs: Vec<StockOutHistory>,
    pub delivery: Option<DeliveryWithDrivers>,
}
