//! Persistence traits
//!
//! Each aggregate gets its own repository trait. `Store` bundles them so a
//! single handle can be injected into the services; `PgStore` backs it with
//! PostgreSQL and `MemoryStore` with process memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    Branch, BranchProduct, Category, Customer, CustomerFilter, CustomerGroup, Delivery,
    DeliveryDriver,
    DeliveryFilter, DeliveryWithDrivers, Order, OrderFilter, OrderStatus, OrderType,
    PaymentMethod, PaymentOrder, PaymentOrderSlip, Product, ProductSaleBranch, ProductState,
    Stock, StockInCancellation, StockInFilter, StockInHistory, StockInItemInput,
    StockOutHistory, StockWithProduct, User, UserRole,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// User row together with its password hash; never leaves the auth service
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Which orders a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    Branch(Uuid),
    User(Uuid),
}

/// One requested line of a confirmation; becomes one stock-out row
#[derive(Debug, Clone, PartialEq)]
pub struct StockOutLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub sell_price: Decimal,
}

/// Everything `confirmOrder` writes, applied as one unit of work
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub order_id: Uuid,
    pub branch_id: Uuid,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub total_price: Decimal,
    pub payment: PaymentOrder,
    pub slip: Option<PaymentOrderSlip>,
    pub lines: Vec<StockOutLine>,
    pub note: Option<String>,
    pub confirmed_at: DateTime<Utc>,
}

/// Header and lines of a stock-in before the stock rows are resolved
#[derive(Debug, Clone)]
pub struct NewStockIn {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub user_id: Uuid,
    pub ref_code: String,
    pub distributor: String,
    pub total_price: Decimal,
    pub note: Option<String>,
    pub items: Vec<StockInItemInput>,
    pub created_at: DateTime<Utc>,
}

/// Balance collected when a deposited order is delivered
#[derive(Debug, Clone)]
pub struct DeliveryPayment {
    pub amount_received: Decimal,
    pub paid_at: DateTime<Utc>,
    pub slip: PaymentOrderSlip,
}

#[derive(Debug, Clone)]
pub struct DeliverySettlement {
    pub order_id: Uuid,
    pub delivered_at: DateTime<Utc>,
    pub payment: Option<DeliveryPayment>,
}

#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn insert_branch(&self, branch: &Branch) -> AppResult<()>;
    async fn find_branch(&self, id: Uuid) -> AppResult<Option<Branch>>;
    async fn branch_code_exists(&self, code: &str) -> AppResult<bool>;
    /// `exclude` skips the branch being renamed
    async fn branch_name_exists(&self, name: &str, exclude: Option<Uuid>) -> AppResult<bool>;
    async fn list_branches(&self) -> AppResult<Vec<Branch>>;
    async fn update_branch(&self, branch: &Branch) -> AppResult<()>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn insert_category(&self, category: &Category) -> AppResult<()>;
    async fn find_category(&self, id: Uuid) -> AppResult<Option<Category>>;
    /// True when the code or the name is taken; `exclude` skips the
    /// category being edited
    async fn category_exists(&self, code: &str, name: &str, exclude: Option<Uuid>)
        -> AppResult<bool>;
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    async fn update_category(&self, category: &Category) -> AppResult<()>;
    async fn category_has_products(&self, id: Uuid) -> AppResult<bool>;
    async fn delete_category(&self, id: Uuid) -> AppResult<()>;

    async fn insert_product(&self, product: &Product) -> AppResult<()>;
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;
    /// True when any of code, barcode or name is already used by a product
    /// other than `exclude`
    async fn product_exists(
        &self,
        code: &str,
        barcode: &str,
        name: &str,
        exclude: Option<Uuid>,
    ) -> AppResult<bool>;
    async fn list_products(&self, include_retired: bool) -> AppResult<Vec<Product>>;
    /// Descriptive fields only; the lifecycle goes through `update_product_state`
    async fn update_product(&self, product: &Product) -> AppResult<()>;
    async fn update_product_state(
        &self,
        id: Uuid,
        state: ProductState,
        updated_at: DateTime<Utc>,
    ) -> AppResult<()>;
    /// Active products with the branch price and stock quantity, if any
    async fn list_branch_products(&self, branch_id: Uuid) -> AppResult<Vec<BranchProduct>>;
    /// Active products the branch has not priced yet
    async fn list_unpriced_products(&self, branch_id: Uuid) -> AppResult<Vec<Product>>;

    async fn upsert_sell_price(&self, price: &ProductSaleBranch) -> AppResult<()>;
    async fn find_sell_price(
        &self,
        product_id: Uuid,
        branch_id: Uuid,
    ) -> AppResult<Option<ProductSaleBranch>>;

    async fn insert_payment_method(&self, method: &PaymentMethod) -> AppResult<()>;
    async fn find_payment_method(&self, id: Uuid) -> AppResult<Option<PaymentMethod>>;
    async fn payment_method_exists(&self, name: &str, exclude: Option<Uuid>) -> AppResult<bool>;
    async fn list_payment_methods(&self) -> AppResult<Vec<PaymentMethod>>;
    async fn update_payment_method(&self, method: &PaymentMethod) -> AppResult<()>;
    /// True once any payment was recorded with the method
    async fn payment_method_in_use(&self, id: Uuid) -> AppResult<bool>;
    async fn delete_payment_method(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn insert_customer(&self, customer: &Customer) -> AppResult<()>;
    async fn find_customer(&self, id: Uuid) -> AppResult<Option<Customer>>;
    /// Newest first
    async fn list_customers(
        &self,
        branch_id: Uuid,
        filter: &CustomerFilter,
    ) -> AppResult<Vec<Customer>>;
    async fn update_customer(&self, customer: &Customer) -> AppResult<()>;

    async fn insert_customer_group(&self, group: &CustomerGroup) -> AppResult<()>;
    async fn find_customer_group(&self, id: Uuid) -> AppResult<Option<CustomerGroup>>;
    async fn customer_group_name_exists(&self, name: &str, exclude: Option<Uuid>)
        -> AppResult<bool>;
    async fn list_customer_groups(&self) -> AppResult<Vec<CustomerGroup>>;
    async fn update_customer_group(&self, group: &CustomerGroup) -> AppResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(&self, user: &User, password_hash: &str) -> AppResult<()>;
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_credentials(&self, username: &str) -> AppResult<Option<UserCredentials>>;
    async fn user_exists(&self, username: &str, email: &str) -> AppResult<bool>;
    async fn find_users(&self, ids: &[Uuid]) -> AppResult<Vec<User>>;
    async fn list_users_by_role(&self, branch_id: Uuid, role: UserRole) -> AppResult<Vec<User>>;
    /// Every account, or those of one branch; newest first
    async fn list_users(&self, branch_id: Option<Uuid>) -> AppResult<Vec<User>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &Order) -> AppResult<()>;
    async fn find_order(&self, id: Uuid) -> AppResult<Option<Order>>;
    async fn order_exists(
        &self,
        customer_id: Uuid,
        user_id: Uuid,
        branch_id: Uuid,
        order_code: &str,
    ) -> AppResult<bool>;
    /// Removes the order only while it is still PENDING
    async fn delete_pending_order(&self, id: Uuid) -> AppResult<bool>;
    /// Writes payment, slip, status and stock-outs in one transaction. A
    /// stock row that cannot cover its line aborts everything with
    /// `InsufficientStock`; an order no longer PENDING with `NotFound`.
    async fn apply_confirmation(&self, confirmation: &OrderConfirmation) -> AppResult<()>;
    async fn find_payment(&self, order_id: Uuid) -> AppResult<Option<PaymentOrder>>;
    async fn list_slips(&self, order_id: Uuid) -> AppResult<Vec<PaymentOrderSlip>>;
    async fn list_order_stock_outs(&self, order_id: Uuid) -> AppResult<Vec<StockOutHistory>>;
    /// Newest first
    async fn list_orders(&self, scope: OrderScope, filter: &OrderFilter) -> AppResult<Vec<Order>>;
}

#[async_trait]
pub trait StockRepository: Send + Sync {
    async fn find_stock(&self, product_id: Uuid, branch_id: Uuid) -> AppResult<Option<Stock>>;
    async fn ref_code_exists(&self, branch_id: Uuid, ref_code: &str) -> AppResult<bool>;
    /// Creates the header and items and increments (or creates) each stock
    /// row atomically
    async fn record_stock_in(&self, stock_in: &NewStockIn) -> AppResult<StockInHistory>;
    async fn find_stock_in(&self, id: Uuid) -> AppResult<Option<StockInHistory>>;
    /// Reverses the increments and marks the header canceled atomically.
    /// `NotFound` when already canceled, `InsufficientStock` when a reversal
    /// would drive a quantity below zero.
    async fn cancel_stock_in(
        &self,
        id: Uuid,
        cancellation: &StockInCancellation,
    ) -> AppResult<StockInHistory>;
    /// Newest first
    async fn list_stock_ins(
        &self,
        branch_id: Uuid,
        filter: &StockInFilter,
    ) -> AppResult<Vec<StockInHistory>>;
    async fn list_stocks(&self, branch_id: Uuid) -> AppResult<Vec<StockWithProduct>>;
    async fn list_branch_stock_outs(&self, branch_id: Uuid) -> AppResult<Vec<StockOutHistory>>;
}

#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    async fn insert_delivery(&self, delivery: &Delivery) -> AppResult<()>;
    async fn find_delivery(&self, order_id: Uuid) -> AppResult<Option<DeliveryWithDrivers>>;
    async fn insert_drivers(&self, drivers: &[DeliveryDriver]) -> AppResult<()>;
    /// Marks the delivery DELIVERED and, when a balance is collected, settles
    /// the payment and completes the order in the same transaction
    async fn settle_delivery(&self, settlement: &DeliverySettlement) -> AppResult<()>;
    async fn list_deliveries(
        &self,
        branch_id: Uuid,
        filter: &DeliveryFilter,
        caller: Uuid,
    ) -> AppResult<Vec<DeliveryWithDrivers>>;
    /// Drivers of the branch holding an assignment on an undelivered delivery
    async fn busy_driver_ids(&self, branch_id: Uuid) -> AppResult<Vec<Uuid>>;
}

/// The full persistence gateway injected into services
#[async_trait]
pub trait Store:
    BranchRepository
    + CatalogRepository
    + CustomerRepository
    + UserRepository
    + OrderRepository
    + StockRepository
    + DeliveryRepository
{
    /// Connectivity check for the health endpoint
    async fn ping(&self) -> AppResult<()>;
}
